pub mod client;

pub use client::{DarajaClient, MpesaConfig};
