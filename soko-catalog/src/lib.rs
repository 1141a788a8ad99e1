pub mod product;

pub use product::{CatalogError, Product, ProductRepository};
