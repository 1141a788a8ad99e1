pub mod app_config;
pub mod database;
pub mod memory;
pub mod message_repo;
pub mod order_repo;
pub mod product_repo;
pub mod user_repo;

pub use app_config::Config;
pub use database::Db;
