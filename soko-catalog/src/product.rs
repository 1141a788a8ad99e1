use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A catalog entry. Prices are exact decimals at two-digit currency
/// precision; stock is tracked in whole units of `unit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub unit: String,
    pub price: Decimal,
    pub stock: i32,
    pub threshold: i32,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Stock has fallen to or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.threshold
    }

    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("product not found: {0}")]
    NotFound(Uuid),

    #[error("sku already in use: {0}")]
    DuplicateSku(String),

    #[error("catalog storage failure: {0}")]
    Storage(String),
}

/// Repository trait for product catalog access
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create_product(&self, product: &Product) -> Result<Uuid, CatalogError>;

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, CatalogError>;

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError>;

    async fn update_product(&self, id: Uuid, product: &Product) -> Result<(), CatalogError>;

    async fn delete_product(&self, id: Uuid) -> Result<(), CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromStr;

    fn sample() -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Cooking Oil 5L".into(),
            sku: "OIL-5L".into(),
            description: None,
            unit: "jerrican".into(),
            price: Decimal::from_str("1250.00").unwrap(),
            stock: 8,
            threshold: 10,
            expiry_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_low_stock_uses_threshold() {
        let mut product = sample();
        assert!(product.is_low_stock());
        product.stock = 11;
        assert!(!product.is_low_stock());
    }

    #[test]
    fn test_price_round_trips_exactly() {
        let product = sample();
        let json = serde_json::to_string(&product).unwrap();
        let back: Product = serde_json::from_str(&json).unwrap();
        assert_eq!(back.price, product.price);
    }
}
