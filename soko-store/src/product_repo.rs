use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use soko_catalog::{CatalogError, Product, ProductRepository};

pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    sku: String,
    description: Option<String>,
    unit: String,
    price: Decimal,
    stock: i32,
    threshold: i32,
    expiry_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            sku: row.sku,
            description: row.description,
            unit: row.unit,
            price: row.price,
            stock: row.stock,
            threshold: row.threshold,
            expiry_date: row.expiry_date,
            created_at: row.created_at,
        }
    }
}

fn storage_err(sku: &str, e: sqlx::Error) -> CatalogError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            return CatalogError::DuplicateSku(sku.to_string());
        }
    }
    CatalogError::Storage(e.to_string())
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn create_product(&self, product: &Product) -> Result<Uuid, CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, description, unit, price, stock, threshold, expiry_date, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.threshold)
        .bind(product.expiry_date)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err(&product.sku, e))?;

        Ok(product.id)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, CatalogError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, sku, description, unit, price, stock, threshold, expiry_date, created_at FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        Ok(row.map(Product::from))
    }

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, sku, description, unit, price, stock, threshold, expiry_date, created_at FROM products ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CatalogError::Storage(e.to_string()))?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn update_product(&self, id: Uuid, product: &Product) -> Result<(), CatalogError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, sku = $3, description = $4, unit = $5, price = $6,
                stock = $7, threshold = $8, expiry_date = $9
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(&product.unit)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.threshold)
        .bind(product.expiry_date)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_err(&product.sku, e))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CatalogError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(())
    }
}
