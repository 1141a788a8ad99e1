use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use soko_catalog::{CatalogError, Product};
use soko_core::identity::{Role, User};

use crate::error::ApiError;
use crate::middleware::auth::require_role;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products", post(create_product))
        .route("/products/low-stock", get(low_stock))
        .route("/products/{id}", get(get_product))
        .route("/products/{id}", put(update_product))
        .route("/products/{id}", delete(delete_product))
}

#[derive(Debug, Deserialize)]
struct ProductRequest {
    name: String,
    sku: String,
    description: Option<String>,
    unit: String,
    price: Decimal,
    stock: i32,
    threshold: Option<i32>,
    expiry_date: Option<NaiveDate>,
}

impl ProductRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("Product name is required".into()));
        }
        if self.sku.trim().is_empty() {
            return Err(ApiError::Validation("SKU is required".into()));
        }
        if self.price.is_sign_negative() {
            return Err(ApiError::Validation("Price cannot be negative".into()));
        }
        if self.stock < 0 {
            return Err(ApiError::Validation("Stock cannot be negative".into()));
        }
        Ok(())
    }
}

async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let products = state.products.list_products().await?;
    Ok(Json(json!({
        "success": true,
        "products": products,
    })))
}

async fn low_stock(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&user, Role::Admin)?;
    let products: Vec<Product> = state
        .products
        .list_products()
        .await?
        .into_iter()
        .filter(Product::is_low_stock)
        .collect();
    Ok(Json(json!({
        "success": true,
        "products": products,
    })))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let product = state
        .products
        .get_product(id)
        .await?
        .ok_or(CatalogError::NotFound(id))?;
    Ok(Json(json!({
        "success": true,
        "product": product,
    })))
}

async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    require_role(&user, Role::Admin)?;
    req.validate()?;

    let product = Product {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        sku: req.sku.trim().to_string(),
        description: req.description,
        unit: req.unit,
        price: req.price,
        stock: req.stock,
        threshold: req.threshold.unwrap_or(10),
        expiry_date: req.expiry_date,
        created_at: Utc::now(),
    };
    state.products.create_product(&product).await?;

    tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Product added successfully",
            "product": product,
        })),
    ))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&user, Role::Admin)?;
    req.validate()?;

    let existing = state
        .products
        .get_product(id)
        .await?
        .ok_or(CatalogError::NotFound(id))?;

    let product = Product {
        id,
        name: req.name.trim().to_string(),
        sku: req.sku.trim().to_string(),
        description: req.description,
        unit: req.unit,
        price: req.price,
        stock: req.stock,
        threshold: req.threshold.unwrap_or(existing.threshold),
        expiry_date: req.expiry_date,
        created_at: existing.created_at,
    };
    state.products.update_product(id, &product).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Product updated successfully",
        "product": product,
    })))
}

async fn delete_product(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&user, Role::Admin)?;
    state.products.delete_product(id).await?;
    tracing::info!(product_id = %id, "product deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Product deleted successfully",
    })))
}
