use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use soko_core::identity::{Role, User};
use soko_order::{LineItemRequest, OrderChanges, OrderError, OrderStatus, PaymentMethod};

use crate::error::ApiError;
use crate::middleware::auth::require_role;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders", get(list_my_orders))
        .route("/orders/{id}", get(get_order))
        .route("/admin/orders", get(list_all_orders))
        .route("/admin/orders/{id}", put(update_order))
        .route("/admin/orders/{id}/status", put(update_status))
}

#[derive(Debug, Deserialize)]
struct CreateOrderRequest {
    items: Vec<LineItemRequest>,
    payment_method: PaymentMethod,
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: String,
}

#[derive(Debug, Deserialize)]
struct UpdateOrderRequest {
    status: Option<String>,
    payment_method: Option<String>,
    phone_number: Option<String>,
}

async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let placed = state
        .orchestrator
        .create_order(
            user.id,
            &req.items,
            req.payment_method,
            req.phone_number.as_deref(),
        )
        .await?;

    let message = match req.payment_method {
        PaymentMethod::MobileMoney => {
            "Order placed. Check your phone to complete the payment"
        }
        PaymentMethod::CashOnDelivery => "Order placed. Payment due on delivery",
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": message,
            "order": placed.order,
            "mpesa_response": placed.gateway_ack,
        })),
    ))
}

async fn list_my_orders(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let orders = state.orders.list_orders(user.id).await?;
    Ok(Json(json!({
        "success": true,
        "orders": orders,
    })))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let order = state
        .orders
        .get_order(id)
        .await?
        .ok_or(OrderError::NotFound(id))?;

    // Customers only see their own orders; a foreign id reads as absent.
    if order.customer_id != user.id && user.role != Role::Admin {
        return Err(OrderError::NotFound(id).into());
    }

    Ok(Json(json!({
        "success": true,
        "order": order,
    })))
}

async fn list_all_orders(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_role(&user, Role::Admin)?;
    let orders = state.orders.list_all_orders().await?;
    Ok(Json(json!({
        "success": true,
        "orders": orders,
    })))
}

async fn update_order(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let changes = OrderChanges {
        status: req.status.as_deref().map(str::parse::<OrderStatus>).transpose()?,
        payment_method: req
            .payment_method
            .as_deref()
            .map(str::parse::<PaymentMethod>)
            .transpose()?,
        phone_number: req.phone_number,
    };
    let order = state.orchestrator.update_order(id, changes, user.role).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Order updated",
        "order": order,
    })))
}

async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = req.status.parse()?;
    let order = state
        .orchestrator
        .update_order_status(id, status, user.role)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Order status updated",
        "order": order,
    })))
}
