use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use soko_catalog::CatalogError;
use soko_core::chat::ChatError;
use soko_core::identity::AccountError;
use soko_order::OrderError;

/// API-surface error. Every failure leaves through here as the original's
/// `{"success": false, "message": ...}` envelope with the status the
/// taxonomy prescribes.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated(String),
    Validation(String),
    Order(OrderError),
    Catalog(CatalogError),
    Account(AccountError),
    Chat(ChatError),
    Internal(anyhow::Error),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Order(err) => {
                let status = match &err {
                    OrderError::Validation(_)
                    | OrderError::InvalidPhoneNumber(_)
                    | OrderError::InsufficientStock { .. }
                    | OrderError::PaymentInitiation(_) => StatusCode::BAD_REQUEST,
                    OrderError::ProductNotFound(_) | OrderError::NotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    OrderError::Authorization(_) => StatusCode::FORBIDDEN,
                    OrderError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::Catalog(err) => {
                let status = match &err {
                    CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
                    CatalogError::DuplicateSku(_) => StatusCode::CONFLICT,
                    CatalogError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::Account(err) => {
                let status = match &err {
                    AccountError::NotFound(_) => StatusCode::NOT_FOUND,
                    AccountError::EmailTaken(_) => StatusCode::CONFLICT,
                    AccountError::UnknownRole(_) | AccountError::Storage(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_string())
            }
            ApiError::Chat(err) => {
                let status = match &err {
                    ChatError::NotFound(_) => StatusCode::NOT_FOUND,
                    ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::Internal(err) => {
                tracing::error!("internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        }
        let body = Json(json!({
            "success": false,
            "message": message,
        }));
        (status, body).into_response()
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        ApiError::Account(err)
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        ApiError::Chat(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}
