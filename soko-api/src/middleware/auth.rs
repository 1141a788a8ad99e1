use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use soko_core::identity::{Role, User};

use crate::error::ApiError;
use crate::state::AppState;

pub const TOKEN_COOKIE: &str = "access_token";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Authentication middleware. Accepts the token either as a bearer header
/// or as the `access_token` cookie the login route sets, resolves the
/// account, and injects it as a request extension for the handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string);

    let token = bearer
        .or_else(|| jar.get(TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| ApiError::Unauthenticated("Token is missing".into()))?;

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated("Invalid token".into()))?;

    let user_id = Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| ApiError::Unauthenticated("Invalid token".into()))?;

    let user = state
        .users
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("Invalid token".into()))?;

    if !user.is_active {
        return Err(ApiError::Unauthenticated("Account is deactivated".into()));
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Role gate composed ahead of admin handlers. Pure: the decision depends
/// only on the resolved account and the required role.
pub fn require_role(user: &User, required: Role) -> Result<(), ApiError> {
    if user.role == required {
        Ok(())
    } else {
        Err(ApiError::Order(soko_order::OrderError::Authorization(
            format!("{required} access required"),
        )))
    }
}
