use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Deserialize;
use serde_json::json;

use soko_core::identity::User;
use soko_core::phone::Msisdn;

use crate::error::ApiError;
use crate::middleware::auth::{Claims, TOKEN_COOKIE};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    first_name: String,
    last_name: String,
    email: String,
    phone_number: String,
    password: String,
    confirm_password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(ApiError::Validation("First and last name are required".into()));
    }
    if !req.email.contains('@') || !req.email.contains('.') {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".into()));
    }
    let phone = Msisdn::normalize(&req.phone_number)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(e.into()))?;

    let user = User::new(
        req.first_name.trim().to_string(),
        req.last_name.trim().to_string(),
        req.email.trim().to_string(),
        phone.as_str().to_string(),
        hash,
    );
    state.users.create_user(&user).await?;

    tracing::info!(user_id = %user.id, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Account created successfully",
            "user": user,
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let user = state
        .users
        .find_by_email(&req.email.to_lowercase())
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("Invalid email or password".into()))?;

    let matches = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(e.into()))?;
    if !matches {
        return Err(ApiError::Unauthenticated("Invalid email or password".into()));
    }
    if !user.is_active {
        return Err(ApiError::Unauthenticated("Account is deactivated".into()));
    }

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.to_string(),
        exp: (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    let cookie = Cookie::build((TOKEN_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    tracing::info!(user_id = %user.id, "login");
    Ok((
        jar.add(cookie),
        Json(json!({
            "success": true,
            "message": "Login successful",
            "access_token": token,
            "user": user,
        })),
    ))
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    (
        jar.remove(Cookie::from(TOKEN_COOKIE)),
        Json(json!({
            "success": true,
            "message": "Logged out",
        })),
    )
}

async fn me(Extension(user): Extension<User>) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "user": user,
    }))
}
