use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => f.write_str("customer"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AccountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(AccountError::UnknownRole(other.to_string())),
        }
    }
}

/// An account in the store. The password hash never serializes out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        first_name: String,
        last_name: String,
        email: String,
        phone_number: String,
        password_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name,
            last_name,
            email: email.to_lowercase(),
            phone_number,
            password_hash,
            role: Role::Customer,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("user not found: {0}")]
    NotFound(Uuid),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("account storage failure: {0}")]
    Storage(String),
}

/// Repository trait for account data access
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<Uuid, AccountError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AccountError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError>;
}
