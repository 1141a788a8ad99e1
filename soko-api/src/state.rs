use std::sync::Arc;

use soko_catalog::ProductRepository;
use soko_core::chat::MessageRepository;
use soko_core::identity::UserRepository;
use soko_order::{OrderOrchestrator, OrderRepository};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub products: Arc<dyn ProductRepository>,
    pub users: Arc<dyn UserRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub chat: Arc<dyn MessageRepository>,
    pub orchestrator: Arc<OrderOrchestrator>,
    pub auth: AuthConfig,
}
