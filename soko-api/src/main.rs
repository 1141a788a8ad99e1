use std::net::SocketAddr;
use std::sync::Arc;

use soko_api::{app, AppState, AuthConfig};
use soko_mpesa::DarajaClient;
use soko_order::OrderOrchestrator;
use soko_store::message_repo::PgMessageRepository;
use soko_store::order_repo::PgOrderRepository;
use soko_store::product_repo::PgProductRepository;
use soko_store::user_repo::PgUserRepository;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soko_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = soko_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Soko API on port {}", config.server.port);

    let db = soko_store::Db::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");

    let products = Arc::new(PgProductRepository::new(db.pool.clone()));
    let users = Arc::new(PgUserRepository::new(db.pool.clone()));
    let orders = Arc::new(PgOrderRepository::new(db.pool.clone()));
    let chat = Arc::new(PgMessageRepository::new(db.pool.clone()));
    let gateway = Arc::new(DarajaClient::new(config.mpesa.clone()));

    let orchestrator = Arc::new(OrderOrchestrator::new(
        products.clone(),
        users.clone(),
        orders.clone(),
        gateway,
    ));

    let app_state = AppState {
        products,
        users,
        orders,
        chat,
        orchestrator,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
