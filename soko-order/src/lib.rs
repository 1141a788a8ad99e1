pub mod models;
pub mod orchestrator;
pub mod repository;

pub use models::{Order, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentRefs};
pub use orchestrator::{LineItemRequest, OrderChanges, OrderOrchestrator, PlacedOrder};
pub use repository::OrderRepository;
