use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Order, OrderError, OrderStatus};

/// Repository trait for order data access
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist the order, its items, and the stock decrement for every
    /// item as one atomic write: either everything lands or nothing does.
    /// A decrement that would push stock negative fails the whole write
    /// with [`OrderError::InsufficientStock`].
    async fn create_order(&self, order: &Order) -> Result<Uuid, OrderError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, OrderError>;

    async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<Order>, OrderError>;

    async fn list_all_orders(&self) -> Result<Vec<Order>, OrderError>;

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), OrderError>;

    /// Persist admin edits to an order's mutable fields (status, payment
    /// method, contact phone). Items and totals never change here.
    async fn update_order(&self, order: &Order) -> Result<(), OrderError>;
}
