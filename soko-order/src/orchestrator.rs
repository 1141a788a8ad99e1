use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use soko_catalog::ProductRepository;
use soko_core::identity::{Role, UserRepository};
use soko_core::payment::{PaymentGateway, PushOutcome, StkAck};
use soko_core::phone::Msisdn;

use crate::models::{Order, OrderError, OrderItem, OrderStatus, PaymentMethod};
use crate::repository::OrderRepository;

/// A requested line before validation: a product reference and a count.
/// Prices are never accepted from the caller; they are snapshotted from
/// the catalog at check time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Admin edits to an order. Absent fields are left untouched; items and
/// totals are never editable after creation.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub status: Option<OrderStatus>,
    pub payment_method: Option<PaymentMethod>,
    pub phone_number: Option<String>,
}

/// The persisted order plus, for mobile money, the provider's raw
/// acknowledgment payload.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    pub gateway_ack: Option<StkAck>,
}

/// Turns a purchase intent into a persisted order with correct totals and,
/// for mobile-money orders, an in-flight payment request. Single-request
/// scoped: no retries, no background work, one gateway attempt per order.
pub struct OrderOrchestrator {
    products: Arc<dyn ProductRepository>,
    users: Arc<dyn UserRepository>,
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl OrderOrchestrator {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        users: Arc<dyn UserRepository>,
        orders: Arc<dyn OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            products,
            users,
            orders,
            gateway,
        }
    }

    /// Create an order. For `MobileMoney` the gateway is called before the
    /// single atomic persist (the order id is pre-generated, so the account
    /// reference is stable); a rejected push therefore leaves zero rows,
    /// which is the same observable contract as flush-then-rollback.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        items: &[LineItemRequest],
        payment_method: PaymentMethod,
        phone_number: Option<&str>,
    ) -> Result<PlacedOrder, OrderError> {
        if items.is_empty() {
            return Err(OrderError::Validation(
                "order must contain at least one item".into(),
            ));
        }
        if let Some(bad) = items.iter().find(|item| item.quantity <= 0) {
            return Err(OrderError::Validation(format!(
                "quantity for product {} must be a positive integer",
                bad.product_id
            )));
        }

        let payer = match payment_method {
            PaymentMethod::MobileMoney => Some(self.resolve_payer(customer_id, phone_number).await?),
            PaymentMethod::CashOnDelivery => None,
        };

        let mut order = Order::new(customer_id, payment_method, payer);

        // Stock check and price snapshot. The check is against current
        // stock; the store enforces it again with a conditional decrement
        // at commit time, which closes the check-then-act window.
        for request in items {
            let product = self
                .products
                .get_product(request.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(request.product_id))?;

            if request.quantity > product.stock {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    requested: request.quantity,
                    available: product.stock,
                });
            }
            if product.price.is_sign_negative() {
                return Err(OrderError::Validation(format!(
                    "product {} has a negative price",
                    product.id
                )));
            }

            order.push_item(OrderItem::new(
                order.id,
                product.id,
                request.quantity,
                product.price,
            ));
        }

        let mut gateway_ack = None;
        if let Some(payer) = order.phone_number.clone() {
            // Provider takes whole currency units; fractional subunits drop.
            let amount = order
                .total_amount
                .trunc()
                .to_u64()
                .ok_or_else(|| OrderError::Validation("order total out of range".into()))?;
            let reference = order.reference();
            let description = format!("Payment for order {}", order.id.simple());

            match self
                .gateway
                .stk_push(&payer, amount, &reference, &description)
                .await
            {
                PushOutcome::Rejected(message) => {
                    tracing::warn!(order_id = %order.id, %message, "push payment rejected");
                    return Err(OrderError::PaymentInitiation(message));
                }
                PushOutcome::Accepted(ack) => {
                    order.record_gateway_ack(&ack);
                    gateway_ack = Some(ack);
                }
            }
        }

        self.orders.create_order(&order).await?;
        tracing::info!(
            order_id = %order.id,
            customer_id = %customer_id,
            method = %payment_method,
            total = %order.total_amount,
            "order created"
        );

        Ok(PlacedOrder { order, gateway_ack })
    }

    /// Admin-only status update. Transitions are deliberately unrestricted;
    /// see DESIGN.md for the recorded policy choice.
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor_role: Role,
    ) -> Result<Order, OrderError> {
        if actor_role != Role::Admin {
            return Err(OrderError::Authorization(
                "only admins may update order status".into(),
            ));
        }

        let mut order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        self.orders.update_order_status(order_id, new_status).await?;
        order.update_status(new_status);
        tracing::info!(%order_id, status = %new_status, "order status updated");
        Ok(order)
    }

    /// Admin-only order edit: status, payment method and contact phone.
    /// The phone goes through the same normalization as order creation.
    pub async fn update_order(
        &self,
        order_id: Uuid,
        changes: OrderChanges,
        actor_role: Role,
    ) -> Result<Order, OrderError> {
        if actor_role != Role::Admin {
            return Err(OrderError::Authorization(
                "only admins may edit orders".into(),
            ));
        }

        let mut order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        if let Some(status) = changes.status {
            order.update_status(status);
        }
        if let Some(method) = changes.payment_method {
            order.payment_method = method;
            order.updated_at = Utc::now();
        }
        if let Some(raw) = changes.phone_number.as_deref() {
            order.phone_number = Some(Msisdn::normalize(raw)?);
            order.updated_at = Utc::now();
        }

        self.orders.update_order(&order).await?;
        tracing::info!(%order_id, "order updated");
        Ok(order)
    }

    async fn resolve_payer(
        &self,
        customer_id: Uuid,
        phone_number: Option<&str>,
    ) -> Result<Msisdn, OrderError> {
        let raw = match phone_number {
            Some(given) => given.to_string(),
            // Quick-order path: fall back to the registered contact number.
            None => self
                .users
                .get_user(customer_id)
                .await
                .map_err(|e| OrderError::Persistence(e.to_string()))?
                .ok_or_else(|| OrderError::Validation(format!("unknown customer: {customer_id}")))?
                .phone_number,
        };
        Ok(Msisdn::normalize(&raw)?)
    }
}
