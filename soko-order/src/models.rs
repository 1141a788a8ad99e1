use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use soko_catalog::CatalogError;
use soko_core::payment::StkAck;
use soko_core::phone::{InvalidPhoneNumber, Msisdn};

/// Order status in the lifecycle. `Pending` is initial; `Processing` is
/// reached only on a successful payment-initiation acknowledgment. The
/// terminal states are set by the asynchronous callback handler or an
/// admin, never by the orchestrator itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Shipped,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "shipped" => Ok(OrderStatus::Shipped),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(OrderError::Validation(format!("invalid status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    CashOnDelivery,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::MobileMoney => f.write_str("mobile_money"),
            PaymentMethod::CashOnDelivery => f.write_str("cash_on_delivery"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_money" => Ok(PaymentMethod::MobileMoney),
            "cash_on_delivery" => Ok(PaymentMethod::CashOnDelivery),
            other => Err(OrderError::Validation(format!(
                "invalid payment method: {other}"
            ))),
        }
    }
}

/// Gateway correlation identifiers, recorded only after a successful push
/// submission. Cash orders never carry these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefs {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub response_code: String,
}

/// The aggregate root for a purchase. Totals are derived from the items
/// and never set independently; orders are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub total_quantity: i32,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub phone_number: Option<Msisdn>,
    pub payment: Option<PaymentRefs>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(customer_id: Uuid, payment_method: PaymentMethod, phone_number: Option<Msisdn>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_id,
            items: Vec::new(),
            total_amount: Decimal::ZERO,
            total_quantity: 0,
            payment_method,
            status: OrderStatus::Pending,
            phone_number,
            payment: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an item and fold it into the running totals.
    pub fn push_item(&mut self, item: OrderItem) {
        self.total_amount += item.line_total();
        self.total_quantity += item.quantity;
        self.items.push(item);
        self.updated_at = Utc::now();
    }

    /// Gateway account reference, derived from the order id.
    pub fn reference(&self) -> String {
        format!("ORDER{}", self.id.simple())
    }

    /// Record a push acknowledgment. The order moves to `Processing` only
    /// when the provider's immediate code signals acceptance; otherwise it
    /// stays `Pending` with the references kept for later reconciliation.
    pub fn record_gateway_ack(&mut self, ack: &StkAck) {
        self.payment = Some(PaymentRefs {
            merchant_request_id: ack.merchant_request_id.clone(),
            checkout_request_id: ack.checkout_request_id.clone(),
            response_code: ack.response_code.clone(),
        });
        if ack.is_accepted() {
            self.status = OrderStatus::Processing;
        }
        self.updated_at = Utc::now();
    }

    pub fn update_status(&mut self, new_status: OrderStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

/// An individual line within an order. `unit_price` is a snapshot taken at
/// order time; later catalog changes must not affect it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn new(order_id: Uuid, product_id: Uuid, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id,
            quantity,
            unit_price,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error(transparent)]
    InvalidPhoneNumber(#[from] InvalidPhoneNumber),

    #[error("payment initiation failed: {0}")]
    PaymentInitiation(String),

    #[error("not permitted: {0}")]
    Authorization(String),

    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("order storage failure: {0}")]
    Persistence(String),
}

impl From<CatalogError> for OrderError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => OrderError::ProductNotFound(id),
            other => OrderError::Persistence(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromStr;

    #[test]
    fn test_totals_fold_deterministically() {
        let mut order = Order::new(Uuid::new_v4(), PaymentMethod::CashOnDelivery, None);
        order.push_item(OrderItem::new(
            order.id,
            Uuid::new_v4(),
            3,
            Decimal::from_str("100.00").unwrap(),
        ));
        order.push_item(OrderItem::new(
            order.id,
            Uuid::new_v4(),
            1,
            Decimal::from_str("250.00").unwrap(),
        ));

        assert_eq!(order.total_amount, Decimal::from_str("550.00").unwrap());
        assert_eq!(order.total_quantity, 4);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_no_float_drift_at_currency_precision() {
        let mut order = Order::new(Uuid::new_v4(), PaymentMethod::CashOnDelivery, None);
        order.push_item(OrderItem::new(
            order.id,
            Uuid::new_v4(),
            3,
            Decimal::from_str("19.99").unwrap(),
        ));
        assert_eq!(order.total_amount, Decimal::from_str("59.97").unwrap());
    }

    #[test]
    fn test_status_parse_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!(matches!(
            "delivered".parse::<OrderStatus>(),
            Err(OrderError::Validation(_))
        ));
    }

    #[test]
    fn test_unaccepted_ack_keeps_order_pending() {
        let mut order = Order::new(Uuid::new_v4(), PaymentMethod::MobileMoney, None);
        order.record_gateway_ack(&StkAck {
            merchant_request_id: "m-1".into(),
            checkout_request_id: "c-1".into(),
            response_code: "1".into(),
            response_description: None,
            customer_message: None,
        });
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment.as_ref().unwrap().response_code, "1");
    }
}
