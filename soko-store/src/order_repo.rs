use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use soko_core::phone::Msisdn;
use soko_order::{Order, OrderError, OrderItem, OrderRepository, OrderStatus, PaymentRefs};

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, OrderError> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, quantity, unit_price FROM order_items WHERE order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }

    async fn hydrate(&self, row: OrderRow) -> Result<Order, OrderError> {
        let items = self.load_items(row.id).await?;
        let mut order = Order::try_from(row)?;
        order.items = items;
        Ok(order)
    }
}

fn persistence(e: sqlx::Error) -> OrderError {
    OrderError::Persistence(e.to_string())
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    total_amount: Decimal,
    total_quantity: i32,
    payment_method: String,
    status: String,
    phone_number: Option<String>,
    merchant_request_id: Option<String>,
    checkout_request_id: Option<String>,
    response_code: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let phone_number = row
            .phone_number
            .as_deref()
            .map(Msisdn::normalize)
            .transpose()?;

        let payment = match (row.merchant_request_id, row.checkout_request_id, row.response_code) {
            (Some(merchant_request_id), Some(checkout_request_id), Some(response_code)) => {
                Some(PaymentRefs {
                    merchant_request_id,
                    checkout_request_id,
                    response_code,
                })
            }
            _ => None,
        };

        Ok(Order {
            id: row.id,
            customer_id: row.customer_id,
            items: Vec::new(),
            total_amount: row.total_amount,
            total_quantity: row.total_quantity,
            payment_method: row.payment_method.parse()?,
            status: row.status.parse()?,
            phone_number,
            payment,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    /// Order header, items and stock decrements land in one transaction.
    /// The decrement is conditional on remaining stock, so two orders
    /// racing for the last units cannot both commit.
    async fn create_order(&self, order: &Order) -> Result<Uuid, OrderError> {
        let mut tx = self.pool.begin().await.map_err(persistence)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, total_amount, total_quantity, payment_method, status,
                                phone_number, merchant_request_id, checkout_request_id, response_code,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.total_amount)
        .bind(order.total_quantity)
        .bind(order.payment_method.to_string())
        .bind(order.status.to_string())
        .bind(order.phone_number.as_ref().map(|p| p.as_str().to_string()))
        .bind(order.payment.as_ref().map(|p| p.merchant_request_id.clone()))
        .bind(order.payment.as_ref().map(|p| p.checkout_request_id.clone()))
        .bind(order.payment.as_ref().map(|p| p.response_code.clone()))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(persistence)?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, unit_price, position)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;

            let decremented =
                sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2")
                    .bind(item.product_id)
                    .bind(item.quantity)
                    .execute(&mut *tx)
                    .await
                    .map_err(persistence)?;

            if decremented.rows_affected() == 0 {
                tx.rollback().await.map_err(persistence)?;

                let available: Option<i32> =
                    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                        .bind(item.product_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(persistence)?;

                return Err(match available {
                    Some(available) => OrderError::InsufficientStock {
                        product_id: item.product_id,
                        requested: item.quantity,
                        available,
                    },
                    None => OrderError::ProductNotFound(item.product_id),
                });
            }
        }

        tx.commit().await.map_err(persistence)?;
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, customer_id, total_amount, total_quantity, payment_method, status, phone_number, merchant_request_id, checkout_request_id, response_code, created_at, updated_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, customer_id, total_amount, total_quantity, payment_method, status, phone_number, merchant_request_id, checkout_request_id, response_code, created_at, updated_at FROM orders WHERE customer_id = $1 ORDER BY created_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, customer_id, total_amount, total_quantity, payment_method, status, phone_number, merchant_request_id, checkout_request_id, response_code, created_at, updated_at FROM orders ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate(row).await?);
        }
        Ok(orders)
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), OrderError> {
        let result = sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(persistence)?;

        if result.rows_affected() == 0 {
            return Err(OrderError::NotFound(id));
        }
        Ok(())
    }

    async fn update_order(&self, order: &Order) -> Result<(), OrderError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_method = $3, phone_number = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(order.status.to_string())
        .bind(order.payment_method.to_string())
        .bind(order.phone_number.as_ref().map(|p| p.as_str().to_string()))
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        if result.rows_affected() == 0 {
            return Err(OrderError::NotFound(order.id));
        }
        Ok(())
    }
}
