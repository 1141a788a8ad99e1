//! In-memory repositories behind the same traits as the Postgres ones.
//! Used by API tests and local development; nothing here survives a
//! restart, and nothing is reachable except through the injected trait
//! objects.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use soko_catalog::{CatalogError, Product, ProductRepository};
use soko_core::chat::{ChatError, ChatSide, Conversation, Message, MessageRepository};
use soko_core::identity::{AccountError, User, UserRepository};
use soko_order::{Order, OrderError, OrderRepository, OrderStatus};

#[derive(Default)]
pub struct MemoryCatalog {
    products: Mutex<HashMap<Uuid, Product>>,
}

#[async_trait]
impl ProductRepository for MemoryCatalog {
    async fn create_product(&self, product: &Product) -> Result<Uuid, CatalogError> {
        let mut products = self.products.lock().unwrap();
        if products.values().any(|p| p.sku == product.sku) {
            return Err(CatalogError::DuplicateSku(product.sku.clone()));
        }
        products.insert(product.id, product.clone());
        Ok(product.id)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, CatalogError> {
        Ok(self.products.lock().unwrap().get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, CatalogError> {
        let mut products: Vec<Product> =
            self.products.lock().unwrap().values().cloned().collect();
        products.sort_by_key(|p| std::cmp::Reverse(p.created_at));
        Ok(products)
    }

    async fn update_product(&self, id: Uuid, product: &Product) -> Result<(), CatalogError> {
        let mut products = self.products.lock().unwrap();
        if !products.contains_key(&id) {
            return Err(CatalogError::NotFound(id));
        }
        products.insert(id, product.clone());
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), CatalogError> {
        self.products
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(CatalogError::NotFound(id))
    }
}

#[derive(Default)]
pub struct MemoryAccounts {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryAccounts {
    pub fn seed(&self, user: User) -> Uuid {
        let id = user.id;
        self.users.lock().unwrap().insert(id, user);
        id
    }
}

#[async_trait]
impl UserRepository for MemoryAccounts {
    async fn create_user(&self, user: &User) -> Result<Uuid, AccountError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == user.email) {
            return Err(AccountError::EmailTaken(user.email.clone()));
        }
        users.insert(user.id, user.clone());
        Ok(user.id)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AccountError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        let email = email.to_lowercase();
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

/// Applies the same all-or-nothing create contract as the Postgres store,
/// including the conditional stock decrement.
pub struct MemoryOrders {
    catalog: Arc<MemoryCatalog>,
    orders: Mutex<Vec<Order>>,
}

impl MemoryOrders {
    pub fn new(catalog: Arc<MemoryCatalog>) -> Self {
        Self {
            catalog,
            orders: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OrderRepository for MemoryOrders {
    async fn create_order(&self, order: &Order) -> Result<Uuid, OrderError> {
        let mut products = self.catalog.products.lock().unwrap();

        for item in &order.items {
            let product = products
                .get(&item.product_id)
                .ok_or(OrderError::ProductNotFound(item.product_id))?;
            if product.stock < item.quantity {
                return Err(OrderError::InsufficientStock {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available: product.stock,
                });
            }
        }
        for item in &order.items {
            products.get_mut(&item.product_id).unwrap().stock -= item.quantity;
        }

        self.orders.lock().unwrap().push(order.clone());
        Ok(order.id)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<Order>, OrderError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn list_all_orders(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<(), OrderError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(OrderError::NotFound(id))?;
        order.update_status(status);
        Ok(())
    }

    async fn update_order(&self, updated: &Order) -> Result<(), OrderError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.id == updated.id)
            .ok_or(OrderError::NotFound(updated.id))?;
        order.status = updated.status;
        order.payment_method = updated.payment_method;
        order.phone_number = updated.phone_number.clone();
        order.updated_at = updated.updated_at;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryChat {
    conversations: Mutex<HashMap<Uuid, Conversation>>,
    messages: Mutex<Vec<Message>>,
}

#[async_trait]
impl MessageRepository for MemoryChat {
    async fn create_conversation(&self, conversation: &Conversation) -> Result<Uuid, ChatError> {
        self.conversations
            .lock()
            .unwrap()
            .insert(conversation.id, conversation.clone());
        Ok(conversation.id)
    }

    async fn conversations_for(
        &self,
        user_id: Uuid,
        side: ChatSide,
    ) -> Result<Vec<Conversation>, ChatError> {
        let mut out: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap()
            .values()
            .filter(|c| match side {
                ChatSide::Retailer => c.retailer_id == user_id,
                ChatSide::Customer => c.customer_id == user_id,
            })
            .cloned()
            .collect();
        out.sort_by_key(|c| std::cmp::Reverse(c.timestamp));
        Ok(out)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, ChatError> {
        Ok(self.conversations.lock().unwrap().get(&id).cloned())
    }

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, ChatError> {
        let mut out: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.timestamp);
        Ok(out)
    }

    async fn mark_read(&self, conversation_id: Uuid, reader: Uuid) -> Result<i64, ChatError> {
        // Lock order: conversations before messages, same as append_message.
        let mut conversations = self.conversations.lock().unwrap();
        let mut messages = self.messages.lock().unwrap();

        for message in messages
            .iter_mut()
            .filter(|m| m.conversation_id == conversation_id && m.sender_id != reader)
        {
            message.read = true;
        }
        let unread = messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && m.sender_id != reader && !m.read)
            .count() as i64;
        if let Some(conversation) = conversations.get_mut(&conversation_id) {
            conversation.unread_count = unread;
        }
        Ok(unread)
    }

    async fn append_message(&self, message: &Message) -> Result<Uuid, ChatError> {
        let mut conversations = self.conversations.lock().unwrap();
        let conversation = conversations
            .get_mut(&message.conversation_id)
            .ok_or(ChatError::NotFound(message.conversation_id))?;

        conversation.last_message = Some(message.text.clone());
        conversation.timestamp = message.timestamp;
        conversation.unread_count += 1;

        self.messages.lock().unwrap().push(message.clone());
        Ok(message.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_unread_lifecycle() {
        let chat = MemoryChat::default();
        let retailer = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let conversation =
            Conversation::new(retailer, "Duka Lane".into(), customer, "Wanjiku".into());
        chat.create_conversation(&conversation).await.unwrap();

        chat.append_message(&Message::new(conversation.id, retailer, "Habari!".into()))
            .await
            .unwrap();
        chat.append_message(&Message::new(conversation.id, retailer, "Order ready".into()))
            .await
            .unwrap();

        let stored = chat
            .get_conversation(conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.unread_count, 2);
        assert_eq!(stored.last_message.as_deref(), Some("Order ready"));

        let unread = chat.mark_read(conversation.id, customer).await.unwrap();
        assert_eq!(unread, 0);
        assert!(chat
            .messages(conversation.id)
            .await
            .unwrap()
            .iter()
            .all(|m| m.read));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_append_and_mark_read_complete() {
        let chat = Arc::new(MemoryChat::default());
        let retailer = Uuid::new_v4();
        let customer = Uuid::new_v4();
        let conversation =
            Conversation::new(retailer, "Duka Lane".into(), customer, "Wanjiku".into());
        chat.create_conversation(&conversation).await.unwrap();
        let id = conversation.id;

        let mut handles = Vec::new();
        for i in 0..50 {
            let writer = chat.clone();
            handles.push(tokio::spawn(async move {
                writer
                    .append_message(&Message::new(id, retailer, format!("msg {i}")))
                    .await
                    .unwrap();
            }));
            let reader = chat.clone();
            handles.push(tokio::spawn(async move {
                reader.mark_read(id, customer).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(chat.mark_read(id, customer).await.unwrap(), 0);
        assert_eq!(chat.messages(id).await.unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        use chrono::Utc;
        use rust_decimal::Decimal;

        let catalog = MemoryCatalog::default();
        let product = Product {
            id: Uuid::new_v4(),
            name: "Sugar 1kg".into(),
            sku: "SUG-1".into(),
            description: None,
            unit: "packet".into(),
            price: Decimal::new(15000, 2),
            stock: 100,
            threshold: 10,
            expiry_date: None,
            created_at: Utc::now(),
        };
        catalog.create_product(&product).await.unwrap();

        let duplicate = Product {
            id: Uuid::new_v4(),
            ..product.clone()
        };
        assert!(matches!(
            catalog.create_product(&duplicate).await,
            Err(CatalogError::DuplicateSku(_))
        ));
    }
}
