use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use soko_catalog::{Product, ProductRepository};
use soko_core::identity::{Role, User};
use soko_core::payment::{PaymentGateway, PushOutcome, StkAck};
use soko_core::phone::Msisdn;
use soko_order::OrderOrchestrator;
use soko_store::memory::{MemoryAccounts, MemoryCatalog, MemoryChat, MemoryOrders};

use crate::middleware::auth::Claims;
use crate::state::{AppState, AuthConfig};

const SECRET: &str = "test-secret";

enum ScriptedGateway {
    Accept,
    Reject(&'static str),
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn stk_push(
        &self,
        _payer: &Msisdn,
        _amount: u64,
        _reference: &str,
        _description: &str,
    ) -> PushOutcome {
        match self {
            ScriptedGateway::Accept => PushOutcome::Accepted(StkAck {
                merchant_request_id: "m-1".into(),
                checkout_request_id: "c-1".into(),
                response_code: "0".into(),
                response_description: Some("Success. Request accepted for processing".into()),
                customer_message: None,
            }),
            ScriptedGateway::Reject(msg) => PushOutcome::Rejected((*msg).to_string()),
        }
    }
}

struct Harness {
    app: Router,
    catalog: Arc<MemoryCatalog>,
    accounts: Arc<MemoryAccounts>,
}

fn harness(gateway: ScriptedGateway) -> Harness {
    let catalog = Arc::new(MemoryCatalog::default());
    let accounts = Arc::new(MemoryAccounts::default());
    let orders = Arc::new(MemoryOrders::new(catalog.clone()));
    let chat = Arc::new(MemoryChat::default());
    let gateway: Arc<dyn PaymentGateway> = Arc::new(gateway);

    let orchestrator = Arc::new(OrderOrchestrator::new(
        catalog.clone(),
        accounts.clone(),
        orders.clone(),
        gateway,
    ));

    let state = AppState {
        products: catalog.clone(),
        users: accounts.clone(),
        orders,
        chat,
        orchestrator,
        auth: AuthConfig {
            secret: SECRET.into(),
            expiration: 3600,
        },
    };

    Harness {
        app: crate::app(state),
        catalog,
        accounts,
    }
}

fn seed_user(harness: &Harness, role: Role) -> (Uuid, String) {
    let mut user = User::new(
        "Wanjiku".into(),
        "Mwangi".into(),
        format!("{}@example.com", Uuid::new_v4().simple()),
        "254712345678".into(),
        bcrypt::hash("sup3rsecret", 4).unwrap(),
    );
    user.role = role;
    let id = harness.accounts.seed(user);

    let claims = Claims {
        sub: id.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    (id, token)
}

async fn seed_product(harness: &Harness, price: &str, stock: i32) -> Uuid {
    let product = Product {
        id: Uuid::new_v4(),
        name: "Maize Flour 2kg".into(),
        sku: format!("MF-{}", Uuid::new_v4().simple()),
        description: None,
        unit: "bale".into(),
        price: price.parse::<Decimal>().unwrap(),
        stock,
        threshold: 2,
        expiry_date: None,
        created_at: Utc::now(),
    };
    harness.catalog.create_product(&product).await.unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_protected_routes_require_a_token() {
    let h = harness(ScriptedGateway::Accept);

    for uri in ["/orders", "/products", "/conversations", "/me"] {
        let response = h
            .app
            .clone()
            .oneshot(request(Method::GET, uri, None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
    }
}

#[tokio::test]
async fn test_register_login_and_cash_order_flow() {
    let h = harness(ScriptedGateway::Accept);
    let product_id = seed_product(&h, "250.00", 10).await;

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "first_name": "Wanjiku",
                "last_name": "Mwangi",
                "email": "wanjiku@example.com",
                "phone_number": "0712345678",
                "password": "sup3rsecret",
                "confirm_password": "sup3rsecret",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert!(body["user"].get("password_hash").is_none());

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({
                "email": "Wanjiku@Example.com",
                "password": "sup3rsecret",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("access_token="));
    assert!(cookie.contains("HttpOnly"));
    let body = body_json(response).await;
    let token = body["access_token"].as_str().unwrap().to_string();

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/orders",
            Some(&token),
            Some(json!({
                "items": [{"product_id": product_id, "quantity": 3}],
                "payment_method": "cash_on_delivery",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["order"]["total_amount"], json!("750.00"));
    assert_eq!(body["order"]["status"], json!("pending"));
    assert_eq!(body["mpesa_response"], Value::Null);

    let stored = h.catalog.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 7);

    let response = h
        .app
        .clone()
        .oneshot(request(Method::GET, "/orders", Some(&token), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_mobile_money_order_returns_gateway_ack() {
    let h = harness(ScriptedGateway::Accept);
    let product_id = seed_product(&h, "500.00", 5).await;
    let (_, token) = seed_user(&h, Role::Customer);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/orders",
            Some(&token),
            Some(json!({
                "items": [{"product_id": product_id, "quantity": 1}],
                "payment_method": "mobile_money",
                "phone_number": "0712345678",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["order"]["status"], json!("processing"));
    assert_eq!(body["mpesa_response"]["CheckoutRequestID"], json!("c-1"));
}

#[tokio::test]
async fn test_gateway_rejection_surfaces_as_bad_request() {
    let h = harness(ScriptedGateway::Reject("Invalid Access Token"));
    let product_id = seed_product(&h, "500.00", 5).await;
    let (_, token) = seed_user(&h, Role::Customer);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/orders",
            Some(&token),
            Some(json!({
                "items": [{"product_id": product_id, "quantity": 1}],
                "payment_method": "mobile_money",
                "phone_number": "0712345678",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Invalid Access Token"));

    let stored = h.catalog.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(stored.stock, 5);
}

#[tokio::test]
async fn test_invalid_phone_is_a_bad_request() {
    let h = harness(ScriptedGateway::Accept);
    let product_id = seed_product(&h, "100.00", 5).await;
    let (_, token) = seed_user(&h, Role::Customer);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/orders",
            Some(&token),
            Some(json!({
                "items": [{"product_id": product_id, "quantity": 1}],
                "payment_method": "mobile_money",
                "phone_number": "12345",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_are_forbidden_for_customers() {
    let h = harness(ScriptedGateway::Accept);
    let (_, customer) = seed_user(&h, Role::Customer);
    let (_, admin) = seed_user(&h, Role::Admin);

    let response = h
        .app
        .clone()
        .oneshot(request(Method::GET, "/admin/orders", Some(&customer), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/products",
            Some(&customer),
            Some(json!({
                "name": "Sugar 1kg",
                "sku": "SUG-1",
                "unit": "packet",
                "price": "150.00",
                "stock": 40,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/products",
            Some(&admin),
            Some(json!({
                "name": "Sugar 1kg",
                "sku": "SUG-1",
                "unit": "packet",
                "price": "150.00",
                "stock": 40,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Same SKU again conflicts.
    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/products",
            Some(&admin),
            Some(json!({
                "name": "Sugar 1kg",
                "sku": "SUG-1",
                "unit": "packet",
                "price": "150.00",
                "stock": 40,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_admin_updates_order_status() {
    let h = harness(ScriptedGateway::Accept);
    let product_id = seed_product(&h, "100.00", 5).await;
    let (_, customer) = seed_user(&h, Role::Customer);
    let (_, admin) = seed_user(&h, Role::Admin);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/orders",
            Some(&customer),
            Some(json!({
                "items": [{"product_id": product_id, "quantity": 1}],
                "payment_method": "cash_on_delivery",
            })),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/admin/orders/{order_id}/status"),
            Some(&admin),
            Some(json!({"status": "shipped"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["order"]["status"], json!("shipped"));

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/admin/orders/{order_id}/status"),
            Some(&admin),
            Some(json!({"status": "delivered"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_edits_an_order() {
    let h = harness(ScriptedGateway::Accept);
    let product_id = seed_product(&h, "100.00", 5).await;
    let (_, customer) = seed_user(&h, Role::Customer);
    let (_, admin) = seed_user(&h, Role::Admin);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/orders",
            Some(&customer),
            Some(json!({
                "items": [{"product_id": product_id, "quantity": 1}],
                "payment_method": "cash_on_delivery",
            })),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let edit = json!({
        "status": "cancelled",
        "payment_method": "mobile_money",
        "phone_number": "0712345678",
    });

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/admin/orders/{order_id}"),
            Some(&customer),
            Some(edit.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/admin/orders/{order_id}"),
            Some(&admin),
            Some(edit),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["order"]["status"], json!("cancelled"));
    assert_eq!(body["order"]["payment_method"], json!("mobile_money"));
    assert_eq!(body["order"]["phone_number"], json!("254712345678"));

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::PUT,
            &format!("/admin/orders/{order_id}"),
            Some(&admin),
            Some(json!({"phone_number": "12345"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_customers_cannot_read_each_others_orders() {
    let h = harness(ScriptedGateway::Accept);
    let product_id = seed_product(&h, "100.00", 5).await;
    let (_, alice) = seed_user(&h, Role::Customer);
    let (_, bob) = seed_user(&h, Role::Customer);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/orders",
            Some(&alice),
            Some(json!({
                "items": [{"product_id": product_id, "quantity": 1}],
                "payment_method": "cash_on_delivery",
            })),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/orders/{order_id}"),
            Some(&bob),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conversation_flow() {
    let h = harness(ScriptedGateway::Accept);
    let (retailer_id, retailer) = seed_user(&h, Role::Admin);
    let (_, customer) = seed_user(&h, Role::Customer);

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            "/conversations",
            Some(&customer),
            Some(json!({"retailer_id": retailer_id})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let conversation_id = body["conversation"]["id"].as_str().unwrap().to_string();

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::POST,
            &format!("/conversations/{conversation_id}/messages"),
            Some(&customer),
            Some(json!({"text": "Je, mna unga?"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // The retailer opens the thread: the message reads as seen.
    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/conversations/{conversation_id}"),
            Some(&retailer),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["conversation"]["unread_count"], json!(0));
    assert_eq!(body["messages"][0]["text"], json!("Je, mna unga?"));
    assert_eq!(body["messages"][0]["read"], json!(true));

    let response = h
        .app
        .clone()
        .oneshot(request(
            Method::GET,
            "/conversations?side=retailer",
            Some(&retailer),
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["conversations"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["conversations"][0]["last_message"],
        json!("Je, mna unga?")
    );
}

#[tokio::test]
async fn test_me_returns_the_authenticated_account() {
    let h = harness(ScriptedGateway::Accept);
    let (id, token) = seed_user(&h, Role::Customer);

    let response = h
        .app
        .clone()
        .oneshot(request(Method::GET, "/me", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["id"], json!(id.to_string()));
    assert!(body["user"].get("password_hash").is_none());
}
