use chrono::{Duration as ChronoDuration, Utc};
use dealspark_api::config::ApiConfig;
use dealspark_auth::{AccountRole, JwtClaims};
use dealspark_core::UserId;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Same router as prod, in-memory stores, ephemeral port.
        let app = dealspark_api::app::build_app(&ApiConfig::with_secret(jwt_secret))
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, user: UserId, role: AccountRole) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: user,
        role,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn create_product(client: &reqwest::Client, srv: &TestServer, owner: &str, deal_price: u64) -> String {
    let res = client
        .post(srv.url("/products"))
        .bearer_auth(owner)
        .json(&json!({ "name": "Camera", "category": "electronics", "dealPrice": deal_price }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

async fn count(client: &reqwest::Client, srv: &TestServer, token: &str, party: &str) -> u64 {
    let res = client
        .get(srv.url(&format!("/offers/{party}/count")))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    body["count"].as_u64().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn(SECRET).await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client.get(srv.url("/offers/buyer")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let forged = mint_jwt("some-other-secret", UserId::new(), AccountRole::Buyer);
    let res = client
        .get(srv.url("/whoami"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn(SECRET).await;
    let user = UserId::new();
    let token = mint_jwt(SECRET, user, AccountRole::Owner);

    let res = reqwest::Client::new()
        .get(srv.url("/whoami"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["id"].as_str().unwrap(), user.to_string());
    assert_eq!(body["role"], "owner");
}

#[tokio::test]
async fn only_owner_accounts_list_products_and_browsing_is_public() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let owner = mint_jwt(SECRET, UserId::new(), AccountRole::Owner);
    let buyer = mint_jwt(SECRET, UserId::new(), AccountRole::Buyer);

    let res = client
        .post(srv.url("/products"))
        .bearer_auth(&buyer)
        .json(&json!({ "name": "Camera", "dealPrice": 1000 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let product_id = create_product(&client, &srv, &owner, 1000).await;

    let res = client.get(srv.url("/products?category=ELECTRONICS")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let list: Value = res.json().await.unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let res = client.get(srv.url(&format!("/products/{product_id}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let product: Value = res.json().await.unwrap();
    assert_eq!(product["dealPrice"], 1000);

    let res = client.get(srv.url("/products/not-a-uuid")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let res = client
        .get(srv.url("/products/mine"))
        .bearer_auth(&owner)
        .send()
        .await
        .unwrap();
    let mine: Value = res.json().await.unwrap();
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn offer_negotiation_lifecycle() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let owner = mint_jwt(SECRET, UserId::new(), AccountRole::Owner);
    let buyer = mint_jwt(SECRET, UserId::new(), AccountRole::Buyer);
    let product_id = create_product(&client, &srv, &owner, 1000).await;

    // Below 95% of the deal price.
    let res = client
        .post(srv.url("/offers"))
        .bearer_auth(&buyer)
        .json(&json!({ "productId": product_id, "offeredPrice": 900 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["message"], "offer must be at least 950");

    let res = client
        .post(srv.url("/offers"))
        .bearer_auth(&buyer)
        .json(&json!({ "productId": product_id, "offeredPrice": 960 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let offer: Value = res.json().await.unwrap();
    assert_eq!(offer["status"], "pending");
    assert_eq!(offer["product"]["name"], "Camera");
    let offer_id = offer["id"].as_str().unwrap().to_string();

    let res = client
        .post(srv.url("/offers"))
        .bearer_auth(&buyer)
        .json(&json!({ "productId": product_id, "offeredPrice": 970 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");

    assert_eq!(count(&client, &srv, &owner, "owner").await, 1);
    assert_eq!(count(&client, &srv, &buyer, "buyer").await, 1);

    // Buyer cannot act while the owner is expected to.
    let res = client
        .patch(srv.url(&format!("/offers/{offer_id}")))
        .bearer_auth(&buyer)
        .json(&json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");

    let res = client
        .patch(srv.url(&format!("/offers/{offer_id}")))
        .bearer_auth(&owner)
        .json(&json!({ "status": "countered", "counterPrice": 990 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let offer: Value = res.json().await.unwrap();
    assert_eq!(offer["status"], "countered_by_owner");
    assert_eq!(offer["counterPrice"], 990);

    assert_eq!(count(&client, &srv, &owner, "owner").await, 0);
    assert_eq!(count(&client, &srv, &buyer, "buyer").await, 1);

    let res = client
        .get(srv.url(&format!("/offers/my-offer/{product_id}")))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    let mine: Value = res.json().await.unwrap();
    assert_eq!(mine["id"].as_str().unwrap(), offer_id);

    let res = client
        .post(srv.url("/offers/buyer/mark-seen"))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);

    let res = client
        .patch(srv.url(&format!("/offers/{offer_id}")))
        .bearer_auth(&buyer)
        .json(&json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let offer: Value = res.json().await.unwrap();
    assert_eq!(offer["status"], "accepted");
    assert_eq!(offer["counterPrice"], 990);
    assert_eq!(offer["history"].as_array().unwrap().len(), 3);

    // Terminal: nothing more can happen, but a new offer is now allowed.
    let res = client
        .patch(srv.url(&format!("/offers/{offer_id}")))
        .bearer_auth(&owner)
        .json(&json!({ "status": "rejected" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(srv.url("/offers"))
        .bearer_auth(&buyer)
        .json(&json!({ "productId": product_id, "offeredPrice": 980 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url("/offers/buyer"))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    let listed: Value = res.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let res = client
        .delete(srv.url(&format!("/offers/{offer_id}")))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Offer removed");
}

#[tokio::test]
async fn offer_errors_map_to_statuses() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let owner = mint_jwt(SECRET, UserId::new(), AccountRole::Owner);
    let buyer = mint_jwt(SECRET, UserId::new(), AccountRole::Buyer);
    let stranger = mint_jwt(SECRET, UserId::new(), AccountRole::Buyer);
    let product_id = create_product(&client, &srv, &owner, 1000).await;

    let res = client
        .post(srv.url("/offers"))
        .bearer_auth(&buyer)
        .json(&json!({ "productId": "nope", "offeredPrice": 960 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/offers"))
        .bearer_auth(&buyer)
        .json(&json!({ "productId": uuid::Uuid::now_v7().to_string(), "offeredPrice": 960 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url("/offers"))
        .bearer_auth(&buyer)
        .json(&json!({ "productId": product_id, "offeredPrice": 960 }))
        .send()
        .await
        .unwrap();
    let offer: Value = res.json().await.unwrap();
    let offer_id = offer["id"].as_str().unwrap().to_string();

    let res = client
        .patch(srv.url(&format!("/offers/{offer_id}")))
        .bearer_auth(&stranger)
        .json(&json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    let res = client
        .patch(srv.url(&format!("/offers/{offer_id}")))
        .bearer_auth(&owner)
        .json(&json!({ "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .patch(srv.url(&format!("/offers/{}", uuid::Uuid::now_v7())))
        .bearer_auth(&owner)
        .json(&json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url(&format!("/offers/my-offer/{product_id}")))
        .bearer_auth(&stranger)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn payment_intent_and_orders() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let buyer = mint_jwt(SECRET, UserId::new(), AccountRole::Buyer);
    let other = mint_jwt(SECRET, UserId::new(), AccountRole::Buyer);

    let res = client
        .post(srv.url("/offers/create-payment-intent"))
        .bearer_auth(&buyer)
        .json(&json!({ "amount": 990 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let intent: Value = res.json().await.unwrap();
    let intent_id = intent["paymentIntentId"].as_str().unwrap().to_string();
    assert!(intent["clientSecret"].as_str().unwrap().starts_with(&intent_id));

    let res = client
        .post(srv.url("/offers/create-payment-intent"))
        .bearer_auth(&buyer)
        .json(&json!({ "amount": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(srv.url("/orders"))
        .bearer_auth(&buyer)
        .json(&json!({
            "items": [{ "productId": uuid::Uuid::now_v7().to_string(), "quantity": 1, "price": 990 }],
            "totalAmount": 990,
            "shippingAddress": { "city": "Pune", "country": "India" },
            "paymentIntentId": intent_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let order: Value = res.json().await.unwrap();
    assert_eq!(order["status"], "processing");
    let order_id = order["id"].as_str().unwrap().to_string();

    let res = client
        .get(srv.url(&format!("/orders/{order_id}")))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client.get(srv.url("/orders")).bearer_auth(&buyer).send().await.unwrap();
    let list: Value = res.json().await.unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);

    let res = client
        .delete(srv.url(&format!("/orders/{order_id}")))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(srv.url(&format!("/orders/{order_id}")))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_offer_bodies_are_validation_errors() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let owner = mint_jwt(SECRET, UserId::new(), AccountRole::Owner);
    let buyer = mint_jwt(SECRET, UserId::new(), AccountRole::Buyer);
    let product_id = create_product(&client, &srv, &owner, 1000).await;

    let bodies = [
        json!({ "productId": product_id, "offeredPrice": -5 }),
        json!({ "productId": product_id, "offeredPrice": 950.5 }),
        json!({ "productId": product_id, "offeredPrice": "950" }),
        json!({ "offeredPrice": 960 }),
    ];
    for body in bodies {
        let res = client
            .post(srv.url("/offers"))
            .bearer_auth(&buyer)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error"], "validation_error");
        assert!(!err["message"].as_str().unwrap().is_empty());
    }

    let res = client
        .post(srv.url("/offers"))
        .bearer_auth(&buyer)
        .json(&json!({ "productId": product_id, "offeredPrice": 960 }))
        .send()
        .await
        .unwrap();
    let offer: Value = res.json().await.unwrap();
    let offer_id = offer["id"].as_str().unwrap().to_string();

    let res = client
        .patch(srv.url(&format!("/offers/{offer_id}")))
        .bearer_auth(&owner)
        .json(&json!({ "status": "countered", "counterPrice": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error"], "validation_error");

    let res = client
        .get(srv.url(&format!("/offers/my-offer/{product_id}")))
        .bearer_auth(&buyer)
        .send()
        .await
        .unwrap();
    let mine: Value = res.json().await.unwrap();
    assert_eq!(mine["status"], "pending");
}

#[tokio::test]
async fn keyword_search_and_latest_deals_are_public() {
    let srv = TestServer::spawn(SECRET).await;
    let client = reqwest::Client::new();
    let owner = mint_jwt(SECRET, UserId::new(), AccountRole::Owner);

    for name in ["Trail Shoes", "Road Bike", "Camping Stove", "Rain Jacket"] {
        let res = client
            .post(srv.url("/products"))
            .bearer_auth(&owner)
            .json(&json!({ "name": name, "category": "outdoor", "dealPrice": 500 }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client.get(srv.url("/products/search?q=bIKE")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let hits: Value = res.json().await.unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["name"], "Road Bike");

    let res = client.get(srv.url("/products/search?q=OUTDOOR")).send().await.unwrap();
    let hits: Value = res.json().await.unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 4);

    let res = client.get(srv.url("/products/deals")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let deals: Value = res.json().await.unwrap();
    assert_eq!(deals.as_array().unwrap().len(), 3);
}
