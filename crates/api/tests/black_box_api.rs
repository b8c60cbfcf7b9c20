use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use seasons_auth::{JwtClaims, Role};
use seasons_core::UserId;
use seasons_infra::RentalConfig;

const SECRET: &str = "test-secret";

const LOOK: [&str; 5] = [
    "linen-shirt",
    "wool-coat",
    "silk-scarf",
    "denim-jacket",
    "cashmere-knit",
];

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over the in-memory store, on an ephemeral port.
        let config = RentalConfig::in_memory(SECRET);
        let app = seasons_api::app::build_app(&config)
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

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn delete(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    /// One garment per slug, registered by an operator.
    async fn stock(&self, admin: &str, slugs: &[&str]) {
        let items: Vec<Value> = slugs
            .iter()
            .enumerate()
            .map(|(i, slug)| json!({ "product_slug": slug, "sku": format!("{slug}-{i:03}") }))
            .collect();
        let (status, body) = self
            .post(admin, "/admin/inventory/items/batch", json!({ "items": items }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    async fn fill_cart(&self, customer: &str, slugs: &[&str]) {
        for slug in slugs {
            let (status, body) = self
                .post(customer, "/basket/items", json!({ "product_slug": slug }))
                .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        roles,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn admin_token() -> String {
    mint_jwt(vec![Role::ADMIN])
}

fn customer_token() -> String {
    mint_jwt(vec![Role::CUSTOMER])
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/basket")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let srv = TestServer::spawn().await;

    let now = Utc::now();
    let claims = JwtClaims {
        sub: UserId::new(),
        roles: vec![Role::ADMIN],
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };
    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();

    let (status, _) = srv.get(&forged, "/whoami").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn whoami_reflects_token_roles() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv.get(&admin_token(), "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
    assert!(body["permissions"].as_array().unwrap().iter().any(|p| p == "*"));
}

#[tokio::test]
async fn customers_cannot_reach_admin_endpoints() {
    let srv = TestServer::spawn().await;

    let (status, body) = srv
        .post(
            &customer_token(),
            "/admin/inventory/items",
            json!({ "product_slug": "linen-shirt", "sku": "LS-001" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = srv.get(&customer_token(), "/admin/subscriptions").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn catalog_availability_is_public_and_reports_zero_for_unknown_products() {
    let srv = TestServer::spawn().await;
    srv.stock(&admin_token(), &["linen-shirt", "linen-shirt", "wool-coat"]).await;

    let res = srv
        .client
        .get(srv.url("/catalog/availability?slugs=linen-shirt,wool-coat,ghost-dress"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["availability"]["linen-shirt"], 2);
    assert_eq!(body["availability"]["wool-coat"], 1);
    assert_eq!(body["availability"]["ghost-dress"], 0);

    let res = srv
        .client
        .get(srv.url("/catalog/availability?slugs="))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn basket_rules_are_enforced_over_http() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let customer = customer_token();
    srv.stock(&admin, &LOOK).await;
    srv.stock(&admin, &["velvet-blazer"]).await;

    srv.fill_cart(&customer, &LOOK[..2]).await;

    let (status, body) = srv
        .post(&customer, "/basket/items", json!({ "product_slug": LOOK[0] }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_item");

    let (status, body) = srv
        .post(&customer, "/basket/items", json!({ "product_slug": "ghost-dress" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "out_of_stock");

    let (status, body) = srv
        .post(&customer, "/basket/items", json!({ "product_slug": "has space" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");

    srv.fill_cart(&customer, &LOOK[2..]).await;
    let (status, body) = srv
        .post(&customer, "/basket/items", json!({ "product_slug": "velvet-blazer" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "basket_full");

    let (status, body) = srv.get(&customer, "/basket/count").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 5);

    // Removing twice is fine; the second call reports nothing removed.
    let (_, body) = srv.delete(&customer, "/basket/items/wool-coat").await;
    assert_eq!(body["removed"], true);
    let (status, body) = srv.delete(&customer, "/basket/items/wool-coat").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], false);

    let (_, body) = srv.get(&customer, "/basket").await;
    assert_eq!(body["kind"], "cart");
    assert_eq!(body["capacity"], 5);
    assert_eq!(
        body["items"],
        json!(["linen-shirt", "silk-scarf", "denim-jacket", "cashmere-knit"])
    );

    let (_, body) = srv.delete(&customer, "/basket").await;
    assert_eq!(body["cleared"], 4);
}

#[tokio::test]
async fn checkout_creates_subscription_and_first_box() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let customer = customer_token();
    srv.stock(&admin, &LOOK).await;

    // An incomplete cart cannot be checked out.
    srv.fill_cart(&customer, &LOOK[..3]).await;
    let (status, body) = srv
        .post(&customer, "/subscription", json!({ "shipping_address": "1 Main St" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "basket_incomplete");

    srv.fill_cart(&customer, &LOOK[3..]).await;
    let (status, body) = srv
        .post(
            &customer,
            "/subscription",
            json!({ "shipping_address": "1 Main St", "phone": "555-0100" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["subscription"]["status"], "active");
    assert_eq!(body["box"]["cycle_number"], 1);
    assert_eq!(body["allocation"]["allocated"].as_array().unwrap().len(), 5);
    assert!(body["allocation"]["unfulfilled"].as_array().unwrap().is_empty());

    // Cart is consumed by checkout.
    let (_, body) = srv.get(&customer, "/basket/count").await;
    assert_eq!(body["count"], 0);

    let (status, body) = srv.get(&customer, "/subscription").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["swap_window_open"], false);

    let (status, body) = srv.get(&customer, "/boxes/current").await;
    assert_eq!(status, StatusCode::OK);
    let items = body["box"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 5);
    let mut slugs: Vec<&str> = items
        .iter()
        .map(|i| i["product_slug"].as_str().unwrap())
        .collect();
    slugs.sort_unstable();
    let mut expected = LOOK.to_vec();
    expected.sort_unstable();
    assert_eq!(slugs, expected);

    // Every garment of the look left the available pool.
    let (_, body) = srv.get(&admin, "/admin/inventory/stats").await;
    assert_eq!(body["stats"]["active"], 5);
    assert_eq!(body["stats"]["available"], 0);

    // One live subscription per customer.
    let (status, body) = srv
        .post(&customer, "/subscription", json!({ "shipping_address": "1 Main St" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_active");

    // Fresh cycle: the swap window is still closed.
    let (status, body) = srv
        .post(&customer, "/swap/items", json!({ "product_slug": "linen-shirt" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "window_closed");

    let (status, body) = srv.get(&customer, "/boxes/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn subscription_endpoints_require_a_subscription() {
    let srv = TestServer::spawn().await;
    let customer = customer_token();

    let (status, body) = srv.get(&customer, "/subscription").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_subscription");

    let (status, body) = srv.get(&customer, "/swap/count").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no_subscription");

    let (status, _) = srv.post(&customer, "/subscription/pause", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pause_resume_cancel_lifecycle() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let customer = customer_token();
    srv.stock(&admin, &LOOK).await;
    srv.fill_cart(&customer, &LOOK).await;
    let (status, _) = srv
        .post(&customer, "/subscription", json!({ "shipping_address": "1 Main St" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = srv.post(&customer, "/subscription/pause", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");

    let (status, body) = srv.post(&customer, "/subscription/resume", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    let (status, body) = srv.post(&customer, "/subscription/cancel", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    // The cancelled plan is still visible, but no longer live.
    let (status, body) = srv.get(&customer, "/subscription").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    let (status, _) = srv.post(&customer, "/subscription/resume", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = srv.get(&admin, "/admin/subscriptions").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn operators_drive_boxes_through_fulfilment_and_return() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();
    let customer = customer_token();
    srv.stock(&admin, &LOOK).await;
    srv.fill_cart(&customer, &LOOK).await;
    let (_, checkout) = srv
        .post(&customer, "/subscription", json!({ "shipping_address": "1 Main St" }))
        .await;
    let box_id = checkout["box"]["id"].as_str().unwrap().to_string();

    // Label before the box has shipped is rejected.
    let (status, body) = srv
        .post(
            &admin,
            &format!("/admin/boxes/{box_id}/return-label"),
            json!({ "url": "https://labels.example/1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"], "validation_failed");

    for next in ["shipped", "active"] {
        let (status, body) = srv
            .post(&admin, &format!("/admin/boxes/{box_id}/status"), json!({ "status": next }))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], next);
    }

    let (status, body) = srv
        .post(&admin, &format!("/admin/boxes/{box_id}/status"), json!({ "status": "teleported" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");

    let (status, body) = srv
        .post(
            &admin,
            &format!("/admin/boxes/{box_id}/return-label"),
            json!({ "url": "https://labels.example/1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["return_label_url"], "https://labels.example/1");

    let (status, body) = srv
        .post(&admin, &format!("/admin/boxes/{box_id}/return"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["box"]["status"], "returned");
    assert_eq!(body["quarantined"].as_array().unwrap().len(), 5);

    // Quarantined garments are not claimable today.
    let (_, body) = srv.get(&admin, "/admin/inventory/stats").await;
    assert_eq!(body["stats"]["quarantine"], 5);
    assert_eq!(body["allocatable"], 0);

    let (status, body) = srv
        .post(&admin, &format!("/admin/boxes/{}/return", uuid_v4_like()), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");
}

#[tokio::test]
async fn operators_maintain_the_fleet() {
    let srv = TestServer::spawn().await;
    let admin = admin_token();

    let (status, item) = srv
        .post(
            &admin,
            "/admin/inventory/items",
            json!({ "product_slug": "linen-shirt", "sku": "LS-001", "condition_notes": "new" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{item}");
    assert_eq!(item["state"], "available");
    assert_eq!(item["eligible"], true);
    let id = item["id"].as_str().unwrap().to_string();

    let (status, body) = srv
        .post(
            &admin,
            "/admin/inventory/items",
            json!({ "product_slug": "linen-shirt", "sku": "LS-001" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_sku");

    // A batch with one bad row registers nothing.
    let (status, body) = srv
        .post(
            &admin,
            "/admin/inventory/items/batch",
            json!({ "items": [
                { "product_slug": "wool-coat", "sku": "WC-001" },
                { "product_slug": "wool-coat", "sku": "LS-001" }
            ] }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    let (_, body) = srv.get(&admin, "/admin/inventory/items?product=wool-coat").await;
    assert!(body.as_array().unwrap().is_empty());

    // Available garments cannot skip straight to transit.
    let (status, body) = srv
        .post(
            &admin,
            &format!("/admin/inventory/items/{id}/state"),
            json!({ "state": "in_transit" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_transition");

    for next in ["active", "in_transit"] {
        let (status, body) = srv
            .post(
                &admin,
                &format!("/admin/inventory/items/{id}/state"),
                json!({ "state": next }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["state"], next);
    }

    let (status, body) = srv
        .post(
            &admin,
            &format!("/admin/inventory/items/{id}/retire"),
            json!({ "reason": "torn seam" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["state"], "retired");
    assert_eq!(body["retirement_reason"], "torn seam");

    // Retired is terminal.
    let (status, body) = srv
        .post(
            &admin,
            &format!("/admin/inventory/items/{id}/state"),
            json!({ "state": "available" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_transition");

    let (status, body) = srv.get(&admin, &format!("/admin/inventory/items/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sku"], "LS-001");

    let (status, _) = srv.get(&admin, "/admin/inventory/items/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn uuid_v4_like() -> String {
    "00000000-0000-4000-8000-000000000000".to_string()
}
