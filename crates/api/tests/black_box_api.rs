use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use tillpoint_api::app::{AppServices, build_app};
use tillpoint_api::config::AppConfig;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(config: AppConfig) -> Self {
        // Same router as prod, bound to an ephemeral port.
        let services = Arc::new(AppServices::build(&config).expect("services start"));
        let app = build_app(services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn start() -> Self {
        Self::spawn(AppConfig::for_tests("test-secret")).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn token(&self, username: &str, password: &str) -> String {
        let res = self.login(username, password).await;
        assert_eq!(res.status(), StatusCode::OK, "login as {username}");
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn admin(&self) -> String {
        self.token("admin", "admin123").await
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap();
        split(res).await
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
        split(res).await
    }

    async fn create_user(&self, admin: &str, username: &str, role: &str) -> Value {
        let (status, body) = self
            .post(
                admin,
                "/users",
                json!({ "username": username, "role": role, "password": "secret-pw" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn create_product(&self, token: &str, name: &str, quantity: u64) -> String {
        let (status, body) = self
            .post(
                token,
                "/products",
                json!({
                    "name": name,
                    "category": "food",
                    "purchase_price": "15.00",
                    "full_price": "20.00",
                    "quantity": quantity
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["product_id"].as_str().unwrap().to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn split(res: reqwest::Response) -> (StatusCode, Value) {
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_is_public_and_everything_else_needs_a_token() {
    let srv = TestServer::start().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthenticated");

    let (status, _) = srv.get("not-a-token", "/products").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn seeded_admin_can_sign_in() {
    let srv = TestServer::start().await;

    let res = srv.login("admin", "wrong-password").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let token = srv.token("ADMIN", "admin123").await;
    let (status, me) = srv.get(&token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
    assert_eq!(me["role"], "admin");
}

#[tokio::test]
async fn checkout_deducts_stock_and_refuses_oversell() {
    let srv = TestServer::start().await;
    let admin = srv.admin().await;
    let rice = srv.create_product(&admin, "Rice", 10).await;

    let (status, quote) = srv
        .post(&admin, "/pos/preview", json!({ "items": [{ "product_id": rice, "quantity": 2 }] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["total"], 4000);

    let (status, outcome) = srv
        .post(
            &admin,
            "/pos/checkout",
            json!({
                "items": [{ "product_id": rice, "quantity": 2, "unit_type": "full" }],
                "payment_method": "cash",
                "amount_paid": "50.00"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{outcome}");
    assert_eq!(outcome["sale"]["total"], 4000);
    assert_eq!(outcome["sale"]["payment"]["change_given"], 1000);

    let (_, product) = srv.get(&admin, &format!("/products/{rice}")).await;
    assert_eq!(product["packs"], "8");

    let sale_id = outcome["sale"]["sale_id"].as_str().unwrap();
    let (status, receipt) = srv.get(&admin, &format!("/sales/{sale_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["lines"].as_array().unwrap().len(), 1);

    let (status, err) = srv
        .post(
            &admin,
            "/pos/checkout",
            json!({ "items": [{ "product_id": rice, "quantity": 9 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"]["code"], "insufficient_stock");

    let (_, product) = srv.get(&admin, &format!("/products/{rice}")).await;
    assert_eq!(product["packs"], "8");
}

#[tokio::test]
async fn pending_sale_holds_no_stock_until_completed() {
    let srv = TestServer::start().await;
    let admin = srv.admin().await;
    let oil = srv.create_product(&admin, "Oil", 5).await;

    let (status, outcome) = srv
        .post(
            &admin,
            "/pos/checkout",
            json!({ "items": [{ "product_id": oil, "quantity": 1, "unit_type": "half" }], "status": "pending" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{outcome}");
    let sale_id = outcome["sale"]["sale_id"].as_str().unwrap().to_string();

    let (_, product) = srv.get(&admin, &format!("/products/{oil}")).await;
    assert_eq!(product["packs"], "5");

    let (status, cart) = srv.get(&admin, &format!("/sales/{sale_id}/pending-cart")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"][0]["unit_type"], "half");

    let (status, sale) = srv
        .post(&admin, &format!("/sales/{sale_id}/status"), json!({ "status": "completed" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{sale}");
    assert_eq!(sale["status"], "completed");

    let (_, product) = srv.get(&admin, &format!("/products/{oil}")).await;
    assert_eq!(product["packs"], "4.5");

    let (status, sale) = srv
        .post(&admin, &format!("/sales/{sale_id}/status"), json!({ "status": "cancelled" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sale["status"], "cancelled");
    let (_, product) = srv.get(&admin, &format!("/products/{oil}")).await;
    assert_eq!(product["packs"], "5");
}

#[tokio::test]
async fn cashier_sells_but_cannot_manage() {
    let srv = TestServer::start().await;
    let admin = srv.admin().await;
    let soap = srv.create_product(&admin, "Soap", 20).await;
    srv.create_user(&admin, "ama", "cashier").await;
    let cashier = srv.token("ama", "secret-pw").await;

    let (status, err) = srv
        .post(
            &cashier,
            "/products",
            json!({ "name": "X", "category": "food", "purchase_price": "1", "full_price": "2" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"]["code"], "forbidden");

    let (status, _) = srv.get(&cashier, "/reports/profits").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = srv
        .post(&cashier, "/pos/checkout", json!({ "items": [{ "product_id": soap, "quantity": 1 }] }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, page) = srv.get(&cashier, "/sales").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);

    let (status, dash) = srv.get(&cashier, "/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["today_sales_count"], 1);
    assert!(dash["catalog"].is_null());

    let (_, dash) = srv.get(&admin, "/dashboard").await;
    assert_eq!(dash["catalog"]["product_count"], 1);
}

#[tokio::test]
async fn reset_password_forces_a_change_before_anything_else() {
    let srv = TestServer::start().await;
    let admin = srv.admin().await;
    let kofi = srv.create_user(&admin, "kofi", "manager").await;
    let kofi_id = kofi["user_id"].as_str().unwrap();

    let (status, reset) = srv
        .post(&admin, &format!("/users/{kofi_id}/reset-password"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let temporary = reset["temporary_password"].as_str().unwrap().to_string();

    let token = srv.token("kofi", &temporary).await;
    let (status, err) = srv.get(&token, "/products").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"]["code"], "password_change_required");

    let (status, changed) = srv
        .post(
            &token,
            "/auth/change-password",
            json!({ "current_password": temporary, "new_password": "brand-new-pw", "confirm_password": "brand-new-pw" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{changed}");
    let fresh = changed["token"].as_str().unwrap();

    let (status, _) = srv.get(fresh, "/products").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_cannot_lock_themselves_out() {
    let srv = TestServer::start().await;
    let admin = srv.admin().await;
    let (_, me) = srv.get(&admin, "/whoami").await;
    let my_id = me["user_id"].as_str().unwrap();

    let (status, err) = srv
        .post(&admin, &format!("/users/{my_id}/toggle-active"), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"]["message"], "You cannot deactivate your own account.");

    let res = srv
        .client
        .delete(srv.url(&format!("/users/{my_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deactivated_user_token_stops_working() {
    let srv = TestServer::start().await;
    let admin = srv.admin().await;
    let esi = srv.create_user(&admin, "esi", "cashier").await;
    let esi_token = srv.token("esi", "secret-pw").await;

    let (status, _) = srv.get(&esi_token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);

    let esi_id = esi["user_id"].as_str().unwrap();
    let (status, _) = srv
        .post(&admin, &format!("/users/{esi_id}/toggle-active"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = srv.get(&esi_token, "/whoami").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(srv.login("esi", "secret-pw").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expenses_roll_up_into_the_summary() {
    let srv = TestServer::start().await;
    let admin = srv.admin().await;

    for amount in ["100.00", "50.50"] {
        let (status, body) = srv
            .post(
                &admin,
                "/expenses",
                json!({ "category": "utilities", "description": "Power bill", "amount": amount, "date": "2026-03-10" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let (status, summary) = srv
        .get(&admin, "/expenses/summary?start_date=2026-03-01&end_date=2026-03-31")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total"], 15050);
    assert_eq!(summary["days_in_period"], 31);
    assert_eq!(summary["by_category"][0]["category"], "utilities");

    let (status, err) = srv
        .post(
            &admin,
            "/expenses",
            json!({ "category": "utilities", "description": "Nothing", "amount": "0" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{err}");
}

#[tokio::test]
async fn journal_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::for_tests("test-secret");
    config.journal_path = Some(dir.path().join("events.jsonl"));

    let product_id = {
        let srv = TestServer::spawn(config.clone()).await;
        let admin = srv.admin().await;
        srv.create_product(&admin, "Sugar", 7).await
    };

    let srv = TestServer::spawn(config).await;
    let admin = srv.admin().await;
    let (status, product) = srv.get(&admin, &format!("/products/{product_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["name"], "Sugar");

    let (_, users) = srv.get(&admin, "/users").await;
    assert_eq!(users["items"].as_array().unwrap().len(), 1);
}
