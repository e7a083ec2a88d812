use actix_web::{web, HttpResponse};
use rental_auth::auth::TokenAuthority;
use rental_auth::configuration::{JwtSettings, PasswordSettings};
use rental_auth::directory::InMemoryDirectory;
use rental_auth::route_table::{mount, Route};
use rental_auth::startup::run;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;

pub const TEST_EMAIL: &str = "user@example.com";
pub const TEST_PASSWORD: &str = "secret123";
pub const TEST_PHONE: &str = "+1 555 0100";

pub struct TestApp {
    pub address: String,
    pub authority: TokenAuthority,
    pub client: reqwest::Client,
}

pub fn jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-test-secret-at-least-32-chars".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604800,
        issuer: "rental-api-test".to_string(),
    }
}

async fn list_vehicles() -> HttpResponse {
    HttpResponse::Ok().json(json!([{ "id": 1, "model": "Corolla" }]))
}

async fn get_vehicle(path: web::Path<u64>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "id": path.into_inner(), "model": "Corolla" }))
}

/// Stand-in for the booking service's vehicle handlers.
fn vehicle_routes(cfg: &mut web::ServiceConfig) {
    mount(cfg, Route::ListVehicles, list_vehicles);
    mount(cfg, Route::GetVehicle, get_vehicle);
}

pub fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let authority = TokenAuthority::new(
        Arc::new(InMemoryDirectory::new()),
        jwt_settings(),
        PasswordSettings { hash_cost: 4 },
    );

    let server = run(listener, authority.clone(), vehicle_routes).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        authority,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn register_test_user(&self) -> Value {
        let response = self
            .post_json(
                "/api/user/register",
                &json!({ "email": TEST_EMAIL, "phone": TEST_PHONE, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(201, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }

    /// Register the test user and log in, returning the login body.
    pub async fn login_test_user(&self) -> Value {
        self.register_test_user().await;
        let response = self
            .post_json(
                "/api/user/login",
                &json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }

    pub async fn refresh_with(&self, refresh_token: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/user/refresh"))
            .bearer_auth(refresh_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}
