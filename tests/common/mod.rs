#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use campus_gate::{
    AppState, Config, build_router,
    clock::ManualClock,
    config::CredentialConfig,
    error::Result,
    models::{code::Code, user::User},
    repositories::MemoryStore,
    services::password_reset::CodeDelivery,
};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "root@campus.edu";
pub const PASSWORD: &str = "SecurePass123!";

/// Collects delivered reset codes instead of sending them.
#[derive(Default)]
pub struct Outbox {
    codes: Mutex<Vec<String>>,
}

impl Outbox {
    pub fn last_code(&self) -> Option<String> {
        self.codes.lock().unwrap().last().cloned()
    }
}

impl CodeDelivery for Outbox {
    fn deliver(&self, _user: &User, code: &Code) -> Result<()> {
        self.codes.lock().unwrap().push(code.value.clone());
        Ok(())
    }
}

// Shared test context
pub struct TestContext {
    pub app: Router,
    pub clock: ManualClock,
    pub outbox: Arc<Outbox>,
    pub store: MemoryStore,
}

impl TestContext {
    pub fn new() -> Self {
        let config = Config {
            admin_emails: vec![ADMIN_EMAIL.to_string()],
            credentials: CredentialConfig {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            },
            ..Config::default()
        };
        let clock = ManualClock::default();
        let outbox = Arc::new(Outbox::default());
        let store = MemoryStore::new();

        let state = AppState::with_parts(
            store.clone(),
            config,
            Arc::new(clock.clone()),
            outbox.clone(),
        );

        Self {
            app: build_router(state),
            clock,
            outbox,
            store,
        }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn post(&self, uri: &str, bearer: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, bearer, Some(body)).await
    }

    pub async fn get(&self, uri: &str, bearer: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, bearer, None).await
    }

    /// Registers an account and returns its id.
    pub async fn sign_up(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/auth/sign-up",
                None,
                json!({
                    "first_name": "Test",
                    "last_name": "User",
                    "email": email,
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "Registration failed: {body}");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Signs in and returns the `data.session` object.
    pub async fn sign_in(&self, email: &str, password: &str) -> Value {
        let (status, body) = self
            .post(
                "/auth/sign-in",
                None,
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "Login failed: {body}");
        body["data"]["session"].clone()
    }
}

pub fn token(session: &Value, field: &str) -> String {
    session[field].as_str().unwrap().to_string()
}
