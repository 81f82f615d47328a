//! Test utilities and common setup.

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use confhive::api::{self, TRANSACTION_HEADER};
use confhive::service::ConfigService;

/// Router over a fresh store in a temp directory.
pub struct TestApp {
    pub dir: TempDir,
    pub service: ConfigService,
    pub router: Router,
}

/// Create a test application with an empty store.
pub fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("host.toml"), "").unwrap();

    let service = ConfigService::local(dir.path(), Duration::from_secs(900));
    let router = api::create_router(api::AppState::new(service.clone()));
    TestApp {
        dir,
        service,
        router,
    }
}

impl TestApp {
    /// Send one request; returns the status and the JSON body (Null if empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        transaction: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri).method(method);
        if let Some(id) = transaction {
            builder = builder.header(TRANSACTION_HEADER, id);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, transaction: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, transaction, None).await
    }

    pub async fn patch(
        &self,
        uri: &str,
        transaction: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        self.send(Method::PATCH, uri, transaction, Some(body)).await
    }

    pub async fn post(&self, uri: &str, transaction: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, transaction, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, transaction: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, transaction, None).await
    }

    /// Open a transaction and return its id.
    pub async fn begin(&self) -> String {
        let (status, body) = self.post("/api/transactions", None, serde_json::json!({})).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}
