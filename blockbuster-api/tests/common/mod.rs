//! Common test utilities for router tests
//!
//! Every test gets its own router over a fresh in-memory store and drives
//! it with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use blockbuster_api::app::{build_router, AppState};
use blockbuster_api::config::Config;
use serde_json::{json, Value};
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
}

/// Response status plus the decoded JSON body (`Null` when empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let state = AppState::in_memory(Config::default());
        Self {
            router: build_router(state),
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    /// Creates a movie and returns its id
    pub async fn create_movie(&self, name: &str, quantity: i32) -> String {
        let response = self
            .post(
                "/movies",
                json!({
                    "name": name,
                    "director": "Christopher Nolan",
                    "year": 2010,
                    "quantity": quantity,
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    /// Creates a user and returns its id
    pub async fn create_user(&self, name: &str) -> String {
        let response = self
            .post(
                "/users",
                json!({
                    "user_name": name,
                    "email": format!("{}@example.com", name.to_lowercase()),
                }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    pub async fn movie_quantity(&self, movie_id: &str) -> i64 {
        let response = self.get(&format!("/movies/{}", movie_id)).await;
        assert_eq!(response.status, StatusCode::OK);
        response.body["quantity"].as_i64().unwrap()
    }
}
