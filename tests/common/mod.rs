#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use social_api::config::AppConfig;
use social_api::database::InMemoryRepositoryProvider;
use social_api::{app, AppState};

pub const PASSWORD: &str = "correct horse battery";

/// Development profile with a fixed secret and the cheapest bcrypt cost.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.security.bcrypt_cost = 4;
    config
}

/// The full router over an in-memory store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: InMemoryRepositoryProvider,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let provider = InMemoryRepositoryProvider::new();
        let state = AppState::new(config, Arc::new(provider.clone()));
        Self {
            router: app(state.clone()),
            state,
            provider,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };
        Ok((status, body))
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    pub async fn register(&self, nick: &str) -> Result<i64> {
        let (status, body) = self
            .call(
                Method::POST,
                "/users",
                None,
                Some(json!({
                    "name": format!("{} Example", nick),
                    "nick": nick,
                    "email": format!("{}@example.com", nick),
                    "password": PASSWORD,
                })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} {body}");
        body["data"]["id"].as_i64().context("missing user id")
    }

    pub async fn login(&self, nick: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.call(
            Method::POST,
            "/login",
            None,
            Some(json!({
                "email": format!("{}@example.com", nick),
                "password": password,
            })),
        )
        .await
    }

    /// Register and log in; returns the id and a bearer token.
    pub async fn user(&self, nick: &str) -> Result<(i64, String)> {
        let id = self.register(nick).await?;
        let (status, body) = self.login(nick, PASSWORD).await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {status} {body}");
        let token = body["data"]["token"]
            .as_str()
            .context("missing token")?
            .to_string();
        Ok((id, token))
    }

    pub async fn create_post(&self, token: &str, title: &str) -> Result<i64> {
        let (status, body) = self
            .call(
                Method::POST,
                "/posts",
                Some(token),
                Some(json!({ "title": title, "content": format!("{} body", title) })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create post failed: {status} {body}");
        body["data"]["id"].as_i64().context("missing post id")
    }
}
