#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tower::ServiceExt;

use lms_server::auth::Claims;
use lms_server::config::Config;
use lms_server::state::AppState;
use lms_server::storage::Storage;

pub const SECRET: &str = "integration-secret";

pub fn config() -> Config {
    let mut config = Config::new(SECRET);
    config.password_rounds = 1_000;
    config
}

pub fn app_with(config: &Config, storage: Arc<dyn Storage>) -> Router {
    lms_server::app(AppState::new(config, storage))
}

pub fn decode_claims(token: &str) -> Claims {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[config().service_name]);
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(SECRET.as_bytes()), &validation)
        .unwrap()
        .claims
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with(app, method, uri, body, Some("Bearer anything")).await
}

pub async fn send_with(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    authorization: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Creates a record and returns its id.
pub async fn create(app: &Router, entity: &str, body: Value) -> String {
    let (status, body) = send(app, Method::POST, &format!("/{entity}"), Some(body)).await;
    assert_eq!(status, StatusCode::OK, "creating {entity}: {body}");
    body["payload"]["id"].as_str().unwrap().to_string()
}
