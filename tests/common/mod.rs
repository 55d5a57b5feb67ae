//! Shared helpers for the HTTP integration tests.
//!
//! Each test gets its own SQLite database from `#[sqlx::test]`, migrated from
//! `migrations/`. Requests go straight into the router with
//! `tower::ServiceExt::oneshot`, so no socket is opened.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tower::ServiceExt;

use catalog_api::config::Config;
use catalog_api::db::{DBClient, UserExt};
use catalog_api::forms::UserData;
use catalog_api::models::{Role, User};
use catalog_api::utils::{password, token};
use catalog_api::{AppState, create_router};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "secret_password";

pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_maxage: 3600,
        port: 0,
        frontend_url: "http://localhost:3000".to_string(),
        admin: None,
    }
}

/// Full router over `pool`, as `main` builds it minus CORS
pub fn build_test_app(pool: SqlitePool) -> Router {
    let state = AppState {
        env: Arc::new(test_config()),
        db_client: DBClient::new(pool),
    };
    create_router(state)
}

/// Insert a user with `PASSWORD` directly through the repository
pub async fn create_user(pool: &SqlitePool, email: &str, roles: Vec<Role>) -> User {
    let data = UserData {
        full_name: format!("Test {email}"),
        email: email.to_string(),
        password: Some(password::hash(PASSWORD).expect("hashing should succeed")),
        books: None,
        movies: None,
    };
    DBClient::new(pool.clone())
        .save_user(&data, roles)
        .await
        .expect("user creation should succeed")
}

pub fn token_for(user: &User) -> String {
    token::create_token(user.id, JWT_SECRET.as_bytes(), 3600).expect("token creation")
}

pub async fn admin_token(pool: &SqlitePool) -> String {
    let admin = create_user(pool, "admin@example.com", vec![Role::Admin]).await;
    token_for(&admin)
}

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn patch_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PATCH, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn book_body(isbn: &str) -> Value {
    json!({
        "isbn": isbn,
        "title": "Dolor similique aliquam.",
        "description": "Voluptatem voluptatem rerum in ut.",
        "author": "Jade Carroll",
        "publicationDate": "2000-09-04T17:58:04+00:00",
    })
}

pub fn movie_body(title: &str) -> Value {
    json!({
        "duration": 117,
        "title": title,
        "description": "A heist goes wrong.",
        "director": "Michael Mann",
        "publicationDate": "1995-12-15",
    })
}

/// POST as `token`, assert 201, return the created id
pub async fn create_via_api(app: Router, uri: &str, token: &str, body: Value) -> i64 {
    let response = post_json_auth(app, uri, token, body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["id"].as_i64().expect("id in response")
}
