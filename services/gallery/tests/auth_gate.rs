//! HTTP surface tests: the auth gate in front of the protected routes

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use gallery::{
    controller::Controller,
    jwt::{JwtConfig, TokenCodec},
    repositories::{MemoryAssetStore, MemoryIdentityStore, MemoryObjectStore},
    routes::create_router,
    state::AppState,
};

fn app() -> (Router, TokenCodec) {
    let tokens = TokenCodec::new(&JwtConfig {
        secret: "gate-tests".to_string(),
        token_expiry: 3600,
    });
    let identities = MemoryIdentityStore::new();
    let controller = Controller::new(
        Arc::new(identities.clone()),
        Arc::new(MemoryAssetStore::new(&identities)),
        Arc::new(MemoryObjectStore::new()),
        tokens.clone(),
    );
    let state = AppState {
        controller,
        request_timeout: Duration::from_secs(5),
        max_upload_bytes: 1024 * 1024,
        shutdown: CancellationToken::new(),
    };

    (create_router(state), tokens)
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn register(app: &Router, login: &str) -> i64 {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/users",
            json!({ "name": login, "login": login, "password": "p1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::get("/users/1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({ "message": "missing authorization token", "error": true })
    );
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let (app, _) = app();
    let response = app
        .oneshot(
            Request::get("/users/1")
                .header(header::AUTHORIZATION, "not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], json!(true));
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_login_token_reaches_handler() {
    let (app, _) = app();
    let id = register(&app, "alice").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "login": "alice", "password": "p1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = json_body(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(
            Request::get(format!("/users/{}", id))
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["login"], json!("alice"));
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_wrong_password_login_is_unauthorized() {
    let (app, _) = app();
    register(&app, "alice").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "login": "alice", "password": "nope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_modifying_another_identity_is_forbidden() {
    let (app, tokens) = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let token = tokens.issue(alice).unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/users/{}", bob))
                .header(header::AUTHORIZATION, token.as_str())
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "name": "x", "login": "bob", "password": "p9" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/users/{}", bob))
                .header(header::AUTHORIZATION, token.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_upload_returns_stored_name() {
    let (app, tokens) = app();
    let alice = register(&app, "alice").await;
    let token = tokens.issue(alice).unwrap();

    let boundary = "X-GALLERY-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cat.PNG\"\r\n\
         Content-Type: image/png\r\n\r\npixels\r\n--{b}--\r\n",
        b = boundary
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/images")
                .header(header::AUTHORIZATION, token.as_str())
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let name = json_body(response).await["name"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(name.ends_with(".png"));
}

#[tokio::test]
async fn test_lowercase_bearer_scheme_is_accepted() {
    let (app, tokens) = app();
    let alice = register(&app, "alice").await;
    let token = tokens.issue(alice).unwrap();

    let response = app
        .oneshot(
            Request::get(format!("/users/{}", alice))
                .header(header::AUTHORIZATION, format!("bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
