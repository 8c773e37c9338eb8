//! HTTP Integration Tests
//!
//! These tests exercise the axum router end to end: client provisioning, login,
//! the token endpoint and the per-client user endpoints.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use base64::prelude::*;
use bilemo::config::Config;
use bilemo::http::{AppState, build_router};
use bilemo::oauth::{
    Argon2PasswordHasher, BileMoStorage, ClientService, LocalTokenIssuer, RegistrationService,
    Role, UserAccessService, UserResolver, UserStore,
};
use bilemo::storage::MemoryBileMoStorage;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> (Router, Arc<MemoryBileMoStorage>) {
    let config = Config {
        enable_client_api: true,
        ..Config::default()
    };
    let storage = Arc::new(MemoryBileMoStorage::new());
    let hasher = Arc::new(Argon2PasswordHasher::with_params(1024, 1, 1).unwrap());
    let token_server = Arc::new(LocalTokenIssuer::new(
        storage.clone(),
        hasher.clone(),
        *config.access_token_expiration.as_ref(),
        *config.refresh_token_expiration.as_ref(),
    ));
    let resolver = UserResolver::new(
        storage.clone(),
        hasher,
        config.username_lookup,
        *config.default_user_role.as_ref(),
    );
    let registration_service = Arc::new(RegistrationService::new(
        storage.clone(),
        resolver,
        token_server.clone(),
        config.login_scope.as_ref().clone(),
    ));

    let shared: Arc<dyn BileMoStorage> = storage.clone();
    let state = AppState {
        config: Arc::new(config),
        storage: shared.clone(),
        registration_service,
        token_server,
        client_service: Arc::new(ClientService::new(shared.clone())),
        user_access_service: Arc::new(UserAccessService::new(shared)),
    };
    (build_router(state), storage)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("X-AUTH-TOKEN", token)
        .body(Body::empty())
        .unwrap()
}

async fn create_client(app: &Router, name: &str) -> (String, String) {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/createClient",
            json!({
                "redirect-uri": "https://shop.example/callback",
                "grant-type": "password",
                "name": name
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["client_id"].as_str().unwrap().to_string(),
        body["client_secret"].as_str().unwrap().to_string(),
    )
}

async fn login(app: &Router, username: &str, client_name: &str) -> Value {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/login",
            json!({
                "username": username,
                "email": format!("{}@x.io", username),
                "password": "pw1",
                "clientName": client_name
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body
}

#[tokio::test]
async fn test_login_and_user_endpoints() {
    let (app, _) = app();
    let (client_id, _) = create_client(&app, "acme").await;

    let bob = login(&app, "bob", "acme").await;
    for field in [
        "access_token",
        "expires_in",
        "token_type",
        "scope",
        "refresh_token",
    ] {
        assert!(!bob[field].is_null(), "missing {}", field);
    }
    assert_eq!(bob["token_type"], "bearer");
    let bob_token = bob["access_token"].as_str().unwrap().to_string();

    login(&app, "carol", "acme").await;

    let (status, page) = send(
        &app,
        authed("GET", &format!("/users/{}?order=desc", client_id), &bob_token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["meta"]["total_items"], 2);
    assert_eq!(page["meta"]["current_items"], 2);
    assert_eq!(page["data"][0]["username"], "carol");
    assert!(page["data"][0].get("password").is_none());
    assert!(page["data"][0].get("confirmation_token").is_none());

    let carol_id = page["data"][0]["id"].as_str().unwrap().to_string();
    let (status, carol) = send(&app, authed("GET", &format!("/user/{}", carol_id), &bob_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(carol["email"], "carol@x.io");

    // Bob is a plain user and may not delete Carol
    let (status, body) = send(
        &app,
        authed("DELETE", &format!("/user/{}", carol_id), &bob_token),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");
}

#[tokio::test]
async fn test_other_client_cannot_see_users() {
    let (app, _) = app();
    let (acme_id, _) = create_client(&app, "acme").await;
    create_client(&app, "globex").await;

    let bob = login(&app, "bob", "acme").await;
    let bob_id = {
        let (_, page) = send(
            &app,
            authed(
                "GET",
                &format!("/users/{}", acme_id),
                bob["access_token"].as_str().unwrap(),
            ),
        )
        .await;
        page["data"][0]["id"].as_str().unwrap().to_string()
    };

    let eve = login(&app, "eve", "globex").await;
    let eve_token = eve["access_token"].as_str().unwrap();

    let (status, _) = send(&app, authed("GET", &format!("/user/{}", bob_id), eve_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, authed("GET", &format!("/users/{}", acme_id), eve_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, authed("GET", &format!("/user/{}", bob_id), "bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_login_validation_errors() {
    let (app, _) = app();
    create_client(&app, "acme").await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/login",
            json!({"username": "bob", "email": "bob@x.io", "clientName": "acme"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_field");
    assert!(
        body["error_description"]
            .as_str()
            .unwrap()
            .contains("password")
    );

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/login",
            json!({"username": "bob", "email": "bob@x.io", "password": "pw1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_client_identification");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/login",
            json!({"username": "bob", "email": "bob@x.io", "password": "pw1", "clientName": "nope"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "client_not_found");
}

#[tokio::test]
async fn test_token_endpoint_refresh_grant() {
    let (app, _) = app();
    let (client_id, client_secret) = create_client(&app, "acme").await;
    let bob = login(&app, "bob", "acme").await;

    let form = format!(
        "grant_type=refresh_token&refresh_token={}",
        bob["refresh_token"].as_str().unwrap()
    );
    let basic = BASE64_STANDARD.encode(format!("{}:{}", client_id, client_secret));
    let request = Request::builder()
        .method("POST")
        .uri("/oauth/v2/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::AUTHORIZATION, format!("Basic {}", basic))
        .body(Body::from(form.clone()))
        .unwrap();
    let (status, refreshed) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{}", refreshed);
    assert_ne!(refreshed["access_token"], bob["access_token"]);
    assert_eq!(refreshed["scope"], "ROLE_USER");

    // The old access token was revoked with the refresh token
    let (status, _) = send(
        &app,
        authed(
            "GET",
            &format!("/users/{}", client_id),
            bob["access_token"].as_str().unwrap(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let replay = Request::builder()
        .method("POST")
        .uri("/oauth/v2/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::AUTHORIZATION, format!("Basic {}", basic))
        .body(Body::from(form))
        .unwrap();
    let (status, body) = send(&app, replay).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");

    let password_grant = Request::builder()
        .method("POST")
        .uri("/oauth/v2/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!(
            "grant_type=password&username=bob&password=wrong&client_id={}&client_secret={}",
            client_id, client_secret
        )))
        .unwrap();
    let (status, body) = send(&app, password_grant).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_self_delete_and_admin_delete() {
    let (app, storage) = app();
    let (client_id, _) = create_client(&app, "acme").await;

    let alice = login(&app, "alice", "acme").await;
    let bob = login(&app, "bob", "acme").await;
    let carol = login(&app, "carol", "acme").await;

    let mut alice_user = storage.find_user_by_username("alice").await.unwrap().unwrap();
    alice_user.role = Role::Admin;
    storage.update_user(&alice_user).await.unwrap();

    let bob_id = storage.find_user_by_username("bob").await.unwrap().unwrap().id;
    let carol_id = storage.find_user_by_username("carol").await.unwrap().unwrap().id;

    let (status, _) = send(
        &app,
        authed(
            "DELETE",
            &format!("/user/{}", bob_id),
            bob["access_token"].as_str().unwrap(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        authed(
            "DELETE",
            &format!("/user/{}", carol_id),
            alice["access_token"].as_str().unwrap(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Deleted users lose their tokens
    let (status, _) = send(
        &app,
        authed(
            "GET",
            &format!("/users/{}", client_id),
            carol["access_token"].as_str().unwrap(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        authed(
            "GET",
            &format!("/user/{}", bob_id),
            alice["access_token"].as_str().unwrap(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_client_checks_secret() {
    let (app, storage) = app();
    let (client_id, client_secret) = create_client(&app, "acme").await;
    login(&app, "bob", "acme").await;

    let (status, body) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/clients/{}", client_id),
            json!({"client_secret": "wrong"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "access_denied");

    let (status, _) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/clients/{}", client_id),
            json!({"client_secret": client_secret}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let bob = storage.find_user_by_username("bob").await.unwrap().unwrap();
    assert!(bob.client_id.is_none());

    let (status, body) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/clients/{}", client_id),
            json!({"client_secret": client_secret}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "client_not_found");
}
