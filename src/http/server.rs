//! Main router configuration assembling the login, token, client and user endpoints.

use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    context::AppState,
    handler_clients::{create_client_handler, delete_client_handler},
    handler_login::handle_login,
    handler_token::handle_oauth_token,
    handler_users::{delete_user_handler, get_user_handler, list_users_handler},
    middleware_auth::AUTH_TOKEN_HEADER,
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    let mut router = Router::new()
        .route("/login", post(handle_login))
        .route("/oauth/v2/token", post(handle_oauth_token))
        .route(
            "/user/{id}",
            get(get_user_handler).delete(delete_user_handler),
        )
        .route("/users/{client_id}", get(list_users_handler));

    // Conditionally add client API endpoints
    if ctx.config.enable_client_api {
        router = router
            .route("/createClient", post(create_client_handler))
            .route("/clients/{client_id}", delete(delete_client_handler));
    }

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static(AUTH_TOKEN_HEADER),
        ]);

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::oauth::{
        Argon2PasswordHasher, ClientService, LocalTokenIssuer, RegistrationService,
        UserAccessService, UserResolver,
    };
    use crate::storage::MemoryBileMoStorage;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_app_state(enable_client_api: bool) -> AppState {
        let config = Config {
            enable_client_api,
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

        AppState {
            config: Arc::new(config),
            storage: storage.clone(),
            registration_service,
            token_server,
            client_service: Arc::new(ClientService::new(storage.clone())),
            user_access_service: Arc::new(UserAccessService::new(storage)),
        }
    }

    fn create_client_request() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/createClient")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"redirect-uri":"https://acme.example/cb","grant-type":"password"}"#,
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_client_routes_follow_config() {
        let disabled = build_router(create_test_app_state(false));
        let response = disabled.oneshot(create_client_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let enabled = build_router(create_test_app_state(true));
        let response = enabled.oneshot(create_client_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_user_routes_require_token() {
        let router = build_router(create_test_app_state(false));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/user/some-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
