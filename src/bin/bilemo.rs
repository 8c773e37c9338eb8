//! BileMo API server binary.
//!
//! Main application entry point that wires storage, password hashing and the
//! token issuer together and starts the HTTP server with graceful shutdown.

use anyhow::Result;
use bilemo::{
    config::Config,
    http::{AppState, build_router},
    oauth::{
        AccessTokenStore, Argon2PasswordHasher, ClientService, LocalTokenIssuer,
        RefreshTokenStore, RegistrationService, RemoteTokenIssuer, TokenIssuer,
        UserAccessService, UserResolver,
    },
    storage::{create_storage_backend, parse_storage_backend},
};
use std::{env, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_subscriber::prelude::*;

const TOKEN_CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bilemo=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();

    let version = bilemo::config::version()?;

    env::args().for_each(|arg| {
        if arg == "--version" {
            println!("{version}");
            std::process::exit(0);
        }
    });

    tracing::info!(?version, "Starting BileMo");

    let config = Config::new()?;

    // Parse storage backend configuration
    let storage_backend =
        parse_storage_backend(&config.storage_backend, config.database_url.as_deref())?;
    tracing::info!(?storage_backend, "Initializing storage");
    let storage = create_storage_backend(storage_backend).await?;

    let hasher = Arc::new(Argon2PasswordHasher::new());

    let token_server = Arc::new(LocalTokenIssuer::new(
        storage.clone(),
        hasher.clone(),
        *config.access_token_expiration.as_ref(),
        *config.refresh_token_expiration.as_ref(),
    ));

    // Forward login grants to an external token endpoint when one is configured
    let issuer: Arc<dyn TokenIssuer> = match &config.token_issuer_url {
        Some(token_issuer_url) => {
            let http_client = reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .timeout(*config.http_client_timeout.as_ref())
                .build()?;
            tracing::info!(endpoint = %token_issuer_url.as_ref(), "Using remote token issuer");
            Arc::new(RemoteTokenIssuer::new(
                http_client,
                token_issuer_url.as_ref().clone(),
            ))
        }
        None => token_server.clone(),
    };

    let resolver = UserResolver::new(
        storage.clone(),
        hasher,
        config.username_lookup,
        *config.default_user_role.as_ref(),
    );
    let registration_service = Arc::new(RegistrationService::new(
        storage.clone(),
        resolver,
        issuer,
        config.login_scope.as_ref().clone(),
    ));

    // Create application context
    let app_context = AppState {
        config: Arc::new(config.clone()),
        storage: storage.clone(),
        registration_service,
        token_server,
        client_service: Arc::new(ClientService::new(storage.clone())),
        user_access_service: Arc::new(UserAccessService::new(storage.clone())),
    };

    // Build the router
    let app = build_router(app_context);

    // Setup graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    {
        let tracker = tracker.clone();
        let inner_token = token.clone();

        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                tracing::error!("failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(err) => {
                    tracing::error!("failed to install signal handler: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::spawn(async move {
            tokio::select! {
                () = inner_token.cancelled() => { },
                _ = terminate => {},
                _ = ctrl_c => {},
            }

            tracker.close();
            inner_token.cancel();
        });
    }

    // Periodically drop expired access and refresh tokens
    {
        let inner_token = token.clone();
        let storage = storage.clone();
        tracker.spawn(async move {
            let mut interval = tokio::time::interval(TOKEN_CLEANUP_INTERVAL);
            loop {
                tokio::select! {
                    () = inner_token.cancelled() => break,
                    _ = interval.tick() => {
                        match storage.cleanup_expired_tokens().await {
                            Ok(0) => {}
                            Ok(removed) => tracing::info!(removed, "expired access tokens removed"),
                            Err(err) => tracing::warn!(error = ?err, "access token cleanup failed"),
                        }
                        match storage.cleanup_expired_refresh_tokens().await {
                            Ok(0) => {}
                            Ok(removed) => tracing::info!(removed, "expired refresh tokens removed"),
                            Err(err) => tracing::warn!(error = ?err, "refresh token cleanup failed"),
                        }
                    }
                }
            }
        });
    }

    // Start HTTP server
    {
        let http_port = *config.http_port.as_ref();
        let inner_token = token.clone();
        let bind_address = format!("0.0.0.0:{http_port}");
        tracing::info!("Starting server on {bind_address}");
        let listener = TcpListener::bind(&bind_address).await?;

        tracker.spawn(async move {
            let shutdown_token = inner_token.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    tokio::select! {
                        () = shutdown_token.cancelled() => { }
                    }
                    tracing::info!("axum graceful shutdown complete");
                })
                .await;
            if let Err(err) = result {
                tracing::error!("axum task failed: {}", err);
            }

            inner_token.cancel();
        });
    }

    tracker.wait().await;

    Ok(())
}
