//! Google Sign-In Gateway
//!
//! Single-binary Rust service that:
//! 1. Sends browsers through Google's authorization code flow
//! 2. Persists each user's Google credential, keyed by subject id
//! 3. Hands the frontend a signed session token
//! 4. Serves session-protected endpoints that keep the Google access token fresh

mod api;
mod auth;
mod config;
mod error;
mod metrics;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use credential_lifecycle::{CredentialManager, SystemClock};
use google_auth::{
    CALLBACK_PATH, ClientConfig, CredentialStore, FileCredentialStore, GoogleClient,
    MemoryCredentialStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Url;
use session::SessionIssuer;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, StoreBackend};
use crate::metrics::ServiceMetrics;

/// Upper bound on waiting for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    manager: Arc<CredentialManager>,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
    frontend_url: Url,
    request_timeout: Duration,
    session_ttl: Duration,
    secure_cookies: bool,
}

/// Build the axum router with all routes and shared state.
///
/// The concurrency limit queues requests beyond `max_connections`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/", get(api::home))
        .route("/login", get(api::login))
        .route(CALLBACK_PATH, get(api::oauth_callback))
        .route("/api/profile", get(api::profile))
        .route("/api/token", get(api::access_token))
        .route("/api/me", get(api::me))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route_layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics::track,
        ))
        .fallback(api::not_found)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs, filtered by LOG_LEVEL or RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting auth-gateway");

    // Install before anything emits a metric
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        public_url = %config.server.public_url,
        frontend_url = %config.server.frontend_url,
        store = ?config.store.backend,
        "configuration loaded"
    );

    let app_state = build_state(&config, prometheus_handle).await?;
    let metrics = app_state.metrics.clone();
    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start: notify
    // the server to drain, then race the drain against DRAIN_TIMEOUT.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
        }
        Err(_) => {
            let remaining = metrics.in_flight.load(Ordering::Relaxed);
            warn!(
                remaining,
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Wire the Google client, credential store, session issuer and lifecycle
/// manager from the loaded configuration.
async fn build_state(config: &Config, prometheus: PrometheusHandle) -> Result<AppState> {
    let client_secret = config
        .google
        .client_secret
        .clone()
        .context("google client secret not resolved")?;
    let signing_secret = config
        .session
        .secret
        .as_ref()
        .context("session secret not resolved")?;

    let mut client_config =
        ClientConfig::new(&config.google.client_id, client_secret, config.redirect_uri());
    if let Some(endpoint) = &config.google.auth_endpoint {
        client_config.auth_endpoint = endpoint.clone();
    }
    if let Some(endpoint) = &config.google.token_endpoint {
        client_config.token_endpoint = endpoint.clone();
    }
    if let Some(endpoint) = &config.google.userinfo_endpoint {
        client_config.userinfo_endpoint = endpoint.clone();
    }
    client_config.timeout = config.request_timeout();

    let client = GoogleClient::new(reqwest::Client::new(), client_config)
        .context("invalid Google client configuration")?;

    let store: Arc<dyn CredentialStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(MemoryCredentialStore::new()),
        StoreBackend::File => {
            let path = config
                .store
                .path
                .clone()
                .context("store.path is required for the file backend")?;
            let store = FileCredentialStore::load(path.clone())
                .await
                .with_context(|| format!("failed to open credential store {}", path.display()))?;
            info!(
                path = %path.display(),
                credentials = store.len().await,
                "credential store loaded"
            );
            Arc::new(store)
        }
    };

    let issuer = SessionIssuer::new(signing_secret).context("invalid session secret")?;

    let manager = CredentialManager::new(
        Arc::new(client),
        store,
        Arc::new(issuer),
        Arc::new(SystemClock),
        config.session_ttl(),
    );

    let frontend_url = Url::parse(&config.server.frontend_url)
        .with_context(|| format!("invalid frontend_url {}", config.server.frontend_url))?;

    Ok(AppState {
        manager: Arc::new(manager),
        metrics: ServiceMetrics::new(),
        prometheus,
        frontend_url,
        request_timeout: config.request_timeout(),
        session_ttl: config.session_ttl(),
        secure_cookies: config.server.secure_cookies,
    })
}

/// Health endpoint: status, credential store backend, uptime and counters.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "store": state.manager.store().backend(),
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
