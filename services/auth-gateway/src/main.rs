//! OAuth Session Gateway
//!
//! Single-binary service that signs browser sessions in against an OAuth2
//! identity provider:
//! 1. `/auth/login` redirects to the provider consent page
//! 2. `/auth/callback` exchanges the authorization code and binds the
//!    credential to the session cookie
//! 3. Protected routes refresh expired credentials transparently
//! 4. `/auth/signout` clears the session and revokes both tokens

mod config;
mod error;
mod metrics;
mod routes;
mod session;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use oauth_client::{ProfileFetcher, TokenClient};
use session_auth::{CredentialLifecycle, MemorySessionStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::session::CookieSettings;

/// Time allowed for in-flight requests to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    auth: Arc<CredentialLifecycle>,
    sessions: Arc<MemorySessionStore>,
    cookies: CookieSettings,
    scopes: Arc<str>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

impl AppState {
    /// Wire the lifecycle manager to the in-memory session store.
    fn new(
        tokens: TokenClient,
        profiles: Option<ProfileFetcher>,
        cookies: CookieSettings,
        scopes: &str,
        prometheus: PrometheusHandle,
    ) -> Self {
        let sessions = Arc::new(MemorySessionStore::new());
        let mut auth = CredentialLifecycle::new(sessions.clone(), tokens);
        if let Some(profiles) = profiles {
            auth = auth.with_profiles(profiles);
        }

        Self {
            auth: Arc::new(auth),
            sessions,
            cookies,
            scopes: scopes.into(),
            started_at: Instant::now(),
            prometheus,
        }
    }

    fn from_config(config: &Config, prometheus: PrometheusHandle) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        let tokens = TokenClient::new(
            http.clone(),
            config.credentials()?,
            config.oauth.endpoints.clone(),
        );
        let profiles = config
            .oauth
            .profile_enabled
            .then(|| ProfileFetcher::new(http, config.oauth.endpoints.profile.clone()));

        Ok(Self::new(
            tokens,
            profiles,
            CookieSettings {
                name: config.server.session_cookie.clone(),
                secure: config.server.secure_cookies,
            },
            &config.oauth.scopes,
            prometheus,
        ))
    }
}

/// Build the axum router with all routes and shared state.
///
/// Only routes merged from `protected` pass through `require_credential`.
fn build_router(state: AppState, max_connections: usize) -> Router {
    let protected = Router::new()
        .route("/me", get(routes::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            routes::require_credential,
        ));

    Router::new()
        .route(
            "/auth/callback",
            get(routes::callback).post(routes::callback),
        )
        .route(
            "/auth/signout",
            get(routes::sign_out).post(routes::sign_out),
        )
        .route("/auth/login", get(routes::login))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(protected)
        .layer(axum::middleware::from_fn(metrics::track))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs; LOG_LEVEL wins over RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting oauth-session-gateway");

    // Recorder must exist before the first counter is touched
    let prometheus_handle = metrics::install_recorder()?;

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
        client_id = %config.oauth.client_id,
        token_endpoint = %config.oauth.endpoints.token,
        profile_enabled = config.oauth.profile_enabled,
        "configuration loaded"
    );

    let state = AppState::from_config(&config, prometheus_handle)?;
    let app = build_router(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start
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
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Liveness plus a count of signed-in sessions.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "active_sessions": state.sessions.len().await,
        "profile_enabled": state.auth.profiles_enabled(),
    }))
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
