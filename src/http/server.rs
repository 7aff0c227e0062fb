//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, control auth)
//! - Forward `/api/*` to the upstream data service through the gate
//! - Apply skip-policy reloads while serving

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, delete, get},
    Router,
};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{AppConfig, ControlConfig};
use crate::coordinator::BusyCoordinator;
use crate::gate::{GatedClient, SkipPolicy};
use crate::http::{auth, handlers, websocket};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: BusyCoordinator,
    pub client: GatedClient,
    pub upstream: Option<String>,
    pub control: ControlConfig,
}

/// HTTP surface exposing busy state and the gated upstream.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
    coordinator: BusyCoordinator,
}

impl HttpServer {
    /// Create a server with a fresh coordinator built from `config.gate`.
    pub fn new(config: AppConfig) -> Self {
        let coordinator = BusyCoordinator::from_config(&config.gate);
        Self::with_coordinator(config, coordinator)
    }

    /// Create a server around an existing coordinator.
    pub fn with_coordinator(config: AppConfig, coordinator: BusyCoordinator) -> Self {
        let state = AppState {
            client: coordinator.client(),
            coordinator: coordinator.clone(),
            upstream: config.server.upstream.clone(),
            control: config.control.clone(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            coordinator,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/status", get(handlers::get_status))
            .route("/status/ws", get(websocket::status_ws))
            .route(
                "/keys/{key}",
                get(handlers::get_key)
                    .put(handlers::set_key)
                    .delete(handlers::unset_key),
            )
            .route("/keys", delete(handlers::clear_keys))
            .route("/api/{*path}", any(forward_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::control_auth_middleware,
            ))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until `shutdown` resolves.
    ///
    /// Configs received on `config_updates` replace the gate's skip policy.
    pub async fn run<F>(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppConfig>,
        shutdown: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = ?self.config.server.upstream,
            "HTTP server starting"
        );

        let gate = self.coordinator.gate().clone();
        let reloads = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                gate.update_policy(SkipPolicy::from_config(&config.gate));
            }
        });

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;
        reloads.abort();
        result?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &BusyCoordinator {
        &self.coordinator
    }
}

/// Forward `/api/<rest>` to `<upstream>/<rest>` through the gated client.
async fn forward_handler(State(state): State<AppState>, request: Request) -> Response {
    let Some(upstream) = state.upstream.as_deref() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "No upstream configured").into_response();
    };

    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let rest = path_and_query.strip_prefix("/api").unwrap_or(path_and_query);

    let uri = match format!("{}{}", upstream.trim_end_matches('/'), rest).parse::<Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(error = %e, path = %path_and_query, "Unroutable upstream URI");
            return (StatusCode::BAD_REQUEST, "Invalid request path").into_response();
        }
    };
    tracing::debug!(method = %parts.method, uri = %uri, "Forwarding request");

    parts.uri = uri;
    parts.headers.remove(header::HOST);
    let request = Request::from_parts(parts, body);

    match state.client.clone().oneshot(request).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Wait for Ctrl+C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
