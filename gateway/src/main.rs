mod api;
mod config;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Request, State},
    response::Response,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Internal imports
use crate::config::GatewayConfig;
use assistant_core::{AgentCatalog, Classifier, Dispatcher, Method, RouteError, ServiceProfile};

// Shared by every request. The dispatcher is read-only, so no locking.
#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    mount_prefixes: Arc<Vec<String>>,
    max_body_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // 1. Logging Setup (RUST_LOG wins, otherwise info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    info!("Financial Assistant Gateway Initializing...");

    // 2. Configuration
    let config = GatewayConfig::from_env()?;

    // 3. Agent Catalog
    let catalog = match &config.catalog_path {
        Some(path) => {
            info!("Loading agent catalog from {}", path.display());
            AgentCatalog::load(path).await?
        }
        None => AgentCatalog::builtin(),
    };
    info!("Reporting {} agents.", catalog.len());

    // 4. Dispatcher (classifier + routes)
    let dispatcher = Dispatcher::new(ServiceProfile::default(), Classifier::default(), catalog);

    let state = AppState {
        dispatcher: Arc::new(dispatcher),
        mount_prefixes: Arc::new(config.mount_prefixes.clone()),
        max_body_bytes: config.max_body_bytes,
    };

    // 5. Start Server
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Gateway listening on {} (mounts: {:?})", config.bind, config.mount_prefixes);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Gateway stopped.");
    Ok(())
}

// Every method and path lands in one handler; the dispatcher owns routing,
// including the 404 body and OPTIONS on unknown paths.
fn app(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections...");
}

// --- HANDLERS ---

async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let method = Method::from(parts.method.as_str());
    let path = api::strip_mount_prefix(parts.uri.path(), &state.mount_prefixes);

    // Only POST routes look at the body
    let raw = if method == Method::Post {
        match axum::body::to_bytes(body, state.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = RouteError::Internal(format!("Failed to read request body: {}", e));
                return api::into_response(state.dispatcher.reject(err));
            }
        }
    } else {
        Bytes::new()
    };

    api::into_response(state.dispatcher.route(&method, path, &raw))
}
