//! Memex Server
//!
//! Multi-tenant digital-memory fleet server: path-prefixed HTTP over one
//! record store + vector index per instance, JSON-RPC tool calls, a
//! differential sync endpoint, and a streaming chat orchestrator.

mod ai_validator;
mod audit;
mod auth;
mod chat_provider;
mod config;
mod error;
mod handlers;
mod instance;
mod pages;
mod rate_limit;
mod sessions;
mod state;
mod tools;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use chat_provider::NullChatProvider;
use config::ServerConfig;
use instance::Instance;
use state::{AppState, Inner};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "memex_server=info,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    let mut instances = HashMap::new();
    for name in &config.instances {
        let record_dir = config.record_dir(name);
        let pages_dir = config.pages_dir.join(name);
        instances.insert(name.clone(), Arc::new(Instance::new(name.clone(), record_dir, pages_dir)));
    }
    tracing::info!("loaded {} instance(s): {:?}", instances.len(), instances.keys().collect::<Vec<_>>());

    let auth_store = auth::AuthStore::load(&config.api_keys_path, config.prometheus_token.clone(), config.instances.clone());

    let audit = audit::AuditLog::open(&config.log_dir)?;

    let policy = ai_validator::AiValidator::load_policy(config.security_policy_path.as_deref());
    let chat_provider: Arc<dyn chat_provider::ChatProvider> = match std::env::var("CHAT_PROVIDER_URL") {
        Ok(url) => Arc::new(chat_provider::HttpChatProvider::new(url, std::env::var("CHAT_PROVIDER_API_KEY").ok())),
        Err(_) => Arc::new(NullChatProvider),
    };
    let validator_provider: Box<dyn chat_provider::ChatProvider> = match std::env::var("CHAT_PROVIDER_URL") {
        Ok(url) => Box::new(chat_provider::HttpChatProvider::new(url, std::env::var("CHAT_PROVIDER_API_KEY").ok())),
        Err(_) => Box::new(NullChatProvider),
    };
    let validator = Arc::new(ai_validator::AiValidator::new(validator_provider, policy, config.validator_timeout));

    let sessions = Arc::new(sessions::SessionTable::new());
    sessions::spawn_sweeper(sessions.clone());

    let max_request_bytes = config.max_request_bytes;
    let host = config.host.clone();
    let port = config.port;

    let state = AppState(Arc::new(Inner {
        config,
        instances,
        auth: auth_store,
        rate_limiter: rate_limit::RateLimiter::new(),
        audit,
        validator,
        chat_provider,
        sessions,
        started_at: Instant::now(),
    }));

    let app = build_router(state).layer(DefaultBodyLimit::max(max_request_bytes)).layer(CorsLayer::permissive()).layer(TraceLayer::new_for_http());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("memex-server listening on {addr}");

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    let instance_routes = Router::new()
        .route("/{instance}/mcp", post(handlers::mcp::mcp_handler))
        .route("/{instance}/sync/status", get(handlers::sync::sync_status))
        .route("/{instance}/sync", post(handlers::sync::sync_upload))
        .route("/{instance}/chat", post(handlers::chat::chat_instance))
        .route("/{instance}/chat/{session_id}", delete(handlers::chat::delete_session));

    let public_routes = Router::new()
        .route("/health", get(handlers::dashboard::health))
        .route("/api/info", get(handlers::dashboard::api_info))
        .route("/api/metrics", get(handlers::dashboard::api_metrics))
        .route("/api/instance/{name}/detail", get(handlers::dashboard::instance_detail))
        .route("/api/pages", get(handlers::dashboard::api_pages))
        .route("/pages/{slug}", get(handlers::dashboard::get_page))
        .route("/screenshots/{instance}/{filename}", get(handlers::dashboard::get_screenshot))
        .route("/chat", post(handlers::chat::chat_cross_instance));

    Router::new().merge(instance_routes).merge(public_routes).with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down gracefully"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down gracefully"),
    }
}
