//! HTTP API gateway for MacroSage.
//!
//! Exposes the chat endpoint, per-user profile and history management,
//! a stateless economic dashboard rollup, and a health check.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::response::Json;
use axum::{Router, routing::get};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use macrosage_agent::{AgentLoop, ChatService, ContextAssembler, Reasoner, ToolDispatcher};
use macrosage_config::AppConfig;
use macrosage_core::store::MemoryStore;
use macrosage_memory::SqliteStore;
use macrosage_reasoner::OpenAiCompatBackend;
use macrosage_tools::{UpstreamClients, default_registry};

/// Shared application state for the gateway.
pub struct AppState {
    pub chat: ChatService,
    pub clients: UpstreamClients,
}

pub type SharedState = Arc<AppState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - CORS open to any origin (the API carries no credentials)
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .merge(api::api_router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the full advisor stack from config and start the HTTP server.
///
/// Subsystems are built once and shared: one SQLite pool, one upstream
/// HTTP client, one reasoning backend.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store: Arc<dyn MemoryStore> = Arc::new(SqliteStore::new(&config.database.path).await?);
    let clients = UpstreamClients::from_config(&config.upstream)?;
    let registry = Arc::new(default_registry(&clients));

    let backend = OpenAiCompatBackend::new(
        &config.llm.base_url,
        config.llm.api_key.clone().unwrap_or_default(),
    )?;
    let reasoner = Reasoner::new(
        Arc::new(backend),
        &config.llm.model,
        config.llm.temperature,
        config.llm.max_tokens,
    );

    let agent = AgentLoop::new(
        reasoner,
        ToolDispatcher::new(registry, Duration::from_secs(config.agent.tool_timeout_secs)),
        ContextAssembler::new(
            config.agent.context_budget_chars,
            config.agent.history_limit as usize,
        ),
        config.agent.max_iterations,
    );

    let state = Arc::new(AppState {
        chat: ChatService::new(agent, store, config.agent.history_limit),
        clients,
    });

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
