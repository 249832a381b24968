//! HTTP API gateway for Recruitr.
//!
//! Exposes a health check and the v1 session API. Built on Axum.

pub mod api_v1;
pub mod auth;
pub mod error;

use axum::extract::DefaultBodyLimit;
use axum::{Router, middleware, response::Json, routing::get};
use jsonwebtoken::DecodingKey;
use recruitr_agent::{Orchestrator, spawn_event_logger};
use recruitr_config::AppConfig;
use recruitr_core::event::EventBus;
use recruitr_tools::{HttpGraphQlExecutor, ToolDispatcher};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Orchestrator,
    /// HS256 key for bearer tokens. Without one, any presented token is rejected.
    pub jwt_key: Option<DecodingKey>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router: `/health` plus the authenticated `/v1` API.
pub fn build_router(state: SharedState) -> Router {
    let v1 = api_v1::v1_router(state.clone())
        .layer(middleware::from_fn_with_state(state, auth::auth_middleware));

    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", v1)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Wire provider, session store, ATS executor and tool catalogue into an
/// orchestrator. Events are published on `events`.
pub async fn assemble(
    config: &AppConfig,
    events: Arc<EventBus>,
) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let provider = recruitr_providers::from_config(config)?;
    let kv = recruitr_store::connect(&config.store).await?;
    let executor = Arc::new(HttpGraphQlExecutor::new(
        &config.graphql.endpoint,
        Duration::from_secs(config.agent.request_timeout_secs),
    ));

    let dispatcher = ToolDispatcher::new(
        recruitr_tools::registry(),
        executor,
        provider.clone(),
        &config.llm.model,
    )
    .with_events(events.clone());

    info!(
        provider = provider.name(),
        model = %config.llm.model,
        store = kv.name(),
        graphql = %config.graphql.endpoint,
        mode = ?config.agent.mode,
        "Orchestrator assembled"
    );
    Ok(Orchestrator::from_config(config, provider, dispatcher, kv, events))
}

/// Start the gateway HTTP server and run until Ctrl-C.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let events = Arc::new(EventBus::default());
    let _logger = spawn_event_logger(&events);
    let orchestrator = assemble(&config, events).await?;

    let jwt_key = config
        .gateway
        .jwt_signing_key
        .as_deref()
        .map(|key| DecodingKey::from_secret(key.as_bytes()));
    if jwt_key.is_none() {
        info!("No JWT signing key configured; requests with bearer tokens will be rejected");
    }

    let app = build_router(Arc::new(GatewayState {
        orchestrator,
        jwt_key,
    }));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

// --- Handlers ---

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
