//! Zoobae Gateway: HTTP surface for the companion chat and personality insights.
//! Sled storage, responder chosen once at startup (generative with an API key, else keyword rules).

mod handlers;

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zoobae_core::{
    select_responder, ConversationOrchestrator, CoreConfig, CoreResult, SledConversationStore,
    UserDirectory,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub orchestrator: Arc<ConversationOrchestrator>,
    pub users: Arc<UserDirectory>,
}

/// Open storage and build the responder. Any failure here aborts startup.
fn build_state(config: CoreConfig) -> CoreResult<AppState> {
    config.validate()?;
    let db = sled::open(&config.storage_path)?;
    let users = Arc::new(UserDirectory::from_db(&db)?);
    let store = Arc::new(SledConversationStore::from_db(db)?);
    let responder = select_responder(&config)?;
    let orchestrator = Arc::new(ConversationOrchestrator::from_config(
        &config,
        store,
        users.clone(),
        responder,
    ));
    Ok(AppState {
        config: Arc::new(config),
        orchestrator,
        users,
    })
}

fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/register", post(handlers::users::register))
        .route(
            "/profile",
            get(handlers::users::get_profile).put(handlers::users::update_profile),
        )
        .route("/chat/ai", post(handlers::chat::chat_ai))
        .route("/chat/ai/test", post(handlers::chat::chat_ai_test))
        .route("/chat/history", get(handlers::chat::chat_history))
        .route(
            "/chat/personality-summary",
            get(handlers::chat::personality_summary),
        )
        .with_state(state)
        .layer(axum::middleware::from_fn(log_requests))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(target: "zoobae::gateway", error = %e, "gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = CoreConfig::load()?;
    let addr = config.bind_addr();
    let state = build_state(config)?;
    tracing::info!(
        target: "zoobae::gateway",
        app = %state.config.app_name,
        method = state.orchestrator.responder_method().as_str(),
        storage = %state.config.storage_path,
        "starting gateway on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, build_app(state)).await?;
    Ok(())
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        target: "zoobae::gateway",
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Zoobae backend is running!" }))
}

async fn health() -> &'static str {
    "OK"
}
