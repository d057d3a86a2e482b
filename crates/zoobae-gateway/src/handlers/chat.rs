//! Chat routes: a turn with the companion, history, personality summary and the
//! unauthenticated preview turn.

use super::{authenticate, ApiError};
use crate::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use zoobae_core::{
    ChatTurn, ContextMeta, ContextOverrides, ConversationSummary, InsightSnapshot, TurnOptions,
    TurnOutcome,
};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub include_summary: bool,
}

#[derive(Deserialize)]
pub struct PreviewRequest {
    pub message: String,
    #[serde(default)]
    pub user_context: Option<ContextOverrides>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub personality_insights: InsightSnapshot,
    pub follow_up_questions: Vec<String>,
    pub conversation_context: ContextMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality_summary: Option<ConversationSummary>,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(out: TurnOutcome) -> Self {
        Self {
            message: out.reply,
            personality_insights: out.insights,
            follow_up_questions: out.follow_ups,
            conversation_context: out.context,
            personality_summary: out.summary,
        }
    }
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub personality_summary: ConversationSummary,
}

fn require_message(message: &str) -> Result<&str, ApiError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    Ok(trimmed)
}

/// POST /chat/ai
pub async fn chat_ai(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let message = require_message(&req.message)?;
    let outcome = state
        .orchestrator
        .handle_turn_with(
            &user.id,
            message,
            TurnOptions {
                summary_requested: req.include_summary,
            },
        )
        .await?;
    Ok(Json(outcome.into()))
}

/// GET /chat/history
pub async fn chat_history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let chat_history = state.orchestrator.history(&user.id)?;
    Ok(Json(HistoryResponse { chat_history }))
}

/// GET /chat/personality-summary
pub async fn personality_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SummaryResponse>, ApiError> {
    let user = authenticate(&state, &headers)?;
    let personality_summary = state.orchestrator.summarize(&user.id).await?;
    Ok(Json(SummaryResponse {
        personality_summary,
    }))
}

/// POST /chat/ai/test: no auth, nothing persisted.
pub async fn chat_ai_test(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = require_message(&req.message)?;
    let outcome = state
        .orchestrator
        .preview_turn(message, req.user_context.unwrap_or_default())
        .await;
    Ok(Json(outcome.into()))
}
