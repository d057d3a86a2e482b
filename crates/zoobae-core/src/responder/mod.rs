//! Responder capability: produces the reply and the raw per-turn insight extraction.
//!
//! Two variants, chosen once at startup by [`select_responder`]:
//! - [`GenerativeResponder`]: hosted model for the reply, extraction and follow-ups.
//! - [`DeterministicResponder`]: keyword tables, no external calls.
//!
//! `respond` is infallible. Every generation failure is recovered inside the variant.

pub mod deterministic;
pub mod generative;

pub use deterministic::DeterministicResponder;
pub use generative::GenerativeResponder;

use crate::chat::ChatTurn;
use crate::config::{CoreConfig, ResponderMode};
use crate::error::{CoreError, CoreResult};
use crate::generation::OpenRouterGenerator;
use crate::insight::{InsightDelta, InsightSnapshot};
use crate::summary::ConversationSummary;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderMethod {
    Generative,
    Deterministic,
}

impl ResponderMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generative => "generative",
            Self::Deterministic => "deterministic",
        }
    }
}

/// What the responder knows about the user for this turn. Serialized into the persona prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ResponderContext {
    pub user_id: String,
    pub has_profile: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_name: Option<String>,
    pub conversation_count: usize,
    /// Snapshot as loaded before this turn.
    #[serde(skip)]
    pub known_insights: InsightSnapshot,
}

#[derive(Debug, Clone)]
pub struct ResponderOutput {
    pub reply: String,
    /// Per-turn extraction; empty when nothing was found.
    pub raw_insights: InsightDelta,
    /// `None` lets the orchestrator run the follow-up planner.
    pub follow_ups: Option<Vec<String>>,
    pub method: ResponderMethod,
}

#[async_trait]
pub trait Responder: Send + Sync {
    fn method(&self) -> ResponderMethod;

    /// `history` is most-recent-last and already truncated to the responder window.
    async fn respond(
        &self,
        utterance: &str,
        history: &[ChatTurn],
        ctx: &ResponderContext,
    ) -> ResponderOutput;

    /// Summarize a non-empty window of turns.
    async fn summarize(&self, history: &[ChatTurn]) -> ConversationSummary;
}

/// Build the responder for this process. `generative` without an API key is a startup error.
pub fn select_responder(config: &CoreConfig) -> CoreResult<Arc<dyn Responder>> {
    let key = config.api_key();
    let responder: Arc<dyn Responder> = match (config.responder, key) {
        (ResponderMode::Deterministic, _) => Arc::new(DeterministicResponder::new()),
        (ResponderMode::Generative, None) => {
            return Err(CoreError::Config(
                "responder = generative requires llm_api_key or OPENROUTER_API_KEY".to_string(),
            ));
        }
        (ResponderMode::Auto, None) => {
            tracing::warn!(
                target: "zoobae::responder",
                "no generation API key configured, using deterministic responder"
            );
            Arc::new(DeterministicResponder::new())
        }
        (ResponderMode::Generative | ResponderMode::Auto, Some(key)) => {
            let generator = OpenRouterGenerator::from_config(config, key);
            Arc::new(GenerativeResponder::new(
                Arc::new(generator),
                config.generation_timeout(),
            ))
        }
    };
    tracing::info!(
        target: "zoobae::responder",
        method = responder.method().as_str(),
        model = %config.llm_model,
        "responder selected"
    );
    Ok(responder)
}
