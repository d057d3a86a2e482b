//! Zoobae core: personality-insight extraction and conversation orchestration.
//!
//! A chat turn flows orchestrator -> responder -> extractor -> merge -> planner, with the
//! Sled-backed store underneath.

pub mod chat;
pub mod config;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod insight;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod responder;
pub mod store;
pub mod summary;
pub mod users;

pub use chat::{ChatTurn, Sender};
pub use config::{CoreConfig, ResponderMode};
pub use error::{CoreError, CoreResult, ExtractionError, GenerationError};
pub use generation::{Generator, OpenRouterGenerator, PromptMessage, Role};
pub use insight::{AttachmentStyle, InsightDelta, InsightSnapshot, MbtiAxis};
pub use orchestrator::{
    ContextMeta, ContextOverrides, ConversationOrchestrator, OrchestratorLimits, TurnOptions,
    TurnOutcome, PREVIEW_USER_ID,
};
pub use planner::FollowUpPlanner;
pub use responder::{
    select_responder, DeterministicResponder, GenerativeResponder, Responder, ResponderContext,
    ResponderMethod, ResponderOutput,
};
pub use store::{ConversationStore, SledConversationStore};
pub use summary::ConversationSummary;
pub use users::{ProfileLookup, UserDirectory, UserRecord};
