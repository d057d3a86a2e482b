//! Conversation log entries.

use crate::insight::InsightDelta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// Transcript label ("User" / "AI").
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Ai => "AI",
        }
    }
}

/// One message of the append-only conversation log. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: String,
    pub user_id: String,
    pub sender: Sender,
    #[serde(rename = "message")]
    pub text: String,
    #[serde(default)]
    pub insights: InsightDelta,
    pub timestamp: DateTime<Utc>,
}

/// Render turns as a plain `User: ...` / `AI: ...` transcript.
pub fn transcript(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.sender.label(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The trailing `window` turns (all of them when shorter).
pub fn tail(turns: &[ChatTurn], window: usize) -> &[ChatTurn] {
    &turns[turns.len().saturating_sub(window)..]
}
