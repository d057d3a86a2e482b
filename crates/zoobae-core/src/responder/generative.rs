//! Generative responder: three generation calls per turn, each with its own fallback.
//!
//! Reply and extraction run concurrently. The follow-up call runs once both are back, seeded
//! with the reply and the known insights merged with this turn's extraction.
//!
//! | Call | On failure |
//! |------|------------|
//! | reply | fixed apology reply, single fixed follow-up |
//! | extraction | keyword extractor on the utterance |
//! | follow-ups | `None` (orchestrator runs the planner) |

use super::{Responder, ResponderContext, ResponderMethod, ResponderOutput};
use crate::chat::{self, ChatTurn, Sender};
use crate::error::{ExtractionError, GenerationError};
use crate::extractor;
use crate::generation::{Generator, PromptMessage};
use crate::insight::{AttachmentStyle, InsightDelta, MbtiAxis};
use crate::planner::MAX_FOLLOW_UPS;
use crate::prompts;
use crate::summary::{self, ConversationSummary};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

pub const FALLBACK_REPLY: &str =
    "I'm having trouble processing that right now. Could you tell me more about what's on your mind?";
pub const FALLBACK_FOLLOW_UP: &str = "What's been on your mind lately?";

pub struct GenerativeResponder {
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl GenerativeResponder {
    pub fn new(generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// One generation call under the per-call deadline.
    async fn call(&self, messages: Vec<PromptMessage>) -> Result<String, GenerationError> {
        match tokio::time::timeout(self.timeout, self.generator.generate(&messages)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.timeout)),
        }
    }

    async fn generate_reply(
        &self,
        utterance: &str,
        history: &[ChatTurn],
        ctx: &ResponderContext,
    ) -> Result<String, GenerationError> {
        let ctx_json = serde_json::to_string_pretty(ctx).ok();
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(PromptMessage::system(prompts::persona_system_prompt(
            ctx_json.as_deref(),
        )));
        for turn in history {
            messages.push(match turn.sender {
                Sender::User => PromptMessage::user(turn.text.clone()),
                Sender::Ai => PromptMessage::assistant(turn.text.clone()),
            });
        }
        messages.push(PromptMessage::user(utterance));
        let reply = self.call(messages).await?;
        Ok(reply.trim().to_string())
    }

    async fn extract_insights(&self, utterance: &str) -> Result<InsightDelta, ExtractionError> {
        let raw = self
            .call(vec![
                PromptMessage::system(prompts::EXTRACTION_SYSTEM),
                PromptMessage::user(prompts::extraction_user_prompt(utterance)),
            ])
            .await?;
        parse_insights(&raw)
    }

    async fn generate_follow_ups(
        &self,
        reply: &str,
        known: &InsightDelta,
    ) -> Result<Vec<String>, GenerationError> {
        let insights_json =
            serde_json::to_string_pretty(known).unwrap_or_else(|_| "{}".to_string());
        let raw = self
            .call(vec![
                PromptMessage::system(prompts::FOLLOW_UP_SYSTEM),
                PromptMessage::user(prompts::follow_up_user_prompt(reply, &insights_json)),
            ])
            .await?;
        let lines = parse_follow_ups(&raw);
        if lines.is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(lines)
    }
}

#[async_trait]
impl Responder for GenerativeResponder {
    fn method(&self) -> ResponderMethod {
        ResponderMethod::Generative
    }

    async fn respond(
        &self,
        utterance: &str,
        history: &[ChatTurn],
        ctx: &ResponderContext,
    ) -> ResponderOutput {
        let (reply, extraction) = tokio::join!(
            self.generate_reply(utterance, history, ctx),
            self.extract_insights(utterance)
        );

        let raw_insights = match extraction {
            Ok(delta) => delta,
            Err(e) => {
                tracing::warn!(target: "zoobae::responder", user_id = %ctx.user_id, error = %e, "insight extraction failed, using keyword extractor");
                extractor::extract(utterance)
            }
        };

        let reply = match reply {
            Ok(reply) if !reply.is_empty() => reply,
            Ok(_) => {
                tracing::warn!(target: "zoobae::responder", user_id = %ctx.user_id, "reply generation returned blank text");
                return fallback_output(raw_insights);
            }
            Err(e) => {
                tracing::warn!(target: "zoobae::responder", user_id = %ctx.user_id, error = %e, "reply generation failed");
                return fallback_output(raw_insights);
            }
        };

        let known = ctx
            .known_insights
            .merged(&raw_insights, Utc::now())
            .as_delta();
        let follow_ups = match self.generate_follow_ups(&reply, &known).await {
            Ok(lines) => Some(lines),
            Err(e) => {
                tracing::warn!(target: "zoobae::responder", user_id = %ctx.user_id, error = %e, "follow-up generation failed, deferring to planner");
                None
            }
        };

        ResponderOutput {
            reply,
            raw_insights,
            follow_ups,
            method: ResponderMethod::Generative,
        }
    }

    async fn summarize(&self, history: &[ChatTurn]) -> ConversationSummary {
        let messages = vec![
            PromptMessage::system(prompts::SUMMARY_SYSTEM),
            PromptMessage::user(prompts::summary_user_prompt(&chat::transcript(history))),
        ];
        let parsed = match self.call(messages).await {
            Ok(raw) => summary::parse_summary(&raw),
            Err(e) => Err(ExtractionError::from(e)),
        };
        match parsed {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target: "zoobae::responder", error = %e, "summary generation failed, using keyword aggregate");
                summary::aggregate(history)
            }
        }
    }
}

fn fallback_output(raw_insights: InsightDelta) -> ResponderOutput {
    ResponderOutput {
        reply: FALLBACK_REPLY.to_string(),
        raw_insights,
        follow_ups: Some(vec![FALLBACK_FOLLOW_UP.to_string()]),
        method: ResponderMethod::Generative,
    }
}

/// Drop a surrounding Markdown code fence (```json ... ```), if any.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match after_open.find('\n') {
        Some(i) => &after_open[i + 1..],
        None => after_open.trim_start_matches("json"),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn tag_set(value: Option<&Value>) -> BTreeSet<String> {
    let normalize = |s: &str| {
        let s = s.trim().to_lowercase();
        (!s.is_empty()).then_some(s)
    };
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(normalize)
            .collect(),
        Some(Value::String(s)) => normalize(s.as_str()).into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

fn short_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

/// Coerce model output into a delta. Unknown keys and non-string list items are dropped;
/// anything that is not a JSON object is malformed.
pub fn parse_insights(raw: &str) -> Result<InsightDelta, ExtractionError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(ExtractionError::Malformed(
            "extraction is not a JSON object".to_string(),
        ));
    };

    Ok(InsightDelta {
        mbti_axis: field(&obj, "mbti_type")
            .and_then(Value::as_str)
            .and_then(MbtiAxis::parse_loose),
        attachment_style: field(&obj, "attachment_style")
            .and_then(Value::as_str)
            .and_then(AttachmentStyle::parse_loose),
        traits: tag_set(field(&obj, "personality_traits")),
        values: tag_set(field(&obj, "values")),
        interests: tag_set(field(&obj, "interests")),
        relationship_goals: short_text(field(&obj, "relationship_goals")),
        communication_style: short_text(field(&obj, "communication_style")),
        boundaries: tag_set(field(&obj, "boundaries")),
        immediate_needs: tag_set(field(&obj, "immediate_needs")),
    })
}

/// One question per line; bullets and numbering stripped, blanks dropped, at most three.
pub fn parse_follow_ups(raw: &str) -> Vec<String> {
    raw.lines()
        .map(clean_question_line)
        .filter(|l| !l.is_empty())
        .take(MAX_FOLLOW_UPS)
        .map(str::to_string)
        .collect()
}

fn clean_question_line(line: &str) -> &str {
    let mut s = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '•'))
        .trim_start();
    let after_digits = s.trim_start_matches(|c: char| c.is_ascii_digit());
    if after_digits.len() < s.len() {
        if let Some(rest) = after_digits
            .strip_prefix('.')
            .or_else(|| after_digits.strip_prefix(')'))
        {
            s = rest.trim_start();
        }
    }
    s.trim()
}
