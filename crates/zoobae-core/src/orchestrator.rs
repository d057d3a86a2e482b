//! Conversation Orchestrator: one chat turn end to end.
//!
//! Load history and snapshot, ask the responder, merge the per-turn delta, persist both sides
//! of the exchange, then pick follow-ups. Only persistence failures fail a turn.

use crate::chat::{self, ChatTurn, Sender};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::insight::{InsightDelta, InsightSnapshot};
use crate::planner::FollowUpPlanner;
use crate::responder::{Responder, ResponderContext, ResponderMethod};
use crate::store::ConversationStore;
use crate::summary::ConversationSummary;
use crate::users::ProfileLookup;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// User id used by the unauthenticated preview endpoint.
pub const PREVIEW_USER_ID: &str = "test_user";

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorLimits {
    /// Turns returned by history retrieval.
    pub history_limit: usize,
    /// Turns handed to the responder.
    pub responder_window: usize,
    /// Turns fed to the summary.
    pub summary_window: usize,
}

impl Default for OrchestratorLimits {
    fn default() -> Self {
        Self {
            history_limit: 50,
            responder_window: 10,
            summary_window: 20,
        }
    }
}

impl OrchestratorLimits {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            history_limit: config.history_limit,
            responder_window: config.responder_history_window,
            summary_window: config.summary_window,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TurnOptions {
    /// Attach a personality summary to the outcome.
    pub summary_requested: bool,
}

/// Synthetic context fields accepted by [`ConversationOrchestrator::preview_turn`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextOverrides {
    #[serde(default)]
    pub has_profile: Option<bool>,
    #[serde(default)]
    pub profile_name: Option<String>,
    #[serde(default)]
    pub conversation_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextMeta {
    pub last_message: String,
    /// Reply length in characters.
    pub response_length: usize,
    pub timestamp: String,
    pub method: ResponderMethod,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    /// Snapshot after merging this turn.
    pub insights: InsightSnapshot,
    /// This turn's extraction only.
    pub delta: InsightDelta,
    pub follow_ups: Vec<String>,
    pub context: ContextMeta,
    pub summary: Option<ConversationSummary>,
}

pub struct ConversationOrchestrator {
    store: Arc<dyn ConversationStore>,
    profiles: Arc<dyn ProfileLookup>,
    responder: Arc<dyn Responder>,
    planner: FollowUpPlanner,
    limits: OrchestratorLimits,
    serialize_user_turns: bool,
    turn_locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl ConversationOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        profiles: Arc<dyn ProfileLookup>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            store,
            profiles,
            responder,
            planner: FollowUpPlanner::new(),
            limits: OrchestratorLimits::default(),
            serialize_user_turns: true,
            turn_locks: DashMap::new(),
        }
    }

    pub fn from_config(
        config: &CoreConfig,
        store: Arc<dyn ConversationStore>,
        profiles: Arc<dyn ProfileLookup>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self::new(store, profiles, responder)
            .with_limits(OrchestratorLimits::from_config(config))
            .with_user_serialization(config.serialize_user_turns)
    }

    pub fn with_limits(mut self, limits: OrchestratorLimits) -> Self {
        self.limits = limits;
        self
    }

    /// When off, concurrent turns of one user race on the snapshot and the last writer wins.
    pub fn with_user_serialization(mut self, enabled: bool) -> Self {
        self.serialize_user_turns = enabled;
        self
    }

    pub fn responder_method(&self) -> ResponderMethod {
        self.responder.method()
    }

    pub async fn handle_turn(&self, user_id: &str, utterance: &str) -> CoreResult<TurnOutcome> {
        self.handle_turn_with(user_id, utterance, TurnOptions::default())
            .await
    }

    pub async fn handle_turn_with(
        &self,
        user_id: &str,
        utterance: &str,
        options: TurnOptions,
    ) -> CoreResult<TurnOutcome> {
        let _turn = if self.serialize_user_turns {
            Some(UserTurnGuard::acquire(&self.turn_locks, user_id).await)
        } else {
            None
        };
        self.run_turn(user_id, utterance, options).await
    }

    async fn run_turn(
        &self,
        user_id: &str,
        utterance: &str,
        options: TurnOptions,
    ) -> CoreResult<TurnOutcome> {
        let history = self
            .store
            .get_chat_history(user_id, self.limits.history_limit)?;
        let prior = self
            .store
            .get_insight_snapshot(user_id)?
            .unwrap_or_else(|| InsightSnapshot::empty(user_id));
        let profile_name = self.profiles.profile_name(user_id)?;

        let ctx = ResponderContext {
            user_id: user_id.to_string(),
            has_profile: profile_name.is_some(),
            profile_name,
            conversation_count: history.len(),
            known_insights: prior,
        };
        let window = chat::tail(&history, self.limits.responder_window);
        let output = self.responder.respond(utterance, window, &ctx).await;

        let mut merged = ctx.known_insights;
        merged.merge(&output.raw_insights, Utc::now());

        self.store
            .append_chat_turn(user_id, Sender::User, utterance, &InsightDelta::default())?;
        self.store
            .append_chat_turn(user_id, Sender::Ai, &output.reply, &output.raw_insights)?;
        if !output.raw_insights.is_empty() {
            self.store.upsert_insight_snapshot(user_id, &merged)?;
        }

        let follow_ups = output
            .follow_ups
            .unwrap_or_else(|| self.planner.plan(&merged));

        tracing::info!(
            target: "zoobae::orchestrator",
            user_id,
            method = output.method.as_str(),
            signals = output.raw_insights.signal_count(),
            history = history.len(),
            "turn handled"
        );

        let summary = if options.summary_requested {
            let window = self
                .store
                .get_chat_history(user_id, self.limits.summary_window)?;
            Some(self.responder.summarize(&window).await)
        } else {
            None
        };

        Ok(TurnOutcome {
            context: context_meta(utterance, &output.reply, output.method),
            reply: output.reply,
            insights: merged,
            delta: output.raw_insights,
            follow_ups,
            summary,
        })
    }

    /// Run a turn against a synthetic context without reading or writing any store.
    pub async fn preview_turn(
        &self,
        utterance: &str,
        overrides: ContextOverrides,
    ) -> TurnOutcome {
        let ctx = ResponderContext {
            user_id: PREVIEW_USER_ID.to_string(),
            has_profile: overrides.has_profile.unwrap_or(false),
            profile_name: overrides.profile_name,
            conversation_count: overrides.conversation_count.unwrap_or(0),
            known_insights: InsightSnapshot::empty(PREVIEW_USER_ID),
        };
        let output = self.responder.respond(utterance, &[], &ctx).await;
        let merged = ctx.known_insights.merged(&output.raw_insights, Utc::now());
        let follow_ups = output
            .follow_ups
            .unwrap_or_else(|| self.planner.plan(&merged));

        TurnOutcome {
            context: context_meta(utterance, &output.reply, output.method),
            reply: output.reply,
            insights: merged,
            delta: output.raw_insights,
            follow_ups,
            summary: None,
        }
    }

    /// Personality summary over the most recent turns. No history is [`CoreError::HistoryEmpty`].
    pub async fn summarize(&self, user_id: &str) -> CoreResult<ConversationSummary> {
        let window = self
            .store
            .get_chat_history(user_id, self.limits.summary_window)?;
        if window.is_empty() {
            return Err(CoreError::HistoryEmpty);
        }
        Ok(self.responder.summarize(&window).await)
    }

    pub fn history(&self, user_id: &str) -> CoreResult<Vec<ChatTurn>> {
        self.store.get_chat_history(user_id, self.limits.history_limit)
    }

    pub fn snapshot(&self, user_id: &str) -> CoreResult<Option<InsightSnapshot>> {
        self.store.get_insight_snapshot(user_id)
    }
}

type TurnLocks = DashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Holds one user's turn lock. Dropping it, including when the turn future is cancelled,
/// releases the lock and removes the map entry once no other turn references it.
struct UserTurnGuard<'a> {
    locks: &'a TurnLocks,
    user_id: String,
    lock: Option<Arc<tokio::sync::Mutex<()>>>,
    held: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl<'a> UserTurnGuard<'a> {
    async fn acquire(locks: &'a TurnLocks, user_id: &str) -> UserTurnGuard<'a> {
        let mut guard = UserTurnGuard {
            locks,
            user_id: user_id.to_string(),
            lock: Some(locks.entry(user_id.to_string()).or_default().clone()),
            held: None,
        };
        if let Some(lock) = guard.lock.clone() {
            guard.held = Some(lock.lock_owned().await);
        }
        guard
    }
}

impl Drop for UserTurnGuard<'_> {
    fn drop(&mut self) {
        self.held.take();
        self.lock.take();
        self.locks
            .remove_if(&self.user_id, |_, l| Arc::strong_count(l) == 1);
    }
}

fn context_meta(utterance: &str, reply: &str, method: ResponderMethod) -> ContextMeta {
    ContextMeta {
        last_message: utterance.to_string(),
        response_length: reply.chars().count(),
        timestamp: Utc::now().to_rfc3339(),
        method,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::{AttachmentStyle, MbtiAxis};
    use crate::planner::MBTI_GAP_QUESTION;
    use crate::responder::DeterministicResponder;
    use crate::store::SledConversationStore;

    struct NoProfiles;

    impl ProfileLookup for NoProfiles {
        fn profile_name(&self, _user_id: &str) -> CoreResult<Option<String>> {
            Ok(None)
        }
    }

    fn orchestrator() -> (tempfile::TempDir, ConversationOrchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let store = SledConversationStore::open_path(dir.path()).unwrap();
        let orch = ConversationOrchestrator::new(
            Arc::new(store),
            Arc::new(NoProfiles),
            Arc::new(DeterministicResponder::new()),
        );
        (dir, orch)
    }

    #[tokio::test]
    async fn turn_persists_both_sides_and_merges() {
        let (_dir, orch) = orchestrator();
        let out = orch
            .handle_turn("u1", "I love my alone time and need space to recharge")
            .await
            .unwrap();
        assert_eq!(out.insights.mbti_axis, Some(MbtiAxis::Introvert));
        assert_eq!(out.insights.attachment_style, Some(AttachmentStyle::Avoidant));
        assert_eq!(out.follow_ups.len(), 3);
        assert_eq!(out.context.response_length, out.reply.chars().count());

        let history = orch.history("u1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sender, Sender::User);
        assert!(history[0].insights.is_empty());
        assert_eq!(history[1].sender, Sender::Ai);
        assert_eq!(history[1].insights, out.delta);
        assert_eq!(orch.snapshot("u1").unwrap(), Some(out.insights));
    }

    #[tokio::test]
    async fn empty_delta_does_not_create_snapshot() {
        let (_dir, orch) = orchestrator();
        let out = orch.handle_turn("u1", "ok").await.unwrap();
        assert!(out.delta.is_empty());
        assert!(orch.snapshot("u1").unwrap().is_none());
        assert_eq!(out.follow_ups[0], MBTI_GAP_QUESTION);
    }

    #[tokio::test]
    async fn snapshot_accumulates_across_turns() {
        let (_dir, orch) = orchestrator();
        orch.handle_turn("u1", "I'm a creative person").await.unwrap();
        let out = orch.handle_turn("u1", "Friends call me caring").await.unwrap();
        let traits: Vec<&str> = out.insights.traits.iter().map(String::as_str).collect();
        assert_eq!(traits, ["creative", "empathetic"]);
    }

    #[tokio::test]
    async fn summary_requires_history() {
        let (_dir, orch) = orchestrator();
        assert!(matches!(orch.summarize("u1").await, Err(CoreError::HistoryEmpty)));

        let out = orch
            .handle_turn_with(
                "u1",
                "I'm an analytical thinker",
                TurnOptions {
                    summary_requested: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(out.summary.unwrap().key_traits, ["analytical"]);
    }

    /// Replies only after a long pause.
    struct StalledResponder;

    #[async_trait::async_trait]
    impl Responder for StalledResponder {
        fn method(&self) -> ResponderMethod {
            ResponderMethod::Deterministic
        }

        async fn respond(
            &self,
            utterance: &str,
            history: &[ChatTurn],
            ctx: &ResponderContext,
        ) -> crate::responder::ResponderOutput {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            DeterministicResponder::new()
                .respond(utterance, history, ctx)
                .await
        }

        async fn summarize(&self, history: &[ChatTurn]) -> ConversationSummary {
            DeterministicResponder::new().summarize(history).await
        }
    }

    #[tokio::test]
    async fn cancelled_turns_release_their_lock_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledConversationStore::open_path(dir.path()).unwrap();
        let orch = Arc::new(ConversationOrchestrator::new(
            Arc::new(store),
            Arc::new(NoProfiles),
            Arc::new(StalledResponder),
        ));

        // First turn holds the lock; the second queues behind it. Both are abandoned.
        let running = tokio::spawn({
            let orch = orch.clone();
            async move { orch.handle_turn("u1", "first").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let waiting = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            orch.handle_turn("u1", "second"),
        )
        .await;
        assert!(waiting.is_err());
        assert_eq!(orch.turn_locks.len(), 1);

        running.abort();
        assert!(running.await.unwrap_err().is_cancelled());
        assert!(orch.turn_locks.is_empty());
        assert!(orch.history("u1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn unserialized_turns_take_no_lock() {
        let (_dir, orch) = orchestrator();
        let orch = Arc::new(orch.with_user_serialization(false));

        let a = tokio::spawn({
            let orch = orch.clone();
            async move { orch.handle_turn("u1", "I'm a creative person").await }
        });
        let b = tokio::spawn({
            let orch = orch.clone();
            async move { orch.handle_turn("u1", "Friends call me caring").await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert!(orch.turn_locks.is_empty());
        assert_eq!(orch.history("u1").unwrap().len(), 4);
        // Whichever turn wrote last, the snapshot holds at least its own trait.
        let snap = orch.snapshot("u1").unwrap().unwrap();
        assert!(!snap.traits.is_empty());
        assert!(snap
            .traits
            .iter()
            .all(|t| t == "creative" || t == "empathetic"));
    }

    #[tokio::test]
    async fn summary_window_bounds_the_summary() {
        let (_dir, orch) = orchestrator();
        let orch = orch.with_limits(OrchestratorLimits {
            summary_window: 2,
            ..Default::default()
        });
        orch.handle_turn("u1", "I'm an analytical thinker").await.unwrap();
        orch.handle_turn("u1", "I'm a creative person").await.unwrap();

        let summary = orch.summarize("u1").await.unwrap();
        assert_eq!(summary.key_traits, ["creative"]);
    }

    #[tokio::test]
    async fn preview_writes_nothing() {
        let (_dir, orch) = orchestrator();
        let out = orch
            .preview_turn(
                "I'm so social",
                ContextOverrides {
                    profile_name: Some("Ravi".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(out.insights.user_id, PREVIEW_USER_ID);
        assert_eq!(out.insights.mbti_axis, Some(MbtiAxis::Extrovert));
        assert!(orch.history(PREVIEW_USER_ID).unwrap().is_empty());
        assert!(orch.snapshot(PREVIEW_USER_ID).unwrap().is_none());
    }
}
