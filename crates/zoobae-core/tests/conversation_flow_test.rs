//! Integration test: full chat turns against a real Sled store.
//!
//! Verifies that:
//! 1. The deterministic deployment classifies, persists and plans follow-ups end to end.
//! 2. Generative sub-call failures and timeouts never fail the turn.
//! 3. A failing store fails the whole turn.
//! 4. Concurrent turns of one user do not lose snapshot updates.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zoobae_core::planner::{ATTACHMENT_GAP_QUESTION, MBTI_GAP_QUESTION};
use zoobae_core::prompts::{EXTRACTION_SYSTEM, FOLLOW_UP_SYSTEM, SUMMARY_SYSTEM};
use zoobae_core::responder::generative::{FALLBACK_FOLLOW_UP, FALLBACK_REPLY};
use zoobae_core::{
    AttachmentStyle, ChatTurn, ConversationOrchestrator, ConversationStore, CoreError, CoreResult,
    DeterministicResponder, GenerationError, Generator, GenerativeResponder, InsightDelta,
    InsightSnapshot, MbtiAxis, PromptMessage, ResponderMethod, Sender, SledConversationStore,
    UserDirectory,
};

/// Scripted generation double: one answer (or failure) per call kind, optional latency.
#[derive(Default)]
struct ScriptedGenerator {
    reply: Option<String>,
    extraction: Option<String>,
    follow_ups: Option<String>,
    summary: Option<String>,
    extraction_delay: Option<Duration>,
    calls: Mutex<Vec<Vec<PromptMessage>>>,
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, messages: &[PromptMessage]) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let system = messages[0].content.as_str();
        let answer = if system == EXTRACTION_SYSTEM {
            if let Some(delay) = self.extraction_delay {
                tokio::time::sleep(delay).await;
            }
            &self.extraction
        } else if system == FOLLOW_UP_SYSTEM {
            &self.follow_ups
        } else if system == SUMMARY_SYSTEM {
            &self.summary
        } else {
            &self.reply
        };
        answer
            .clone()
            .ok_or_else(|| GenerationError::Status {
                code: 429,
                body: "quota exhausted".to_string(),
            })
    }
}

fn open(dir: &tempfile::TempDir) -> (Arc<SledConversationStore>, Arc<UserDirectory>) {
    let db = sled::open(dir.path()).unwrap();
    let users = Arc::new(UserDirectory::from_db(&db).unwrap());
    let store = Arc::new(SledConversationStore::from_db(db).unwrap());
    (store, users)
}

fn generative(generator: Arc<ScriptedGenerator>, timeout: Duration) -> Arc<GenerativeResponder> {
    Arc::new(GenerativeResponder::new(generator, timeout))
}

#[tokio::test]
async fn deterministic_turn_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (store, users) = open(&dir);
    let user = users.register("asha@example.com", Some("Asha")).unwrap();
    let orch = ConversationOrchestrator::new(
        store.clone(),
        users,
        Arc::new(DeterministicResponder::new()),
    );

    let out = orch
        .handle_turn(&user.id, "I love my alone time and need space to recharge")
        .await
        .unwrap();
    assert_eq!(
        out.reply,
        "I can understand that need for space and quiet. How do you balance that with the desire for connection?"
    );
    assert_eq!(out.delta.mbti_axis, Some(MbtiAxis::Introvert));
    assert_eq!(out.delta.attachment_style, Some(AttachmentStyle::Avoidant));
    assert_eq!(out.context.method, ResponderMethod::Deterministic);
    // Both scalars known, interests and values short: two gap questions then one generic.
    assert_eq!(out.follow_ups.len(), 3);
    assert!(!out.follow_ups.iter().any(|q| q == MBTI_GAP_QUESTION));
    assert!(!out.follow_ups.iter().any(|q| q == ATTACHMENT_GAP_QUESTION));

    let history = store.get_chat_history(&user.id, 50).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].timestamp <= history[1].timestamp);
    let snap = store.get_insight_snapshot(&user.id).unwrap().unwrap();
    assert_eq!(snap.mbti_axis, Some(MbtiAxis::Introvert));
    assert!(snap.values.contains("family"));
}

#[tokio::test]
async fn summary_on_empty_history_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (store, users) = open(&dir);
    let orch = ConversationOrchestrator::new(store, users, Arc::new(DeterministicResponder::new()));
    assert!(matches!(
        orch.summarize("nobody").await,
        Err(CoreError::HistoryEmpty)
    ));
}

#[tokio::test]
async fn every_generation_call_failing_still_returns_a_reply() {
    let dir = tempfile::tempdir().unwrap();
    let (store, users) = open(&dir);
    let generator = Arc::new(ScriptedGenerator::default());
    let orch = ConversationOrchestrator::new(
        store.clone(),
        users,
        generative(generator.clone(), Duration::from_secs(5)),
    );

    let out = orch.handle_turn("u1", "hello there").await.unwrap();
    assert_eq!(out.reply, FALLBACK_REPLY);
    assert_eq!(out.follow_ups, vec![FALLBACK_FOLLOW_UP.to_string()]);
    assert!(out.delta.is_empty());
    assert!(store.get_insight_snapshot("u1").unwrap().is_none());
    assert_eq!(store.get_chat_history("u1", 50).unwrap().len(), 2);
    // Reply failed, so no follow-up call was made.
    assert_eq!(generator.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn slow_extraction_times_out_into_keyword_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let (store, users) = open(&dir);
    let generator = Arc::new(ScriptedGenerator {
        reply: Some("Omg same, parties are life!".to_string()),
        extraction: Some(r#"{"mbti_type":"I"}"#.to_string()),
        follow_ups: Some("Best party you've been to?\nDance floor or snack table?".to_string()),
        extraction_delay: Some(Duration::from_millis(500)),
        ..Default::default()
    });
    let orch = ConversationOrchestrator::new(
        store,
        users,
        generative(generator, Duration::from_millis(50)),
    );

    let out = orch.handle_turn("u1", "I love a good party").await.unwrap();
    assert_eq!(out.reply, "Omg same, parties are life!");
    // Keyword fallback, not the late model answer.
    assert_eq!(out.delta.mbti_axis, Some(MbtiAxis::Extrovert));
    assert_eq!(
        out.follow_ups,
        ["Best party you've been to?", "Dance floor or snack table?"]
    );
    assert_eq!(out.context.method, ResponderMethod::Generative);
}

#[tokio::test]
async fn follow_up_failure_defers_to_planner_with_profile_context() {
    let dir = tempfile::tempdir().unwrap();
    let (store, users) = open(&dir);
    let user = users.register("ravi@example.com", Some("Ravi")).unwrap();
    let generator = Arc::new(ScriptedGenerator {
        reply: Some("Tell me more about that!".to_string()),
        extraction: Some("```json\n{\"attachment_style\": \"Secure\", \"values\": [\"Honesty\"]}\n```".to_string()),
        ..Default::default()
    });
    let orch = ConversationOrchestrator::new(
        store,
        users,
        generative(generator.clone(), Duration::from_secs(5)),
    );

    let out = orch.handle_turn(&user.id, "Honesty matters").await.unwrap();
    assert_eq!(out.insights.attachment_style, Some(AttachmentStyle::Secure));
    assert!(out.insights.values.contains("honesty"));
    assert_eq!(out.follow_ups[0], MBTI_GAP_QUESTION);

    let calls = generator.calls.lock().unwrap();
    let persona = calls
        .iter()
        .find(|m| m[0].content.contains("User Context:"))
        .unwrap();
    assert!(persona[0].content.contains("\"has_profile\": true"));
    assert!(persona[0].content.contains("Ravi"));
}

#[tokio::test]
async fn generative_summary_parses_model_output() {
    let dir = tempfile::tempdir().unwrap();
    let (store, users) = open(&dir);
    let generator = Arc::new(ScriptedGenerator {
        reply: Some("Nice!".to_string()),
        summary: Some(
            r#"{"overall_personality":"Curious and warm","key_traits":["curious"],"values_and_priorities":"family, growth"}"#
                .to_string(),
        ),
        ..Default::default()
    });
    let orch = ConversationOrchestrator::new(
        store,
        users,
        generative(generator, Duration::from_secs(5)),
    );
    orch.handle_turn("u1", "I keep learning new things").await.unwrap();

    let summary = orch.summarize("u1").await.unwrap();
    assert_eq!(summary.overall_personality, "Curious and warm");
    assert_eq!(summary.values_and_priorities, ["family", "growth"]);
}

#[tokio::test]
async fn reply_call_sees_only_the_recent_window() {
    let dir = tempfile::tempdir().unwrap();
    let (store, users) = open(&dir);
    let generator = Arc::new(ScriptedGenerator {
        reply: Some("Love that!".to_string()),
        ..Default::default()
    });
    let orch = ConversationOrchestrator::new(
        store.clone(),
        users,
        generative(generator.clone(), Duration::from_secs(5)),
    );

    for i in 0..7 {
        orch.handle_turn("u1", &format!("message {}", i)).await.unwrap();
    }
    orch.handle_turn("u1", "latest").await.unwrap();
    assert_eq!(store.get_chat_history("u1", 50).unwrap().len(), 16);

    let calls = generator.calls.lock().unwrap();
    let reply_call = calls
        .iter()
        .rev()
        .find(|m| m[0].content.contains("User Context:"))
        .unwrap();
    // Persona, the last 10 stored turns, then the new utterance.
    assert_eq!(reply_call.len(), 12);
    assert_eq!(reply_call[1], PromptMessage::user("message 2"));
    assert_eq!(reply_call[2], PromptMessage::assistant("Love that!"));
    assert_eq!(reply_call[10], PromptMessage::assistant("Love that!"));
    assert_eq!(reply_call[11], PromptMessage::user("latest"));
}

/// Store whose writes always fail.
struct ReadOnlyStore;

impl ConversationStore for ReadOnlyStore {
    fn append_chat_turn(
        &self,
        _user_id: &str,
        _sender: Sender,
        _text: &str,
        _insights: &InsightDelta,
    ) -> CoreResult<String> {
        Err(CoreError::Persistence(sled::Error::Unsupported(
            "read-only".to_string(),
        )))
    }

    fn get_chat_history(&self, _user_id: &str, _limit: usize) -> CoreResult<Vec<ChatTurn>> {
        Ok(Vec::new())
    }

    fn get_insight_snapshot(&self, _user_id: &str) -> CoreResult<Option<InsightSnapshot>> {
        Ok(None)
    }

    fn upsert_insight_snapshot(&self, _user_id: &str, _snapshot: &InsightSnapshot) -> CoreResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn persistence_failure_fails_the_turn() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, users) = open(&dir);
    let orch = ConversationOrchestrator::new(
        Arc::new(ReadOnlyStore),
        users,
        Arc::new(DeterministicResponder::new()),
    );
    assert!(matches!(
        orch.handle_turn("u1", "hi").await,
        Err(CoreError::Persistence(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_turns_of_one_user_keep_every_trait() {
    let dir = tempfile::tempdir().unwrap();
    let (store, users) = open(&dir);
    let orch = Arc::new(ConversationOrchestrator::new(
        store.clone(),
        users,
        Arc::new(DeterministicResponder::new()),
    ));

    let utterances = [
        "I'm very creative",
        "I'm quite analytical",
        "I'm a caring soul",
        "I'm adventurous",
    ];
    let mut handles = Vec::new();
    for text in utterances {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            orch.handle_turn("u1", text).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let snap = store.get_insight_snapshot("u1").unwrap().unwrap();
    assert_eq!(snap.traits.len(), 4);
    let history = store.get_chat_history("u1", 50).unwrap();
    assert_eq!(history.len(), 8);
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    // User and AI turns of one exchange stay adjacent.
    assert!(history
        .chunks(2)
        .all(|pair| pair[0].sender == Sender::User && pair[1].sender == Sender::Ai));
}
