//! Persistence contract consumed by the orchestrator, and its Sled-backed adapter.
//!
//! Trees:
//! - `chat_turns`: key `{user_id}\0{sequence:020}`, value JSON [`ChatTurn`]. Key order is insertion order.
//! - `insight_snapshots`: key `{user_id}`, value JSON [`InsightSnapshot`].

use crate::chat::{ChatTurn, Sender};
use crate::error::CoreResult;
use crate::insight::{InsightDelta, InsightSnapshot};
use chrono::Utc;
use dashmap::DashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

const CHAT_TURNS_TREE: &str = "chat_turns";
const SNAPSHOTS_TREE: &str = "insight_snapshots";

/// The narrow persistence surface the orchestrator depends on.
pub trait ConversationStore: Send + Sync {
    /// Append one turn; returns its id.
    fn append_chat_turn(
        &self,
        user_id: &str,
        sender: Sender,
        text: &str,
        insights: &InsightDelta,
    ) -> CoreResult<String>;

    /// Last `limit` turns, ascending by timestamp.
    fn get_chat_history(&self, user_id: &str, limit: usize) -> CoreResult<Vec<ChatTurn>>;

    fn get_insight_snapshot(&self, user_id: &str) -> CoreResult<Option<InsightSnapshot>>;

    /// Create or replace the user's snapshot.
    fn upsert_insight_snapshot(&self, user_id: &str, snapshot: &InsightSnapshot) -> CoreResult<()>;
}

fn turn_prefix(user_id: &str) -> Vec<u8> {
    let mut p = user_id.as_bytes().to_vec();
    p.push(0);
    p
}

fn turn_key(user_id: &str, seq: u64) -> Vec<u8> {
    let mut k = turn_prefix(user_id);
    k.extend_from_slice(format!("{:020}", seq).as_bytes());
    k
}

pub struct SledConversationStore {
    db: sled::Db,
    turns: sled::Tree,
    snapshots: sled::Tree,
    /// Per-user append locks so key order and timestamps agree within one user.
    append_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SledConversationStore {
    pub fn open_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Share an already opened database (the user directory lives in the same file).
    pub fn from_db(db: sled::Db) -> CoreResult<Self> {
        let turns = db.open_tree(CHAT_TURNS_TREE)?;
        let snapshots = db.open_tree(SNAPSHOTS_TREE)?;
        Ok(Self {
            db,
            turns,
            snapshots,
            append_locks: DashMap::new(),
        })
    }

    fn latest_turn(&self, user_id: &str) -> CoreResult<Option<ChatTurn>> {
        match self.turns.scan_prefix(turn_prefix(user_id)).next_back() {
            Some(entry) => {
                let (_, v) = entry?;
                Ok(Some(serde_json::from_slice(&v)?))
            }
            None => Ok(None),
        }
    }

    fn append_locked(
        &self,
        user_id: &str,
        sender: Sender,
        text: &str,
        insights: &InsightDelta,
    ) -> CoreResult<String> {
        let now = Utc::now();
        let timestamp = match self.latest_turn(user_id)? {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        let seq = self.db.generate_id()?;
        let turn = ChatTurn {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            sender,
            text: text.to_string(),
            insights: insights.clone(),
            timestamp,
        };
        self.turns
            .insert(turn_key(user_id, seq), serde_json::to_vec(&turn)?)?;
        tracing::debug!(target: "zoobae::store", user_id, sender = ?sender, seq, "chat turn appended");
        Ok(turn.id)
    }
}

impl ConversationStore for SledConversationStore {
    fn append_chat_turn(
        &self,
        user_id: &str,
        sender: Sender,
        text: &str,
        insights: &InsightDelta,
    ) -> CoreResult<String> {
        let lock = self
            .append_locks
            .entry(user_id.to_string())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.append_locked(user_id, sender, text, insights)
        };
        drop(lock);
        self.append_locks
            .remove_if(user_id, |_, l| Arc::strong_count(l) == 1);
        result
    }

    fn get_chat_history(&self, user_id: &str, limit: usize) -> CoreResult<Vec<ChatTurn>> {
        let mut turns = Vec::with_capacity(limit.min(64));
        for entry in self.turns.scan_prefix(turn_prefix(user_id)).rev().take(limit) {
            let (_, v) = entry?;
            turns.push(serde_json::from_slice::<ChatTurn>(&v)?);
        }
        turns.reverse();
        Ok(turns)
    }

    fn get_insight_snapshot(&self, user_id: &str) -> CoreResult<Option<InsightSnapshot>> {
        match self.snapshots.get(user_id.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    fn upsert_insight_snapshot(&self, user_id: &str, snapshot: &InsightSnapshot) -> CoreResult<()> {
        self.snapshots
            .insert(user_id.as_bytes(), serde_json::to_vec(snapshot)?)?;
        Ok(())
    }
}
