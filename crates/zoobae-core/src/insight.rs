//! Insight Model: the per-user personality snapshot and its merge semantics.
//!
//! Scalars (MBTI axis, attachment style, goals, communication style) are last-write-wins and are
//! never cleared by a merge. Tag sets only grow (set union).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The only MBTI dichotomy the system resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MbtiAxis {
    #[serde(rename = "I")]
    Introvert,
    #[serde(rename = "E")]
    Extrovert,
}

impl MbtiAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Introvert => "I",
            Self::Extrovert => "E",
        }
    }

    /// Lenient parse for model output: "I"/"E", "introvert"/"extrovert"/"extravert",
    /// or a four-letter type such as "INFJ" (first letter decides).
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let s = raw.trim().to_lowercase();
        if s.is_empty() {
            return None;
        }
        if s.starts_with("intro") {
            return Some(Self::Introvert);
        }
        if s.starts_with("extro") || s.starts_with("extra") {
            return Some(Self::Extrovert);
        }
        let is_type_code = s.len() == 1
            || (s.len() == 4 && s.chars().all(|c| c.is_ascii_alphabetic()));
        match (is_type_code, s.chars().next()) {
            (true, Some('i')) => Some(Self::Introvert),
            (true, Some('e')) => Some(Self::Extrovert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentStyle {
    Anxious,
    Avoidant,
    Secure,
}

impl AttachmentStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anxious => "anxious",
            Self::Avoidant => "avoidant",
            Self::Secure => "secure",
        }
    }

    /// Lenient parse for model output ("Anxious", "anxious-preoccupied", "secure attachment").
    /// Checked anxious, avoidant, secure: "insecure" never reads as secure.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let s = raw.trim().to_lowercase();
        if s.contains("anxious") {
            Some(Self::Anxious)
        } else if s.contains("avoidant") {
            Some(Self::Avoidant)
        } else if s.contains("secure") && !s.contains("insecure") {
            Some(Self::Secure)
        } else {
            None
        }
    }
}

/// Partial, per-turn extraction. Absent fields carry no signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightDelta {
    #[serde(rename = "mbti_type", default, skip_serializing_if = "Option::is_none")]
    pub mbti_axis: Option<MbtiAxis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_style: Option<AttachmentStyle>,
    #[serde(rename = "personality_traits", default)]
    pub traits: BTreeSet<String>,
    #[serde(default)]
    pub values: BTreeSet<String>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_style: Option<String>,
    #[serde(default)]
    pub boundaries: BTreeSet<String>,
    #[serde(default)]
    pub immediate_needs: BTreeSet<String>,
}

impl InsightDelta {
    /// True when the delta carries no signal at all.
    pub fn is_empty(&self) -> bool {
        self.mbti_axis.is_none()
            && self.attachment_style.is_none()
            && self.traits.is_empty()
            && self.values.is_empty()
            && self.interests.is_empty()
            && self.relationship_goals.is_none()
            && self.communication_style.is_none()
            && self.boundaries.is_empty()
            && self.immediate_needs.is_empty()
    }

    /// Number of individual signals (scalars set + tags).
    pub fn signal_count(&self) -> usize {
        [
            self.mbti_axis.is_some(),
            self.attachment_style.is_some(),
            self.relationship_goals.is_some(),
            self.communication_style.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
            + self.traits.len()
            + self.values.len()
            + self.interests.len()
            + self.boundaries.len()
            + self.immediate_needs.len()
    }
}

/// The durable personality profile of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightSnapshot {
    pub user_id: String,
    #[serde(rename = "mbti_type", default)]
    pub mbti_axis: Option<MbtiAxis>,
    #[serde(default)]
    pub attachment_style: Option<AttachmentStyle>,
    #[serde(rename = "personality_traits", default)]
    pub traits: BTreeSet<String>,
    #[serde(default)]
    pub values: BTreeSet<String>,
    #[serde(default)]
    pub interests: BTreeSet<String>,
    #[serde(default)]
    pub relationship_goals: Option<String>,
    #[serde(default)]
    pub communication_style: Option<String>,
    #[serde(default)]
    pub boundaries: BTreeSet<String>,
    #[serde(default)]
    pub immediate_needs: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl InsightSnapshot {
    /// Empty snapshot used when none is stored yet.
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            mbti_axis: None,
            attachment_style: None,
            traits: BTreeSet::new(),
            values: BTreeSet::new(),
            interests: BTreeSet::new(),
            relationship_goals: None,
            communication_style: None,
            boundaries: BTreeSet::new(),
            immediate_needs: BTreeSet::new(),
            updated_at: DateTime::<Utc>::default(),
        }
    }

    /// Merge a delta in place. Returns true when any field changed; `updated_at` is only
    /// bumped on change so that re-merging the same delta is a no-op.
    pub fn merge(&mut self, delta: &InsightDelta, at: DateTime<Utc>) -> bool {
        let mut changed = false;
        changed |= overwrite(&mut self.mbti_axis, delta.mbti_axis);
        changed |= overwrite(&mut self.attachment_style, delta.attachment_style);
        changed |= overwrite(&mut self.relationship_goals, delta.relationship_goals.clone());
        changed |= overwrite(&mut self.communication_style, delta.communication_style.clone());
        changed |= union(&mut self.traits, &delta.traits);
        changed |= union(&mut self.values, &delta.values);
        changed |= union(&mut self.interests, &delta.interests);
        changed |= union(&mut self.boundaries, &delta.boundaries);
        changed |= union(&mut self.immediate_needs, &delta.immediate_needs);
        if changed {
            self.updated_at = at;
        }
        changed
    }

    /// Non-consuming variant of [`merge`](Self::merge).
    pub fn merged(&self, delta: &InsightDelta, at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.merge(delta, at);
        next
    }

    /// The snapshot's content viewed as a delta (used to seed prompts).
    pub fn as_delta(&self) -> InsightDelta {
        InsightDelta {
            mbti_axis: self.mbti_axis,
            attachment_style: self.attachment_style,
            traits: self.traits.clone(),
            values: self.values.clone(),
            interests: self.interests.clone(),
            relationship_goals: self.relationship_goals.clone(),
            communication_style: self.communication_style.clone(),
            boundaries: self.boundaries.clone(),
            immediate_needs: self.immediate_needs.clone(),
        }
    }
}

fn overwrite<T: PartialEq>(slot: &mut Option<T>, incoming: Option<T>) -> bool {
    match incoming {
        Some(v) if slot.as_ref() != Some(&v) => {
            *slot = Some(v);
            true
        }
        _ => false,
    }
}

fn union(set: &mut BTreeSet<String>, incoming: &BTreeSet<String>) -> bool {
    let before = set.len();
    set.extend(incoming.iter().cloned());
    set.len() != before
}
