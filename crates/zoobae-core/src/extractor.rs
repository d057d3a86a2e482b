//! Insight Extractor: deterministic keyword classification of one utterance.
//!
//! Matching is case-insensitive substring search, no tokenization or stemming. Table order is
//! the classification boundary: scalar fields are first-match-wins, tag fields collect every hit.

use crate::insight::{AttachmentStyle, InsightDelta, MbtiAxis};
use std::collections::BTreeSet;

/// One keyword set and the value it assigns.
pub struct KeywordRule<T: 'static> {
    pub keywords: &'static [&'static str],
    pub value: T,
}

/// Checked in order; introvert cues win over extrovert cues.
pub const MBTI_RULES: &[KeywordRule<MbtiAxis>] = &[
    KeywordRule {
        keywords: &["introvert", "quiet", "alone", "solitude", "recharge"],
        value: MbtiAxis::Introvert,
    },
    KeywordRule {
        keywords: &["extrovert", "social", "people", "party", "energized"],
        value: MbtiAxis::Extrovert,
    },
];

/// Checked anxious, avoidant, secure. "insecurity" contains "secure", so order matters.
pub const ATTACHMENT_RULES: &[KeywordRule<AttachmentStyle>] = &[
    KeywordRule {
        keywords: &["anxious", "worry", "clingy", "insecurity", "fear"],
        value: AttachmentStyle::Anxious,
    },
    KeywordRule {
        keywords: &["avoidant", "distant", "independent", "space", "freedom"],
        value: AttachmentStyle::Avoidant,
    },
    KeywordRule {
        keywords: &["secure", "trust", "comfortable", "balance", "confident"],
        value: AttachmentStyle::Secure,
    },
];

pub const TRAIT_RULES: &[KeywordRule<&str>] = &[
    KeywordRule {
        keywords: &["creative", "artistic", "imaginative"],
        value: "creative",
    },
    KeywordRule {
        keywords: &["analytical", "logical", "rational", "thinker"],
        value: "analytical",
    },
    KeywordRule {
        keywords: &["empathetic", "caring", "compassionate", "understanding"],
        value: "empathetic",
    },
    KeywordRule {
        keywords: &["adventurous", "spontaneous", "risk-taker", "explorer"],
        value: "adventurous",
    },
];

pub const VALUE_RULES: &[KeywordRule<&str>] = &[
    KeywordRule {
        keywords: &["family", "relationships", "connection", "love"],
        value: "family",
    },
    KeywordRule {
        keywords: &["career", "success", "achievement", "work"],
        value: "career",
    },
    KeywordRule {
        keywords: &["travel", "exploration", "experiences", "adventure"],
        value: "experiences",
    },
    KeywordRule {
        keywords: &["learning", "growth", "development", "improvement"],
        value: "personal growth",
    },
];

pub const INTEREST_RULES: &[KeywordRule<&str>] = &[
    KeywordRule {
        keywords: &["music", "concert", "playlist", "songs"],
        value: "music",
    },
    KeywordRule {
        keywords: &["sports", "fitness", "exercise", "workout"],
        value: "fitness",
    },
    KeywordRule {
        keywords: &["cooking", "food", "restaurant", "cuisine"],
        value: "food",
    },
    KeywordRule {
        keywords: &["reading", "books", "literature", "novels"],
        value: "reading",
    },
];

/// True when any keyword occurs in the (already lowercased) text.
pub fn mentions_any(text_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text_lower.contains(k))
}

/// First rule whose keywords hit.
pub fn first_match<T: Copy>(text_lower: &str, rules: &[KeywordRule<T>]) -> Option<T> {
    rules
        .iter()
        .find(|r| mentions_any(text_lower, r.keywords))
        .map(|r| r.value)
}

/// Every tag whose keywords hit.
pub fn all_matches(text_lower: &str, rules: &[KeywordRule<&str>]) -> BTreeSet<String> {
    rules
        .iter()
        .filter(|r| mentions_any(text_lower, r.keywords))
        .map(|r| r.value.to_string())
        .collect()
}

/// Extract a partial insight from one utterance. Pure and total: no signal means no field.
pub fn extract(utterance: &str) -> InsightDelta {
    let lower = utterance.to_lowercase();
    InsightDelta {
        mbti_axis: first_match(&lower, MBTI_RULES),
        attachment_style: first_match(&lower, ATTACHMENT_RULES),
        traits: all_matches(&lower, TRAIT_RULES),
        values: all_matches(&lower, VALUE_RULES),
        interests: all_matches(&lower, INTEREST_RULES),
        ..Default::default()
    }
}
