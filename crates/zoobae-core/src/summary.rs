//! Personality summary over a window of conversation.
//!
//! Model output is loosely typed: list fields may arrive as a single string and text fields as
//! lists, so both are normalized on the way in.

use crate::chat::{ChatTurn, Sender};
use crate::error::ExtractionError;
use crate::extractor::{self, KeywordRule, VALUE_RULES};
use crate::responder::generative::strip_code_fence;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    #[serde(default, deserialize_with = "text_or_list")]
    pub overall_personality: String,
    #[serde(default, deserialize_with = "list_or_text")]
    pub key_traits: Vec<String>,
    #[serde(default, deserialize_with = "text_or_list")]
    pub communication_style: String,
    #[serde(default, deserialize_with = "text_or_list")]
    pub relationship_patterns: String,
    #[serde(default, deserialize_with = "list_or_text")]
    pub values_and_priorities: Vec<String>,
    #[serde(default, deserialize_with = "text_or_list")]
    pub potential_challenges: String,
    #[serde(default, deserialize_with = "text_or_list")]
    pub growth_opportunities: String,
    #[serde(default, deserialize_with = "text_or_list")]
    pub compatibility_factors: String,
}

impl ConversationSummary {
    fn is_blank(&self) -> bool {
        self.overall_personality.is_empty()
            && self.key_traits.is_empty()
            && self.communication_style.is_empty()
            && self.relationship_patterns.is_empty()
            && self.values_and_priorities.is_empty()
            && self.potential_challenges.is_empty()
            && self.growth_opportunities.is_empty()
            && self.compatibility_factors.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    List(Vec<serde_json::Value>),
    Other(serde::de::IgnoredAny),
}

fn strings_of(items: Vec<serde_json::Value>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn list_or_text<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Text(s) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        Loose::List(items) => strings_of(items),
        Loose::Other(_) => Vec::new(),
    })
}

fn text_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Loose::deserialize(d)? {
        Loose::Text(s) => s.trim().to_string(),
        Loose::List(items) => strings_of(items).join(", "),
        Loose::Other(_) => String::new(),
    })
}

/// Summary keyword table; narrower than the extractor's trait table.
pub const SUMMARY_TRAIT_RULES: &[KeywordRule<&str>] = &[
    KeywordRule {
        keywords: &["creative", "artistic", "imaginative"],
        value: "creative",
    },
    KeywordRule {
        keywords: &["analytical", "logical", "thinker"],
        value: "analytical",
    },
    KeywordRule {
        keywords: &["empathetic", "caring", "understanding"],
        value: "empathetic",
    },
    KeywordRule {
        keywords: &["adventurous", "explorer", "spontaneous"],
        value: "adventurous",
    },
];

fn matching_tags(text_lower: &str, rules: &[KeywordRule<&str>]) -> Vec<String> {
    rules
        .iter()
        .filter(|r| extractor::mentions_any(text_lower, r.keywords))
        .map(|r| r.value.to_string())
        .collect()
}

/// Fixed-template summary with traits and values drawn from the user's own turns.
pub fn aggregate(turns: &[ChatTurn]) -> ConversationSummary {
    let user_text = turns
        .iter()
        .filter(|t| t.sender == Sender::User)
        .map(|t| t.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    ConversationSummary {
        overall_personality: "A thoughtful individual who values meaningful connections".to_string(),
        key_traits: matching_tags(&user_text, SUMMARY_TRAIT_RULES),
        communication_style: "reflective".to_string(),
        relationship_patterns: "seeks understanding and connection".to_string(),
        values_and_priorities: matching_tags(&user_text, VALUE_RULES),
        potential_challenges: "may overthink relationships".to_string(),
        growth_opportunities: "building confidence in connections".to_string(),
        compatibility_factors: "values communication and emotional intelligence".to_string(),
    }
}

/// Parse a model-produced summary. Non-objects and objects without any summary field are malformed.
pub fn parse_summary(raw: &str) -> Result<ConversationSummary, ExtractionError> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ExtractionError::Malformed("summary is not a JSON object".to_string()));
    }
    let summary: ConversationSummary =
        serde_json::from_value(value).map_err(|e| ExtractionError::Malformed(e.to_string()))?;
    if summary.is_blank() {
        return Err(ExtractionError::Malformed("summary has no known fields".to_string()));
    }
    Ok(summary)
}
