//! Keyword-rule responder. No external calls; the reply comes from an ordered cue table or,
//! when nothing matches, a random open-ended prompt.

use super::{Responder, ResponderContext, ResponderMethod, ResponderOutput};
use crate::chat::ChatTurn;
use crate::extractor::{self, KeywordRule};
use crate::summary::{self, ConversationSummary};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;

/// First matching cue wins.
pub const REPLY_RULES: &[KeywordRule<&str>] = &[
    KeywordRule {
        keywords: &["relationship", "dating", "partner"],
        value: "I'd love to hear more about your thoughts on relationships. What do you think makes a connection meaningful?",
    },
    KeywordRule {
        keywords: &["work", "career", "job"],
        value: "That's really interesting! How do you balance your work life with your personal relationships?",
    },
    KeywordRule {
        keywords: &["family", "parents", "siblings"],
        value: "Family can have such a big impact on how we approach relationships. How has your family influenced you?",
    },
    KeywordRule {
        keywords: &["hobby", "interest", "passion", "music", "sports"],
        value: "That's such a great passion! How do your interests shape the kind of person you're looking for?",
    },
    KeywordRule {
        keywords: &["travel", "adventure", "explore"],
        value: "I love that adventurous spirit! How do you think that affects what you want in a relationship?",
    },
    KeywordRule {
        keywords: &["introvert", "quiet", "alone"],
        value: "I can understand that need for space and quiet. How do you balance that with the desire for connection?",
    },
    KeywordRule {
        keywords: &["extrovert", "social", "people"],
        value: "Your social energy is amazing! How do you think that affects your relationships?",
    },
    KeywordRule {
        keywords: &["anxious", "worry", "insecurity"],
        value: "I can sense you're someone who really cares about connections. What helps you feel more secure in relationships?",
    },
    KeywordRule {
        keywords: &["independent", "space", "freedom"],
        value: "I notice you value your independence, which is totally healthy! How do you balance that with the desire for connection?",
    },
];

pub const GENERIC_REPLIES: &[&str] = &[
    "That's really interesting! I'd love to hear more about that. What made you feel that way?",
    "I can sense there's a lot of depth to what you're sharing. How has that experience shaped who you are today?",
    "That's such a unique perspective! What are some of your biggest values in life?",
    "I'm curious to know more about your thoughts on relationships. What do you think makes a connection meaningful?",
    "That sounds like it was quite an experience. How did that influence your approach to relationships?",
    "I love how you think about things! Have you always felt this way, or has your perspective changed over time?",
    "That's really insightful! How do you usually handle challenges or difficult situations?",
    "I'm getting to know you better! What are some things you're looking for in a potential partner?",
    "That's fascinating! What are some of your dreams or goals for the future?",
    "I appreciate you sharing that with me. What are some of your favorite ways to spend your time?",
    "That's such a thoughtful response! What are some of your interests or passions?",
    "I can tell you've put a lot of thought into this. How do you usually communicate in relationships?",
    "That's really meaningful! What are some of your core values when it comes to relationships?",
    "I'd love to hear more about your experiences. What have you learned about yourself through relationships?",
    "That's such an honest answer! What are some of your boundaries or deal-breakers?",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicResponder;

impl DeterministicResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn reply_with_rng<R: Rng + ?Sized>(&self, utterance: &str, rng: &mut R) -> String {
        let lower = utterance.to_lowercase();
        extractor::first_match(&lower, REPLY_RULES)
            .or_else(|| GENERIC_REPLIES.choose(rng).copied())
            .unwrap_or(GENERIC_REPLIES[0])
            .to_string()
    }
}

#[async_trait]
impl Responder for DeterministicResponder {
    fn method(&self) -> ResponderMethod {
        ResponderMethod::Deterministic
    }

    async fn respond(
        &self,
        utterance: &str,
        _history: &[ChatTurn],
        _ctx: &ResponderContext,
    ) -> ResponderOutput {
        let reply = self.reply_with_rng(utterance, &mut rand::thread_rng());
        ResponderOutput {
            reply,
            raw_insights: extractor::extract(utterance),
            follow_ups: None,
            method: ResponderMethod::Deterministic,
        }
    }

    async fn summarize(&self, history: &[ChatTurn]) -> ConversationSummary {
        summary::aggregate(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::{AttachmentStyle, InsightSnapshot, MbtiAxis};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ctx() -> ResponderContext {
        ResponderContext {
            user_id: "u1".to_string(),
            has_profile: false,
            profile_name: None,
            conversation_count: 0,
            known_insights: InsightSnapshot::empty("u1"),
        }
    }

    #[tokio::test]
    async fn alone_time_gets_introvert_reply_and_insights() {
        let out = DeterministicResponder::new()
            .respond("I love my alone time and need space to recharge", &[], &ctx())
            .await;
        assert_eq!(out.reply, REPLY_RULES[5].value);
        assert_eq!(out.raw_insights.mbti_axis, Some(MbtiAxis::Introvert));
        assert_eq!(out.raw_insights.attachment_style, Some(AttachmentStyle::Avoidant));
        assert!(out.follow_ups.is_none());
        assert_eq!(out.method, ResponderMethod::Deterministic);
    }

    #[test]
    fn reply_table_is_ordered() {
        let r = DeterministicResponder::new();
        let mut rng = StdRng::seed_from_u64(1);
        // "partner" (relationship) outranks "work".
        assert_eq!(
            r.reply_with_rng("My partner and I work together", &mut rng),
            REPLY_RULES[0].value
        );
        assert_eq!(r.reply_with_rng("I need FREEDOM", &mut rng), REPLY_RULES[8].value);
    }

    #[test]
    fn unmatched_utterance_draws_from_generic_pool() {
        let r = DeterministicResponder::new();
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let reply = r.reply_with_rng("hmm", &mut rng);
            assert!(GENERIC_REPLIES.contains(&reply.as_str()));
        }
    }
}
