//! Follow-up Planner: steers the conversation toward dimensions the snapshot has not covered.

use crate::insight::InsightSnapshot;
use rand::seq::SliceRandom;
use rand::Rng;

pub const MAX_FOLLOW_UPS: usize = 3;

pub const MBTI_GAP_QUESTION: &str = "Are you more of an introvert or extrovert?";
pub const ATTACHMENT_GAP_QUESTION: &str = "How do you typically feel in relationships?";
pub const INTERESTS_GAP_QUESTION: &str = "What are some things you're passionate about?";
pub const VALUES_GAP_QUESTION: &str = "What are some of your core values in life?";

/// Generic relationship and communication questions used to fill remaining slots.
pub const GENERIC_FOLLOW_UPS: &[&str] = &[
    "What are some of your biggest values in life?",
    "How do you usually handle stress or difficult situations?",
    "What are you looking for in a relationship right now?",
    "What are some of your interests or hobbies?",
    "How do you prefer to communicate in relationships?",
    "What are some of your goals for the future?",
    "How do you usually spend your free time?",
    "What are some of your deal-breakers in relationships?",
    "How do you like to be supported by a partner?",
    "What are some of your favorite ways to connect with people?",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct FollowUpPlanner;

impl FollowUpPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Gap questions in fixed priority order (MBTI, attachment, interests, values).
    pub fn gap_questions(&self, snapshot: &InsightSnapshot) -> Vec<&'static str> {
        let mut questions = Vec::with_capacity(4);
        if snapshot.mbti_axis.is_none() {
            questions.push(MBTI_GAP_QUESTION);
        }
        if snapshot.attachment_style.is_none() {
            questions.push(ATTACHMENT_GAP_QUESTION);
        }
        if snapshot.interests.len() < 2 {
            questions.push(INTERESTS_GAP_QUESTION);
        }
        if snapshot.values.len() < 2 {
            questions.push(VALUES_GAP_QUESTION);
        }
        questions.truncate(MAX_FOLLOW_UPS);
        questions
    }

    pub fn plan(&self, snapshot: &InsightSnapshot) -> Vec<String> {
        self.plan_with_rng(snapshot, &mut rand::thread_rng())
    }

    /// Up to three questions: gap questions first, then distinct draws from the generic pool.
    pub fn plan_with_rng<R: Rng + ?Sized>(
        &self,
        snapshot: &InsightSnapshot,
        rng: &mut R,
    ) -> Vec<String> {
        let mut questions: Vec<String> = self
            .gap_questions(snapshot)
            .into_iter()
            .map(str::to_string)
            .collect();

        let missing = MAX_FOLLOW_UPS.saturating_sub(questions.len());
        if missing > 0 {
            let fill: Vec<&str> = GENERIC_FOLLOW_UPS
                .choose_multiple(rng, GENERIC_FOLLOW_UPS.len())
                .copied()
                .filter(|q| !questions.iter().any(|existing| existing == q))
                .take(missing)
                .collect();
            questions.extend(fill.into_iter().map(str::to_string));
        }
        questions
    }
}
