//! Analysis prompts: per-turn insight extraction, follow-up questions and the personality summary.

pub const EXTRACTION_SYSTEM: &str =
    "You are a personality analysis expert. Extract insights and return only valid JSON.";

pub const EXTRACTION_USER_TEMPLATE: &str = r#"Analyze the following user message and extract personality insights. Return a JSON object with these fields:
- mbti_type: "I" or "E" based on social preferences
- attachment_style: "anxious", "avoidant" or "secure" based on relationship language
- personality_traits: array of traits like creative, analytical, empathetic
- values: array of core values mentioned
- interests: array of hobbies or passions mentioned
- relationship_goals: long-term, casual or friendship based on language
- communication_style: direct or diplomatic based on expression
- boundaries: array of boundaries mentioned
- immediate_needs: array of current needs mentioned

Omit any field the message gives no evidence for.

User message: "{utterance}"

Return only valid JSON, no other text."#;

pub fn extraction_user_prompt(utterance: &str) -> String {
    EXTRACTION_USER_TEMPLATE.replace("{utterance}", utterance)
}

pub const FOLLOW_UP_SYSTEM: &str =
    "You are a conversation expert. Generate natural follow-up questions.";

pub const FOLLOW_UP_USER_TEMPLATE: &str = r#"Based on this AI response and what we know about the user, generate 2-3 natural follow-up questions that continue the conversation and help us learn more.

AI Response: "{reply}"
Current Insights: {insights}

Questions should:
1. Flow naturally from the conversation
2. Explore areas where we don't have much insight yet
3. Feel conversational, not interrogative
4. Encourage deeper sharing

Return only the questions, one per line, no numbering or formatting."#;

pub fn follow_up_user_prompt(reply: &str, insights_json: &str) -> String {
    FOLLOW_UP_USER_TEMPLATE
        .replace("{reply}", reply)
        .replace("{insights}", insights_json)
}

pub const SUMMARY_SYSTEM: &str =
    "You are a relationship psychologist. Analyze conversations and return insights as JSON.";

pub const SUMMARY_USER_TEMPLATE: &str = r#"Analyze this conversation and provide a comprehensive personality summary. Return JSON with:
- overall_personality: brief description
- key_traits: array of personality traits
- communication_style: how they express themselves
- relationship_patterns: insights about their approach to relationships
- values_and_priorities: array of what matters most to them
- potential_challenges: areas they might struggle with
- growth_opportunities: areas for personal development
- compatibility_factors: what kind of partner might work well

Conversation:
{transcript}

Return only valid JSON."#;

pub fn summary_user_prompt(transcript: &str) -> String {
    SUMMARY_USER_TEMPLATE.replace("{transcript}", transcript)
}
