//! Prompt templates for the companion persona and the analysis calls (extraction, follow-ups, summary).

pub mod analysis;
pub mod persona;

pub use analysis::{
    extraction_user_prompt, follow_up_user_prompt, summary_user_prompt, EXTRACTION_SYSTEM,
    EXTRACTION_USER_TEMPLATE, FOLLOW_UP_SYSTEM, FOLLOW_UP_USER_TEMPLATE, SUMMARY_SYSTEM,
    SUMMARY_USER_TEMPLATE,
};
pub use persona::{persona_system_prompt, ZOOBOO_PERSONA};
