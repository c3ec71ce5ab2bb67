//! Local fallback replies for LLM failures.
//!
//! A provider failure is never surfaced to the user as a raw error. Each
//! failure class maps to its own canned reply.

use crate::error::LlmError;

/// Map a provider error to the user-facing fallback text.
pub fn fallback_reply(error: &LlmError) -> &'static str {
    match error {
        LlmError::RateLimited { .. } => {
            "I'm getting a lot of messages right now. Give me a minute and try again?"
        }
        LlmError::Timeout(_) => {
            "Sorry, I'm a little slow right now. I'm still here — tell me more?"
        }
        LlmError::Server(_) | LlmError::InvalidResponse(_) => {
            "Sorry, I'm having trouble putting my thoughts together right now. I'm still listening."
        }
    }
}
