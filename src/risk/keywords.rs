//! Deterministic crisis-phrase layer.
//!
//! Phrases are multi-word on purpose: "kill myself" matches, "killed it
//! at work" must not. Matching is case-insensitive substring membership.

use crate::risk::RiskLevel;

/// Fixed phrase list. A hit sets a floor risk of High.
pub const CRISIS_PHRASES: &[&str] = &[
    "kill myself",
    "killing myself",
    "end my life",
    "ending my life",
    "end it all",
    "want to die",
    "wanna die",
    "wish i was dead",
    "wish i were dead",
    "better off dead",
    "no reason to live",
    "not worth living",
    "hurt myself",
    "harm myself",
    "suicidal",
    "suicide",
];

/// Whether the message contains any crisis phrase.
pub fn matches_crisis_phrase(message: &str) -> bool {
    let lowered = message.to_lowercase();
    CRISIS_PHRASES.iter().any(|p| lowered.contains(p))
}

/// Canned, level-appropriate resource text. `None` for Low.
pub fn resource_text(level: RiskLevel) -> Option<&'static str> {
    match level {
        RiskLevel::Low => None,
        RiskLevel::Medium => Some(
            "It sounds like things are weighing on you. I'm here to listen, \
             and if it ever feels like too much, the 988 Suicide & Crisis \
             Lifeline (call or text 988) is there around the clock.",
        ),
        RiskLevel::High => Some(
            "I'm really glad you told me. You don't have to carry this alone \
             — please consider calling or texting 988 (Suicide & Crisis \
             Lifeline) to talk with someone right now. If you're outside the \
             US, the International Association for Suicide Prevention lists \
             local lines at https://www.iasp.info/resources/Crisis_Centres/.",
        ),
        RiskLevel::Critical => Some(
            "I'm worried about your safety right now. If you are in immediate \
             danger, please call 911 (or your local emergency number) or call \
             or text 988 to reach the Suicide & Crisis Lifeline. You matter, \
             and people are ready to help you this minute.",
        ),
    }
}
