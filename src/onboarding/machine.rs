//! Onboarding step logic — at most one stage transition per inbound event.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::onboarding::OnboardingStage;
use crate::session::UserProfile;

/// Message count at which we ask for a name.
const NAME_PROMPT_THRESHOLD: u64 = 2;

/// Longest reason text we keep verbatim.
const REASON_CAP: usize = 200;

/// Replies this short are treated as a possible bare name.
const SHORT_REPLY_WORDS: usize = 2;

/// Common non-name words a short reply can be.
const NAME_STOPLIST: &[&str] = &[
    "hi", "hey", "hello", "yes", "no", "ok", "okay", "yeah", "yep", "nope", "sure", "thanks",
    "thank", "good", "fine", "great", "morning", "evening", "maybe", "what", "why", "who", "how",
    "nothing", "none", "sorry",
];

const POSITIVE_PHRASES: &[&str] = &[
    "yes",
    "yeah",
    "yep",
    "sure",
    "ok",
    "okay",
    "please",
    "definitely",
    "absolutely",
    "sounds good",
    "of course",
    "why not",
    "i'd like that",
];

const NEGATIVE_PHRASES: &[&str] = &[
    "no",
    "nope",
    "nah",
    "not really",
    "rather not",
    "no thanks",
    "don't",
    "dont",
    "stop",
];

/// Result of one onboarding step.
#[derive(Debug, Clone, Default)]
pub struct StepOutcome {
    /// Prompt to append to the outgoing reply, if the step produced one.
    pub prompt: Option<String>,
    /// Whether the initial check-in/journal schedule should be armed.
    pub arm_schedule: bool,
}

/// Run one onboarding step against a profile.
///
/// Mutates the profile in place (stage, name, preferences); the caller
/// persists it. The stage moves at most one step forward.
pub fn step(profile: &mut UserProfile, inbound: &str) -> StepOutcome {
    match profile.onboarding_stage {
        OnboardingStage::Complete => StepOutcome::default(),

        OnboardingStage::Initial => {
            if profile.message_count < NAME_PROMPT_THRESHOLD {
                return StepOutcome::default();
            }
            profile.onboarding_stage = OnboardingStage::AskName;
            StepOutcome {
                prompt: Some(
                    "By the way, I'd love to know what to call you. What's your name?".to_string(),
                ),
                arm_schedule: false,
            }
        }

        OnboardingStage::AskName => match extract_name(inbound) {
            Some(name) => {
                debug!(identity = %profile.identity, %name, "Extracted name during onboarding");
                let prompt = format!(
                    "Nice to meet you, {name}! What made you reach out? \
                     I'd like to understand what's on your mind."
                );
                profile.name = Some(name);
                profile.onboarding_stage = OnboardingStage::AskReason;
                StepOutcome {
                    prompt: Some(prompt),
                    arm_schedule: false,
                }
            }
            // No usable name yet; stay in this stage and ask again later.
            None => StepOutcome::default(),
        },

        OnboardingStage::AskReason => {
            let mut reason = inbound.trim().to_string();
            if reason.len() > REASON_CAP {
                let cut = (0..=REASON_CAP)
                    .rev()
                    .find(|i| reason.is_char_boundary(*i))
                    .unwrap_or(0);
                reason.truncate(cut);
            }
            profile.preferences.reason = Some(reason);
            profile.onboarding_stage = OnboardingStage::AskCheckin;
            StepOutcome {
                prompt: Some(
                    "Thank you for sharing that. Would you like me to check in with you \
                     each morning? I can also nudge you to journal in the evening."
                        .to_string(),
                ),
                arm_schedule: false,
            }
        }

        OnboardingStage::AskCheckin => {
            // Ambiguous answers default to yes.
            let wants_check_ins = parse_consent(inbound).unwrap_or(true);
            profile.preferences.check_ins_enabled = wants_check_ins;
            profile.onboarding_stage = OnboardingStage::Complete;
            let prompt = if wants_check_ins {
                "Wonderful. I'll say good morning each day, and you can write \
                 \"stop\" any time to pause."
            } else {
                "No problem, I won't reach out on my own. I'm here whenever you \
                 want to talk."
            };
            StepOutcome {
                prompt: Some(prompt.to_string()),
                arm_schedule: wants_check_ins,
            }
        }
    }
}

fn intro_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:i'?m|i am|my name is|my name'?s|call me|name'?s)\s+([A-Za-z][A-Za-z'\-]{1,29})",
        )
        .expect("static name pattern")
    })
}

/// Extract a candidate name from an inbound text.
///
/// Prefers explicit self-introduction phrasing; failing that, a reply of
/// at most two words is treated as a bare name. Candidates on the
/// stoplist are rejected.
pub fn extract_name(text: &str) -> Option<String> {
    if let Some(captures) = intro_pattern().captures(text) {
        let candidate = captures.get(1)?.as_str();
        if !is_stopword(candidate) {
            return Some(capitalize(candidate));
        }
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words.len() > SHORT_REPLY_WORDS {
        return None;
    }
    let candidate: String = words[0]
        .chars()
        .filter(|c| c.is_alphabetic() || *c == '\'' || *c == '-')
        .collect();
    if candidate.chars().count() < 2 || is_stopword(&candidate) {
        return None;
    }
    Some(capitalize(&candidate))
}

/// Parse a yes/no answer by positive/negative phrase membership.
/// Returns `None` when neither side matches.
pub fn parse_consent(text: &str) -> Option<bool> {
    let lowered = text.to_lowercase();
    if NEGATIVE_PHRASES.iter().any(|p| contains_phrase(&lowered, p)) {
        return Some(false);
    }
    if POSITIVE_PHRASES.iter().any(|p| contains_phrase(&lowered, p)) {
        return Some(true);
    }
    None
}

/// Phrase membership on word boundaries, so "no" doesn't match "know".
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(start, _)| {
        let before_ok = start == 0
            || haystack[..start]
                .chars()
                .next_back()
                .is_none_or(|c| !c.is_alphanumeric());
        let end = start + phrase.len();
        let after_ok = end == haystack.len()
            || haystack[end..].chars().next().is_none_or(|c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

fn is_stopword(candidate: &str) -> bool {
    let lowered = candidate.to_lowercase();
    NAME_STOPLIST.contains(&lowered.as_str())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile_at(stage: OnboardingStage, message_count: u64) -> UserProfile {
        let mut profile = UserProfile::new("u1", Utc::now());
        profile.onboarding_stage = stage;
        profile.message_count = message_count;
        profile
    }

    #[test]
    fn initial_waits_for_threshold() {
        let mut profile = profile_at(OnboardingStage::Initial, 1);
        let outcome = step(&mut profile, "hello");
        assert!(outcome.prompt.is_none());
        assert_eq!(profile.onboarding_stage, OnboardingStage::Initial);
    }

    #[test]
    fn initial_asks_name_at_threshold() {
        let mut profile = profile_at(OnboardingStage::Initial, 2);
        let outcome = step(&mut profile, "hello again");
        assert!(outcome.prompt.unwrap().contains("name"));
        assert_eq!(profile.onboarding_stage, OnboardingStage::AskName);
    }

    #[test]
    fn name_extracted_from_introduction() {
        let mut profile = profile_at(OnboardingStage::AskName, 3);
        let outcome = step(&mut profile, "I'm Priya, by the way");
        assert_eq!(profile.name.as_deref(), Some("Priya"));
        assert_eq!(profile.onboarding_stage, OnboardingStage::AskReason);
        assert!(outcome.prompt.unwrap().contains("Priya"));
    }

    #[test]
    fn short_reply_taken_as_name() {
        let mut profile = profile_at(OnboardingStage::AskName, 3);
        step(&mut profile, "marcus");
        assert_eq!(profile.name.as_deref(), Some("Marcus"));
    }

    #[test]
    fn stoplist_rejects_greeting_as_name() {
        let mut profile = profile_at(OnboardingStage::AskName, 3);
        let outcome = step(&mut profile, "hello");
        assert!(profile.name.is_none());
        assert_eq!(profile.onboarding_stage, OnboardingStage::AskName);
        assert!(outcome.prompt.is_none());
    }

    #[test]
    fn reason_recorded_and_truncated() {
        let mut profile = profile_at(OnboardingStage::AskReason, 4);
        let long = "x".repeat(500);
        step(&mut profile, &long);
        assert_eq!(profile.preferences.reason.as_ref().unwrap().len(), 200);
        assert_eq!(profile.onboarding_stage, OnboardingStage::AskCheckin);
    }

    #[test]
    fn checkin_yes_arms_schedule() {
        let mut profile = profile_at(OnboardingStage::AskCheckin, 5);
        let outcome = step(&mut profile, "yes please!");
        assert!(outcome.arm_schedule);
        assert!(profile.preferences.check_ins_enabled);
        assert_eq!(profile.onboarding_stage, OnboardingStage::Complete);
    }

    #[test]
    fn checkin_no_still_completes() {
        let mut profile = profile_at(OnboardingStage::AskCheckin, 5);
        let outcome = step(&mut profile, "no thanks");
        assert!(!outcome.arm_schedule);
        assert!(!profile.preferences.check_ins_enabled);
        assert_eq!(profile.onboarding_stage, OnboardingStage::Complete);
    }

    #[test]
    fn ambiguous_checkin_defaults_to_yes() {
        let mut profile = profile_at(OnboardingStage::AskCheckin, 5);
        let outcome = step(&mut profile, "hmm whatever works");
        assert!(outcome.arm_schedule);
        assert!(profile.preferences.check_ins_enabled);
    }

    #[test]
    fn complete_stage_is_inert() {
        let mut profile = profile_at(OnboardingStage::Complete, 10);
        let outcome = step(&mut profile, "I'm Alex");
        assert!(outcome.prompt.is_none());
        assert!(profile.name.is_none());
    }

    #[test]
    fn stage_never_regresses_across_events() {
        let mut profile = profile_at(OnboardingStage::Initial, 0);
        let inputs = ["hi", "hello", "I'm Dana", "stress at work", "sure", "hi again"];
        let mut last = profile.onboarding_stage;
        for (i, input) in inputs.iter().enumerate() {
            profile.message_count = i as u64 + 1;
            step(&mut profile, input);
            assert!(profile.onboarding_stage >= last);
            last = profile.onboarding_stage;
        }
        assert_eq!(profile.onboarding_stage, OnboardingStage::Complete);
    }

    #[test]
    fn consent_parsing() {
        assert_eq!(parse_consent("Yes, sounds good"), Some(true));
        assert_eq!(parse_consent("nah"), Some(false));
        assert_eq!(parse_consent("I don't know"), Some(false));
        assert_eq!(parse_consent("whenever"), None);
        // "know" must not read as "no"
        assert_eq!(parse_consent("you know me"), None);
    }

    #[test]
    fn name_extraction_patterns() {
        assert_eq!(extract_name("call me Sam"), Some("Sam".into()));
        assert_eq!(extract_name("my name is rosa"), Some("Rosa".into()));
        assert_eq!(extract_name("I am Lee."), Some("Lee".into()));
        assert_eq!(extract_name("ok thanks"), None);
        assert_eq!(extract_name("that is a very long sentence here"), None);
    }
}
