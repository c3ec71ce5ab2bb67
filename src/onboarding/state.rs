//! Onboarding stages — tracks how far a user has come.

use serde::{Deserialize, Serialize};

/// The stages of the onboarding conversation.
///
/// Progresses linearly: Initial → AskName → AskReason → AskCheckin →
/// Complete. Transitions are strictly forward; the stage never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStage {
    Initial,
    AskName,
    AskReason,
    AskCheckin,
    Complete,
}

impl OnboardingStage {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: OnboardingStage) -> bool {
        self.next() == Some(target)
    }

    /// Whether this stage is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<OnboardingStage> {
        use OnboardingStage::*;
        match self {
            Initial => Some(AskName),
            AskName => Some(AskReason),
            AskReason => Some(AskCheckin),
            AskCheckin => Some(Complete),
            Complete => None,
        }
    }
}

impl Default for OnboardingStage {
    fn default() -> Self {
        Self::Initial
    }
}

impl std::fmt::Display for OnboardingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::AskName => "ask_name",
            Self::AskReason => "ask_reason",
            Self::AskCheckin => "ask_checkin",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_walks_all_stages() {
        use OnboardingStage::*;
        let expected = [AskName, AskReason, AskCheckin, Complete];
        let mut current = Initial;
        for expected_next in expected {
            let next = current.next().unwrap();
            assert_eq!(next, expected_next);
            current = next;
        }
        assert!(current.next().is_none());
    }

    #[test]
    fn stage_ordering_is_forward() {
        use OnboardingStage::*;
        assert!(Initial < AskName);
        assert!(AskName < AskReason);
        assert!(AskReason < AskCheckin);
        assert!(AskCheckin < Complete);
    }

    #[test]
    fn invalid_transitions() {
        use OnboardingStage::*;
        // Skip stages
        assert!(!Initial.can_transition_to(AskReason));
        // Go backward
        assert!(!AskCheckin.can_transition_to(AskName));
        // Terminal
        assert!(!Complete.can_transition_to(Initial));
        // Self-transition
        assert!(!AskName.can_transition_to(AskName));
    }

    #[test]
    fn display_matches_serde() {
        use OnboardingStage::*;
        for stage in [Initial, AskName, AskReason, AskCheckin, Complete] {
            let display = format!("{stage}");
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(format!("\"{display}\""), json);
        }
    }
}
