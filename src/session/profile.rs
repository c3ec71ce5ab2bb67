//! User profile data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::onboarding::OnboardingStage;

/// How many mood tags to retain per user.
const MOOD_HISTORY_CAP: usize = 20;

/// A timestamped emotional-state tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodEntry {
    pub tag: String,
    pub at: DateTime<Utc>,
}

/// Emotional-state summary: current tag plus a bounded history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmotionalState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    #[serde(default)]
    pub history: Vec<MoodEntry>,
}

impl EmotionalState {
    /// Record a new mood tag, dropping the oldest beyond the cap.
    pub fn record(&mut self, tag: &str, at: DateTime<Utc>) {
        self.current = Some(tag.to_string());
        self.history.push(MoodEntry {
            tag: tag.to_string(),
            at,
        });
        if self.history.len() > MOOD_HISTORY_CAP {
            let excess = self.history.len() - MOOD_HISTORY_CAP;
            self.history.drain(..excess);
        }
    }
}

/// User preference set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    /// Whether proactive check-ins are wanted.
    pub check_ins_enabled: bool,
    /// What brought the user here, captured during onboarding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            check_ins_enabled: false,
            reason: None,
        }
    }
}

/// Per-identity profile.
///
/// Created on the first inbound event for an identity. `onboarding_stage`
/// and `message_count` are monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Normalized contact address, unique per user.
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub onboarding_stage: OnboardingStage,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub emotional_state: EmotionalState,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub journal_count: u64,
}

impl UserProfile {
    pub fn new(identity: &str, now: DateTime<Utc>) -> Self {
        Self {
            identity: identity.to_string(),
            name: None,
            onboarding_stage: OnboardingStage::default(),
            preferences: Preferences::default(),
            emotional_state: EmotionalState::default(),
            joined_at: now,
            last_active: now,
            message_count: 0,
            journal_count: 0,
        }
    }

    /// Register one inbound message: bump activity stats.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_active = now;
        self.message_count += 1;
    }

    /// Display name, falling back to a neutral address form.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("friend")
    }
}
