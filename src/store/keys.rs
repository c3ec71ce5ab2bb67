//! Key layout for the state store.
//!
//! One flat namespace, colon-separated. Identities are normalized contact
//! addresses and never contain `:` after normalization.

use chrono::NaiveDate;

/// Prefix for per-user profiles.
pub const PROFILE_PREFIX: &str = "profile:";
/// Prefix for per-user conversation history lists.
pub const HISTORY_PREFIX: &str = "history:";
/// Prefix for per-user schedule records.
pub const SCHEDULE_PREFIX: &str = "schedule:";
/// Prefix for daily journal buckets.
pub const JOURNAL_PREFIX: &str = "journal:";
/// Prefix for crisis log entries.
pub const CRISIS_PREFIX: &str = "crisis:";
/// Prefix for idempotency markers.
pub const IDEMPOTENCY_PREFIX: &str = "idem:";
/// Singleton leader lock for the proactive scheduler.
pub const LEADER_LOCK_KEY: &str = "leader:scheduler";

pub fn profile(identity: &str) -> String {
    format!("{PROFILE_PREFIX}{identity}")
}

pub fn history(identity: &str) -> String {
    format!("{HISTORY_PREFIX}{identity}")
}

pub fn schedule(identity: &str) -> String {
    format!("{SCHEDULE_PREFIX}{identity}")
}

pub fn journal(identity: &str, date: NaiveDate) -> String {
    format!("{JOURNAL_PREFIX}{identity}:{date}")
}

pub fn crisis(identity: &str, timestamp_millis: i64) -> String {
    format!("{CRISIS_PREFIX}{identity}:{timestamp_millis}")
}

pub fn idempotency(event_id: &str) -> String {
    format!("{IDEMPOTENCY_PREFIX}{event_id}")
}

/// Identity suffix of a schedule key, if it is one.
pub fn schedule_identity(key: &str) -> Option<&str> {
    key.strip_prefix(SCHEDULE_PREFIX)
}

/// All per-identity prefixes, for user-initiated erasure.
pub fn erasure_prefixes(identity: &str) -> Vec<String> {
    vec![
        profile(identity),
        history(identity),
        format!("{SCHEDULE_PREFIX}{identity}"),
        format!("{JOURNAL_PREFIX}{identity}:"),
        format!("{CRISIS_PREFIX}{identity}:"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_identity_roundtrip() {
        let key = schedule("+15551234567");
        assert_eq!(schedule_identity(&key), Some("+15551234567"));
        assert_eq!(schedule_identity("profile:+15551234567"), None);
    }

    #[test]
    fn journal_key_includes_date() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(journal("u1", date), "journal:u1:2025-03-14");
    }
}
