//! Configuration types.

use std::time::Duration;

/// Companion configuration.
#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Service name for identification.
    pub name: String,
    /// How many conversation messages to retain per user.
    pub history_cap: usize,
    /// How many recent messages to hand to the LLM as context.
    pub context_window: usize,
    /// TTL on idempotency markers for inbound events.
    pub idempotency_ttl: Duration,
    /// Retention for per-user crisis log entries.
    pub crisis_log_ttl: Duration,
    /// Retention for daily journal buckets.
    pub journal_ttl: Duration,
    /// Scheduler tick interval.
    pub tick_interval: Duration,
    /// Leader lease TTL. Must comfortably exceed one full schedule scan.
    pub leader_ttl: Duration,
    /// Local hour (0-23) at which daily check-ins fire.
    pub check_in_hour: u32,
    /// Local hour (0-23) at which journal prompts fire.
    pub journal_prompt_hour: u32,
    /// Maximum outbound segment length in bytes.
    pub max_segment_len: usize,
    /// Pacing delay between outbound segments.
    pub segment_pacing: Duration,
    /// Timeout on external LLM calls.
    pub llm_timeout: Duration,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            name: "ember".to_string(),
            history_cap: 50,
            context_window: 12,
            idempotency_ttl: Duration::from_secs(10 * 60),
            crisis_log_ttl: Duration::from_secs(90 * 24 * 3600),
            journal_ttl: Duration::from_secs(365 * 24 * 3600),
            tick_interval: Duration::from_secs(60),
            leader_ttl: Duration::from_secs(120),
            check_in_hour: 9,
            journal_prompt_hour: 20,
            max_segment_len: 1500,
            segment_pacing: Duration::from_millis(600),
            llm_timeout: Duration::from_secs(30),
        }
    }
}
