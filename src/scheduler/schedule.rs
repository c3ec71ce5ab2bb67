//! Per-identity schedule records.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{BackoffPolicy, StateStore, keys, with_backoff};

/// What a follow-up is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpKind {
    /// Post-crisis check-in recommended by the risk assessor.
    DistressFollowUp,
}

/// A one-shot future message tied to a prior event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    pub kind: FollowUpKind,
    pub due: DateTime<Utc>,
    /// Short free-text context carried into the composed message.
    pub context: String,
}

/// The per-identity schedule.
///
/// Once a check-in or prompt fires, its next timestamp advances strictly
/// forward; a follow-up is removed the moment it is processed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_check_in: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_journal_prompt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub follow_ups: Vec<FollowUp>,
}

impl ScheduleRecord {
    pub fn is_empty(&self) -> bool {
        self.next_check_in.is_none()
            && self.next_journal_prompt.is_none()
            && self.follow_ups.is_empty()
    }
}

/// `date` at `hour`:00:00 UTC.
fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

/// The day after `now`, at `hour`:00. Used for rollover after a slot fires.
pub fn next_day_at(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    at_hour(now.date_naive() + Days::new(1), hour)
}

/// The next occurrence of `hour`:00 strictly after `now`. Used when arming
/// a fresh schedule.
pub fn next_occurrence(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = at_hour(now.date_naive(), hour);
    if today > now {
        today
    } else {
        next_day_at(now, hour)
    }
}

/// CRUD over schedule records.
///
/// Like profiles, schedule read-modify-write is not locked per record;
/// the proactive scheduler is leader-gated, so in practice only one
/// replica mutates a schedule outside inbound-event handling.
pub struct ScheduleManager {
    store: Arc<dyn StateStore>,
    backoff: BackoffPolicy,
}

impl ScheduleManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            backoff: BackoffPolicy::default(),
        }
    }

    pub async fn load(&self, identity: &str) -> Result<Option<ScheduleRecord>, StoreError> {
        let key = keys::schedule(identity);
        let raw = with_backoff("schedule_get", &self.backoff, || self.store.get(&key)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, identity: &str, record: &ScheduleRecord) -> Result<(), StoreError> {
        let key = keys::schedule(identity);
        let json = serde_json::to_string(record)?;
        with_backoff("schedule_put", &self.backoff, || {
            self.store.put(&key, &json, None)
        })
        .await
    }

    /// Arm the initial check-in and journal-prompt slots.
    pub async fn arm_initial(
        &self,
        identity: &str,
        check_in_hour: u32,
        journal_prompt_hour: u32,
    ) -> Result<ScheduleRecord, StoreError> {
        let now = Utc::now();
        let mut record = self.load(identity).await?.unwrap_or_default();
        record.next_check_in = Some(next_occurrence(now, check_in_hour));
        record.next_journal_prompt = Some(next_occurrence(now, journal_prompt_hour));
        self.save(identity, &record).await?;
        debug!(
            identity,
            next_check_in = ?record.next_check_in,
            next_journal_prompt = ?record.next_journal_prompt,
            "Schedule armed"
        );
        Ok(record)
    }

    /// Clear the periodic slots and pending follow-ups ("stop").
    pub async fn clear(&self, identity: &str) -> Result<(), StoreError> {
        let key = keys::schedule(identity);
        with_backoff("schedule_clear", &self.backoff, || self.store.delete(&key)).await
    }

    /// Queue a one-shot follow-up.
    pub async fn add_follow_up(
        &self,
        identity: &str,
        follow_up: FollowUp,
    ) -> Result<(), StoreError> {
        let mut record = self.load(identity).await?.unwrap_or_default();
        record.follow_ups.push(follow_up);
        record.follow_ups.sort_by_key(|f| f.due);
        self.save(identity, &record).await
    }
}
