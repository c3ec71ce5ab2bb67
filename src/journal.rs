//! Journaling — prefix classification and daily-bucket storage.
//!
//! A journal entry is detected before risk assessment and onboarding and
//! short-circuits the rest of the inbound pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{BackoffPolicy, StateStore, keys, with_backoff};

/// Fixed prefixes that mark a message as a journal entry.
const ENTRY_PREFIXES: &[&str] = &["journal:", "diary:", "j:"];

fn matched_prefix(text: &str) -> Option<&'static str> {
    let trimmed = text.trim_start();
    ENTRY_PREFIXES
        .iter()
        .find(|p| {
            trimmed
                .get(..p.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(p))
        })
        .copied()
}

/// Whether the text is a journal entry.
pub fn is_entry(text: &str) -> bool {
    matched_prefix(text).is_some()
}

/// Strip the matched prefix and surrounding whitespace.
pub fn extract(text: &str) -> &str {
    let trimmed = text.trim_start();
    match matched_prefix(trimmed) {
        Some(prefix) => trimmed[prefix.len()..].trim(),
        None => trimmed.trim(),
    }
}

/// One entry within a day's bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalItem {
    pub content: String,
    /// Whether this entry answered a journal prompt.
    pub prompted: bool,
    pub timestamp: DateTime<Utc>,
}

/// A day's journal bucket, retained one year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalDay {
    pub date: NaiveDate,
    pub entries: Vec<JournalItem>,
}

/// Files journal entries into daily buckets.
pub struct JournalManager {
    store: Arc<dyn StateStore>,
    retention: Duration,
    backoff: BackoffPolicy,
}

impl JournalManager {
    pub fn new(store: Arc<dyn StateStore>, retention: Duration) -> Self {
        Self {
            store,
            retention,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Append one entry to today's bucket. Returns today's entry count.
    pub async fn record(
        &self,
        identity: &str,
        content: &str,
        prompted: bool,
    ) -> Result<usize, StoreError> {
        let now = Utc::now();
        let date = now.date_naive();
        let key = keys::journal(identity, date);

        let mut day = match with_backoff("journal_get", &self.backoff, || self.store.get(&key))
            .await?
        {
            Some(json) => serde_json::from_str(&json)?,
            None => JournalDay {
                date,
                entries: Vec::new(),
            },
        };
        day.entries.push(JournalItem {
            content: content.to_string(),
            prompted,
            timestamp: now,
        });

        let json = serde_json::to_string(&day)?;
        with_backoff("journal_put", &self.backoff, || {
            self.store.put(&key, &json, Some(self.retention))
        })
        .await?;
        debug!(identity, %date, entries = day.entries.len(), "Journal entry filed");
        Ok(day.entries.len())
    }

    /// How many entries today's bucket holds.
    pub async fn today_count(&self, identity: &str) -> Result<usize, StoreError> {
        let key = keys::journal(identity, Utc::now().date_naive());
        match with_backoff("journal_get", &self.backoff, || self.store.get(&key)).await? {
            Some(json) => {
                let day: JournalDay = serde_json::from_str(&json)?;
                Ok(day.entries.len())
            }
            None => Ok(0),
        }
    }
}
