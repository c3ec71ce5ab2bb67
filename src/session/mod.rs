//! Per-identity sessions: profile CRUD and the conversation-history window.

pub mod history;
pub mod profile;

pub use history::{ConversationMessage, MessageKind, MessageRole};
pub use profile::{EmotionalState, MoodEntry, Preferences, UserProfile};

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::StoreError;
use crate::store::{BackoffPolicy, StateStore, keys, with_backoff};

/// CRUD over profiles and history.
///
/// Read-modify-write of a profile is not locked per record: two replicas
/// updating the same identity concurrently race last-writer-wins.
pub struct SessionManager {
    store: Arc<dyn StateStore>,
    backoff: BackoffPolicy,
    history_cap: usize,
}

impl SessionManager {
    pub fn new(store: Arc<dyn StateStore>, history_cap: usize) -> Self {
        Self {
            store,
            backoff: BackoffPolicy::default(),
            history_cap,
        }
    }

    /// Load a profile, if one exists.
    pub async fn load(&self, identity: &str) -> Result<Option<UserProfile>, StoreError> {
        let key = keys::profile(identity);
        let raw = with_backoff("profile_get", &self.backoff, || self.store.get(&key)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Load a profile, creating one on first contact.
    /// Returns the profile and whether it was just created.
    pub async fn load_or_create(&self, identity: &str) -> Result<(UserProfile, bool), StoreError> {
        if let Some(profile) = self.load(identity).await? {
            return Ok((profile, false));
        }
        let profile = UserProfile::new(identity, Utc::now());
        self.save(&profile).await?;
        info!(identity, "New user profile created");
        Ok((profile, true))
    }

    /// Persist a profile.
    pub async fn save(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let key = keys::profile(&profile.identity);
        let json = serde_json::to_string(profile)?;
        with_backoff("profile_put", &self.backoff, || {
            self.store.put(&key, &json, None)
        })
        .await
    }

    /// Append one message to an identity's history window.
    pub async fn append_message(
        &self,
        identity: &str,
        message: &ConversationMessage,
    ) -> Result<(), StoreError> {
        let key = keys::history(identity);
        let json = serde_json::to_string(message)?;
        with_backoff("history_push", &self.backoff, || {
            self.store.list_push(&key, &json, self.history_cap, None)
        })
        .await
    }

    /// Read the history window, oldest first. Entries that fail to parse
    /// are skipped rather than failing the read.
    pub async fn recent_history(
        &self,
        identity: &str,
    ) -> Result<Vec<ConversationMessage>, StoreError> {
        let key = keys::history(identity);
        let raw = with_backoff("history_range", &self.backoff, || {
            self.store.list_range(&key)
        })
        .await?;
        Ok(raw
            .iter()
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect())
    }

    /// Remove every record associated with an identity.
    pub async fn erase(&self, identity: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        for prefix in keys::erasure_prefixes(identity) {
            removed += with_backoff("erase", &self.backoff, || {
                self.store.delete_prefix(&prefix)
            })
            .await?;
        }
        info!(identity, removed, "Erased all records for identity");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;

    async fn manager() -> SessionManager {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        SessionManager::new(store, 50)
    }

    #[tokio::test]
    async fn load_or_create_is_idempotent() {
        let sessions = manager().await;
        let (first, created) = sessions.load_or_create("u1").await.unwrap();
        assert!(created);
        let (second, created) = sessions.load_or_create("u1").await.unwrap();
        assert!(!created);
        assert_eq!(first.identity, second.identity);
        assert_eq!(first.joined_at, second.joined_at);
    }

    #[tokio::test]
    async fn history_window_caps_at_fifty() {
        let sessions = manager().await;
        for i in 0..60 {
            sessions
                .append_message("u1", &ConversationMessage::user(&format!("m{i}")))
                .await
                .unwrap();
        }
        let history = sessions.recent_history("u1").await.unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].content, "m10");
        assert_eq!(history[49].content, "m59");
    }

    #[tokio::test]
    async fn erase_removes_profile_and_history() {
        let sessions = manager().await;
        sessions.load_or_create("u1").await.unwrap();
        sessions
            .append_message("u1", &ConversationMessage::user("hello"))
            .await
            .unwrap();
        let removed = sessions.erase("u1").await.unwrap();
        assert!(removed >= 2);
        assert!(sessions.load("u1").await.unwrap().is_none());
        assert!(sessions.recent_history("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_preserves_stage_and_stats() {
        let sessions = manager().await;
        let (mut profile, _) = sessions.load_or_create("u1").await.unwrap();
        profile.touch(Utc::now());
        profile.name = Some("Sam".into());
        sessions.save(&profile).await.unwrap();
        let loaded = sessions.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.message_count, 1);
        assert_eq!(loaded.name.as_deref(), Some("Sam"));
    }
}
