//! Idempotency guard — deduplicates inbound events by identifier.
//!
//! Delivery is at-least-once and inbound handling is not leader-gated, so
//! every replica leans on this guard. The claim is one atomic
//! set-if-absent against the store; check-then-set would race.

use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::store::{StateStore, keys};

/// Result of claiming an event id.
#[derive(Debug, Clone, Copy)]
pub struct Claim {
    /// Another claim already exists within the TTL window.
    pub already_claimed: bool,
}

/// Claims event ids with a short-TTL marker.
pub struct IdempotencyGuard {
    store: Arc<dyn StateStore>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn StateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Claim an event id. An `Err` means the store was unavailable;
    /// callers must process conservatively, not drop the event.
    pub async fn claim(&self, event_id: &str) -> Result<Claim, StoreError> {
        let created = self
            .store
            .put_if_absent(&keys::idempotency(event_id), "claimed", Some(self.ttl))
            .await?;
        Ok(Claim {
            already_claimed: !created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlStore;

    #[tokio::test]
    async fn second_claim_within_ttl_is_rejected() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let guard = IdempotencyGuard::new(store, Duration::from_secs(600));
        assert!(!guard.claim("evt-1").await.unwrap().already_claimed);
        assert!(guard.claim("evt-1").await.unwrap().already_claimed);
        assert!(!guard.claim("evt-2").await.unwrap().already_claimed);
    }

    #[tokio::test]
    async fn claim_reopens_after_ttl() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let guard = IdempotencyGuard::new(store, Duration::from_millis(20));
        assert!(!guard.claim("evt-1").await.unwrap().already_claimed);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!guard.claim("evt-1").await.unwrap().already_claimed);
    }
}
