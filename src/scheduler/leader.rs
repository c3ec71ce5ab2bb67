//! Leader election over the store's atomic conditional-set.
//!
//! The leader lock is the sole mutual-exclusion mechanism in the system.
//! Acquisition and renewal are each a single atomic store operation; lease
//! expiry without renewal is the designed failover path, not an error.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::{StateStore, keys};

/// Elects and renews the proactive-scheduler leader.
pub struct LeaderElector {
    store: Arc<dyn StateStore>,
    /// This replica's identity, written as the lock value.
    replica_id: String,
    ttl: Duration,
}

impl LeaderElector {
    pub fn new(store: Arc<dyn StateStore>, replica_id: String, ttl: Duration) -> Self {
        Self {
            store,
            replica_id,
            ttl,
        }
    }

    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    /// Try to become (or remain) leader for one lease period.
    ///
    /// Renewal-first keeps the common case (already leader) to one cheap
    /// conditional update; the claim path only runs when we do not hold
    /// the lease.
    pub async fn try_acquire(&self) -> Result<bool, StoreError> {
        if self
            .store
            .extend_ttl_if(keys::LEADER_LOCK_KEY, &self.replica_id, self.ttl)
            .await?
        {
            debug!(replica = %self.replica_id, "Leader lease renewed");
            return Ok(true);
        }

        let acquired = self
            .store
            .put_if_absent(keys::LEADER_LOCK_KEY, &self.replica_id, Some(self.ttl))
            .await?;
        if acquired {
            info!(replica = %self.replica_id, "Leader lease acquired");
        }
        Ok(acquired)
    }

    /// Extend the lease after a completed scan. Returns `false` if the
    /// lease was lost, in which case the caller must stop acting as leader.
    pub async fn renew(&self) -> Result<bool, StoreError> {
        let renewed = self
            .store
            .extend_ttl_if(keys::LEADER_LOCK_KEY, &self.replica_id, self.ttl)
            .await?;
        if !renewed {
            warn!(replica = %self.replica_id, "Leader lease lost");
        }
        Ok(renewed)
    }

    /// Release the lease on graceful shutdown. Only removes the lock if
    /// this replica still holds it.
    pub async fn release(&self) -> Result<(), StoreError> {
        let released = self
            .store
            .delete_if(keys::LEADER_LOCK_KEY, &self.replica_id)
            .await?;
        if released {
            info!(replica = %self.replica_id, "Leader lease released");
        }
        Ok(())
    }
}
