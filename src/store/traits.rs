//! `StateStore` trait — single async interface for all persistence.
//!
//! Everything the companion persists goes through this trait: plain
//! key/value records with optional TTL, bounded append-only lists, and
//! prefix scans. The conditional operations (`put_if_absent`,
//! `extend_ttl_if`, `delete_if`) are required to execute as one atomic
//! statement in the backend — the idempotency guard and the leader lock
//! are built directly on that guarantee.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Backend-agnostic persistence trait.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get a value by key. Expired records read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value, replacing any existing record. `ttl` of `None` means
    /// the record does not expire.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Set a value only if the key is absent (or expired). Returns `true`
    /// if this call created the record. Atomic: a separate existence check
    /// followed by a write is not an acceptable implementation.
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Extend the TTL of a live record, but only if its current value
    /// equals `expected`. Returns `true` on success. Used for lease renewal.
    async fn extend_ttl_if(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete a record unconditionally.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete a record only if its current value equals `expected`.
    /// Returns `true` if a record was removed. Used for lease release.
    async fn delete_if(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Append to a list, trimming the oldest entries beyond `max_len`.
    async fn list_push(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Read a full list in insertion order.
    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Enumerate live keys with the given prefix.
    async fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Remove every record (values and lists) under a prefix. Returns the
    /// number of records removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    /// Physically remove expired records. Reads already treat them as
    /// absent; this reclaims the rows. Returns the number removed.
    async fn purge_expired(&self) -> Result<usize, StoreError>;
}
