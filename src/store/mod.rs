//! State store — abstract persistence for all companion records.

pub mod keys;
pub mod libsql_backend;
pub mod retry;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use retry::{BackoffPolicy, with_backoff};
pub use traits::StateStore;
