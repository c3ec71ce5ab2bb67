//! Error types for Ember.

use std::time::Duration;

/// Top-level error type for the companion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// State-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Store busy: {0}")]
    Busy(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether a bounded-backoff retry is worth attempting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Delivery gateway errors. Variants mirror the gateway's failure reasons.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway credentials not configured")]
    NoCredentials,

    #[error("Gateway rejected request: {0}")]
    InvalidRequest(String),

    #[error("Gateway authentication failed: {0}")]
    Auth(String),

    #[error("Gateway rate limited")]
    RateLimited,

    #[error("Gateway HTTP error: {0}")]
    Http(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider request failed: {0}")]
    Server(String),

    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),
}

/// Scheduling errors.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Malformed schedule record for {identity}: {reason}")]
    Malformed { identity: String, reason: String },
}

/// Result type alias for the companion.
pub type Result<T> = std::result::Result<T, Error>;
