//! Normalized inbound events, as handed over by the transport layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport-level event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Text,
    Reaction,
    Voice,
    Status,
}

/// One inbound event. Signature verification already happened upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub kind: EventKind,
    /// Transport-unique event identifier, used for deduplication.
    pub event_id: String,
    /// Normalized contact address of the sender.
    pub identity: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl InboundEvent {
    /// A plain text event (the common case, and what tests construct).
    pub fn text(event_id: &str, identity: &str, content: &str) -> Self {
        Self {
            kind: EventKind::Text,
            event_id: event_id.to_string(),
            identity: identity.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }
}
