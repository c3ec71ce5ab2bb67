//! Outbound delivery gateway.
//!
//! The messaging transport is an external collaborator consumed as
//! `send(recipient, text)`. Inbound signature validation belongs to the
//! transport layer, not here.

pub mod console;
pub mod http;

pub use console::ConsoleGateway;
pub use http::{GatewayConfig, HttpGateway};

use async_trait::async_trait;

use crate::error::GatewayError;

/// Abstract outbound delivery gateway.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Deliver one message segment to a recipient.
    async fn send(&self, identity: &str, text: &str) -> Result<(), GatewayError>;
}
