//! Console gateway — prints outbound messages to stdout.
//!
//! Used when no messaging credentials are configured, so the companion
//! can be driven from a local terminal.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::gateway::DeliveryGateway;

/// Writes deliveries to stdout.
pub struct ConsoleGateway;

impl ConsoleGateway {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryGateway for ConsoleGateway {
    async fn send(&self, identity: &str, text: &str) -> Result<(), GatewayError> {
        println!("[→ {identity}] {text}");
        Ok(())
    }
}
