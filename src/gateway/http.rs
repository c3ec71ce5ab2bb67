//! HTTP delivery gateway — posts outbound messages to the messaging API.

use async_trait::async_trait;
use secrecy::ExposeSecret;

use crate::error::GatewayError;
use crate::gateway::DeliveryGateway;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Send endpoint, e.g. `https://gateway.example.com/v1/messages`.
    pub url: String,
    /// Bearer token for the messaging API.
    pub token: Option<secrecy::SecretString>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("EMBER_GATEWAY_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3000/v1/messages".to_string()),
            token: std::env::var("EMBER_GATEWAY_TOKEN")
                .ok()
                .map(secrecy::SecretString::from),
        }
    }
}

/// Delivery gateway over plain HTTP.
pub struct HttpGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DeliveryGateway for HttpGateway {
    async fn send(&self, identity: &str, text: &str) -> Result<(), GatewayError> {
        let token = self
            .config
            .token
            .as_ref()
            .ok_or(GatewayError::NoCredentials)?;

        let body = serde_json::json!({
            "to": identity,
            "text": text,
        });

        let response = self
            .client
            .post(&self.config.url)
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => Ok(()),
            400 => {
                let text = response.text().await.unwrap_or_default();
                Err(GatewayError::InvalidRequest(text))
            }
            401 | 403 => {
                let text = response.text().await.unwrap_or_default();
                Err(GatewayError::Auth(text))
            }
            429 => Err(GatewayError::RateLimited),
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(GatewayError::Http(format!("{status}: {text}")))
            }
        }
    }
}
