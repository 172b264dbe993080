//! Webex messaging adapter for meeting digests.
//!
//! Posts a markdown message to one person through the Webex REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{truncate_chars, AdapterError, ChatNotifier, MAX_MESSAGE_CHARS};

/// Default Webex API base
pub const DEFAULT_API_BASE: &str = "https://webexapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Webex messages client
pub struct WebexNotifier {
    /// Bot access token
    bot_token: Option<String>,
    /// API base URL, without trailing slash
    api_base: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Message result from POST /v1/messages
#[derive(Debug, Deserialize)]
struct MessageResult {
    id: Option<String>,
}

/// Configuration for the Webex notifier and recordings lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebexConfig {
    pub bot_token: Option<String>,
    /// User token for the recordings API; the bot token is used when unset
    pub access_token: Option<String>,
    pub api_base: Option<String>,
}

impl WebexNotifier {
    pub fn new(bot_token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.filter(|t| !t.trim().is_empty()),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: WebexConfig) -> Self {
        let base = config.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::new(config.bot_token, base)
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/v1/{}", self.api_base, method)
    }
}

#[async_trait]
impl ChatNotifier for WebexNotifier {
    fn name(&self) -> &str {
        "webex"
    }

    async fn notify(&self, recipient: &str, markdown: &str) -> Result<(), AdapterError> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or_else(|| AdapterError::ConfigurationMissing("Webex bot token".to_string()))?;

        let response = self
            .client
            .post(self.api_url("messages"))
            .bearer_auth(token)
            .timeout(REQUEST_TIMEOUT)
            .json(&serde_json::json!({
                "toPersonEmail": recipient,
                "markdown": truncate_chars(markdown, MAX_MESSAGE_CHARS),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Rejected {
                service: "webex",
                status: status.as_u16(),
                body,
            });
        }

        let result: MessageResult = response
            .json()
            .await
            .map_err(|e| AdapterError::MalformedResponse(e.to_string()))?;
        tracing::debug!(message_id = ?result.id, %recipient, "Digest posted to Webex");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let client = WebexNotifier::new(Some("TOKEN".to_string()), "https://webexapis.com/");
        assert_eq!(client.api_url("messages"), "https://webexapis.com/v1/messages");
    }

    #[tokio::test]
    async fn test_missing_token_is_configuration_error() {
        let client = WebexNotifier::from_config(WebexConfig {
            bot_token: Some("  ".to_string()),
            ..WebexConfig::default()
        });
        let err = client.notify("dana@example.com", "hi").await.unwrap_err();
        assert!(err.is_configuration());
    }
}
