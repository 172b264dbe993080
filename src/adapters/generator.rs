//! Chat-completions client for the text-generation service.
//!
//! Speaks the OpenAI-compatible `POST {base}/chat/completions` shape with
//! bearer auth. The model's reply text is returned unparsed; the router
//! decides what to make of it.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AdapterError, Generator};
use crate::core::request::ExtractionRequest;

/// Default API base
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default model name
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Generation is slow on long transcripts
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Chat-completions generator
pub struct ChatCompletionsGenerator {
    api_key: Option<String>,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionsGenerator {
    pub fn new(
        api_key: Option<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: GeneratorConfig) -> Self {
        Self::new(
            config.api_key,
            config.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        )
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    fn body<'a>(&'a self, request: &'a ExtractionRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ExtractionRequest) -> Result<String, AdapterError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::ConfigurationMissing("chat API key".to_string()))?;

        tracing::debug!(
            model = %self.model,
            template = ?request.template,
            prompt_chars = request.user.len(),
            "Sending extraction request"
        );

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(key)
            .timeout(REQUEST_TIMEOUT)
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Rejected {
                service: "generator",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AdapterError::MalformedResponse("no choices in response".to_string()))
    }
}
