//! Chat-completions client for OpenAI-compatible providers
//!
//! Mistral and OpenAI expose the same `/chat/completions` protocol, so one
//! client serves as both the primary and the secondary provider.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::RefinementError;
use crate::llm::TextGenerator;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Reusable chat-completions client (connection-pooled)
pub struct ChatCompletionClient {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            name: name.into(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: 0.0,
        })
    }

    pub fn mistral(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::new("mistral", MISTRAL_BASE_URL, api_key, model)
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::new("openai", OPENAI_BASE_URL, api_key, model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: 1024,
            stream: false,
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(RefinementError::Provider {
                provider: self.name.clone(),
                message: "API key not configured".to_string(),
            });
        }

        let url = format!("{}/chat/completions", self.base_url);

        info!(provider = %self.name, model = %self.model, "Calling chat completions API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                error!(provider = %self.name, "Chat completions request failed: {}", e);
                RefinementError::Provider {
                    provider: self.name.clone(),
                    message: format!("request failed: {}", e),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(provider = %self.name, %status, "Chat completions error response: {}", error_text);
            return Err(RefinementError::Provider {
                provider: self.name.clone(),
                message: format!("{}: {}", status, error_text),
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = %self.name, "Failed to parse chat completions response: {}", e);
            RefinementError::MalformedResponse(format!("{} reply: {}", self.name, e))
        })?;

        extract_content(body).ok_or_else(|| {
            RefinementError::MalformedResponse(format!("{} returned no message content", self.name))
        })
    }
}

fn extract_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
