//! Chat-completion client and per-session model construction.
//!
//! The user supplies their own model key, so clients are built per session
//! through a [`ModelProvider`]; the server only holds the provider.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::embedding::{Embedder, OpenAiEmbedder};
use crate::error::{QaError, Result};

/// A message in the wire format of the chat API.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the assistant's reply to `messages`.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Builds model clients bound to one user's credential.
pub trait ModelProvider: Send + Sync {
    fn embedder(&self, api_key: &str) -> Result<Arc<dyn Embedder>>;
    fn chat(&self, api_key: &str) -> Result<Arc<dyn ChatModel>>;
}

/// [`ModelProvider`] for OpenAI-compatible APIs.
pub struct OpenAiModels {
    config: LlmConfig,
}

impl OpenAiModels {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

impl ModelProvider for OpenAiModels {
    fn embedder(&self, api_key: &str) -> Result<Arc<dyn Embedder>> {
        Ok(Arc::new(OpenAiEmbedder::new(&self.config, api_key)?))
    }

    fn chat(&self, api_key: &str) -> Result<Arc<dyn ChatModel>> {
        Ok(Arc::new(OpenAiChat::new(&self.config, api_key)?))
    }
}

/// Chat model using `POST /chat/completions`.
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QaError::LanguageModel(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| QaError::LanguageModel(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(QaError::LanguageModel(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QaError::LanguageModel(e.to_string()))?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| {
                QaError::LanguageModel("Invalid OpenAI response: missing message content".into())
            })
    }
}

/// Checks a credential with a tiny request. Any failure means the key is
/// not usable.
pub async fn check_key(chat: &dyn ChatModel) -> Result<()> {
    match chat.complete(&[ChatMessage::user("say hi!")]).await {
        Ok(_) => Ok(()),
        Err(e) => Err(QaError::InvalidKey(e.to_string())),
    }
}
