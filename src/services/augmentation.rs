//! Content augmentation provider.
//!
//! The note lifecycle only sees the [`Augmentation`] trait: one call that
//! turns text into an embedding vector and one that compresses text into
//! a summary. [`HttpAugmentation`] implements it over two wire formats,
//! OpenAI-compatible APIs and Yandex Foundation Models.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{AugmentationConfig, ProviderKind};
use crate::{Error, Result};

/// Sampling temperature for summaries.
const SUMMARY_TEMPERATURE: f64 = 0.3;

/// Upper bound on generated summary tokens.
const SUMMARY_MAX_TOKENS: u32 = 1024;

const SUMMARY_SYSTEM_PROMPT: &str = "You are a concise, accurate summarizer.";

/// Errors raised by an augmentation provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
}

/// External text-intelligence service.
#[async_trait]
pub trait Augmentation: Send + Sync {
    /// Derive an embedding vector for `text`.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;

    /// Compress `text` into a summary.
    async fn summarize(&self, text: &str) -> std::result::Result<String, ProviderError>;
}

/// User prompt sent with every summary request.
pub fn summary_prompt(text: &str) -> String {
    format!(
        "Write a summary of the following text. Compress it to 50-80% of its original \
         length and keep every key fact.\n\n{}",
        text
    )
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Option<Vec<OpenAiEmbedding>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Option<Vec<OpenAiChoice>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct YandexEmbeddingResponse {
    embedding: Option<Vec<f32>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct YandexCompletionResponse {
    result: Option<YandexResult>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct YandexResult {
    alternatives: Vec<YandexAlternative>,
}

#[derive(Debug, Deserialize)]
struct YandexAlternative {
    message: YandexMessage,
}

#[derive(Debug, Deserialize)]
struct YandexMessage {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ============================================================================
// HTTP adapter
// ============================================================================

/// Augmentation provider backed by an HTTP API.
#[derive(Clone)]
pub struct HttpAugmentation {
    client: Client,
    config: AugmentationConfig,
}

impl HttpAugmentation {
    /// Build the adapter with a client-level request timeout.
    pub fn new(config: AugmentationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn catalog(&self) -> std::result::Result<&str, ProviderError> {
        self.config
            .catalog_id
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("CATALOG_ID is required for yandex".into()))
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let mut request = self.client.post(url);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(catalog) = &self.config.catalog_id {
            if self.config.provider == ProviderKind::Yandex {
                request = request.header("x-folder-id", catalog);
            }
        }
        request
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &Value,
    ) -> std::result::Result<T, ProviderError> {
        debug!(
            provider = ?self.config.provider,
            url = %url,
            "Calling augmentation provider"
        );

        let response = self
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn embed_openai(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let body = json!({
            "model": self.config.embedding_model,
            "input": text,
        });

        let resp: OpenAiEmbeddingResponse = self.send(&self.url("embeddings"), &body).await?;
        if let Some(error) = resp.error {
            return Err(ProviderError::Provider(error.message));
        }

        resp.data
            .and_then(|d| d.into_iter().next())
            .map(|e| e.embedding)
            .ok_or_else(|| ProviderError::Parse("No embedding in response".into()))
    }

    async fn embed_yandex(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        let body = json!({
            "modelUri": format!("emb://{}/{}/latest", self.catalog()?, self.config.embedding_model),
            "text": text,
        });

        let resp: YandexEmbeddingResponse = self.send(&self.url("textEmbedding"), &body).await?;
        if let Some(error) = resp.error {
            return Err(ProviderError::Provider(error.message));
        }

        resp.embedding
            .ok_or_else(|| ProviderError::Parse("No embedding in response".into()))
    }

    async fn summarize_openai(&self, text: &str) -> std::result::Result<String, ProviderError> {
        let body = json!({
            "model": self.config.summary_model,
            "messages": [
                {"role": "system", "content": SUMMARY_SYSTEM_PROMPT},
                {"role": "user", "content": summary_prompt(text)}
            ],
            "temperature": SUMMARY_TEMPERATURE,
            "max_tokens": SUMMARY_MAX_TOKENS
        });

        let resp: OpenAiChatResponse = self.send(&self.url("chat/completions"), &body).await?;
        if let Some(error) = resp.error {
            return Err(ProviderError::Provider(error.message));
        }

        resp.choices
            .and_then(|c| c.into_iter().next())
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Parse("No choices in response".into()))
    }

    async fn summarize_yandex(&self, text: &str) -> std::result::Result<String, ProviderError> {
        let body = json!({
            "modelUri": format!("gpt://{}/{}/latest", self.catalog()?, self.config.summary_model),
            "completionOptions": {
                "stream": false,
                "temperature": SUMMARY_TEMPERATURE,
                "maxTokens": SUMMARY_MAX_TOKENS.to_string()
            },
            "messages": [
                {"role": "system", "text": SUMMARY_SYSTEM_PROMPT},
                {"role": "user", "text": summary_prompt(text)}
            ]
        });

        let resp: YandexCompletionResponse = self.send(&self.url("completion"), &body).await?;
        if let Some(error) = resp.error {
            return Err(ProviderError::Provider(error.message));
        }

        resp.result
            .and_then(|r| r.alternatives.into_iter().next())
            .map(|a| a.message.text)
            .ok_or_else(|| ProviderError::Parse("No alternatives in response".into()))
    }
}

#[async_trait]
impl Augmentation for HttpAugmentation {
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
        match self.config.provider {
            ProviderKind::OpenAi => self.embed_openai(text).await,
            ProviderKind::Yandex => self.embed_yandex(text).await,
        }
    }

    async fn summarize(&self, text: &str) -> std::result::Result<String, ProviderError> {
        match self.config.provider {
            ProviderKind::OpenAi => self.summarize_openai(text).await,
            ProviderKind::Yandex => self.summarize_yandex(text).await,
        }
    }
}
