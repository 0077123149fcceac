//! Remote completion service integrations

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ClientConfig;

use gemini::{GeminiConfig, GeminiProvider, DEFAULT_ENDPOINT};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Remote service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Upstream HTTP status, when the service answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Remote { status, .. } => Some(*status),
            ProviderError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A hosted model that turns one prompt into one reply
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}

pub enum Provider {
    Gemini(GeminiProvider),
}

impl Provider {
    pub fn from_config(client: &ClientConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        match client.llm.provider.to_lowercase().as_str() {
            "gemini" => {
                let api_key = api_key.ok_or_else(|| {
                    ProviderError::NotConfigured(format!(
                        "gemini (set {})",
                        client.llm.api_key_env
                    ))
                })?;
                let config = GeminiConfig {
                    base_url: client
                        .llm
                        .endpoint
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
                    api_key,
                    model: client.llm.model.clone(),
                    timeout_secs: client.llm.timeout_secs,
                    generation: client.generation.clone(),
                    safety: client.safety.clone(),
                };
                Ok(Provider::Gemini(GeminiProvider::new(config)?))
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}

#[async_trait]
impl CompletionService for Provider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        match self {
            Provider::Gemini(p) => p.complete(prompt).await,
        }
    }
}
