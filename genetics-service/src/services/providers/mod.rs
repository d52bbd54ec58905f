//! Inference provider abstractions and implementations.
//!
//! The chat proxy talks to a [`ChatProvider`] so the hosted backend can be
//! swapped for the mock in tests.

pub mod huggingface;
pub mod mock;

use crate::models::Transcript;
use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::Timeout => "timeout",
            ProviderError::NetworkError(_) => "network_error",
            ProviderError::MalformedResponse(_) => "malformed_response",
        }
    }
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    Other,
}

/// A single non-streamed completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub finish_reason: FinishReason,
    pub output_tokens: Option<u32>,
}

/// Generation parameters for a chat completion.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    /// Maximum generated tokens.
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self { max_tokens: 500 }
    }
}

/// A hosted model that continues a conversation.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Produce the next assistant message given the whole transcript as context.
    async fn complete(
        &self,
        transcript: &Transcript,
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError>;
}
