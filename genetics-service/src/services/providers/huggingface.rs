//! Hugging Face inference provider.
//!
//! Uses the OpenAI-compatible chat-completion route that the hosted inference
//! API exposes per model. Requests are never streamed.

use super::{ChatProvider, Completion, CompletionParams, FinishReason, ProviderError};
use crate::models::Transcript;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER_NAME: &str = "huggingface";

/// Hugging Face provider configuration.
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub api_token: Secret<String>,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

/// Chat-completion client for one hosted model.
pub struct HuggingFaceProvider {
    config: HuggingFaceConfig,
    client: Client,
}

impl HuggingFaceProvider {
    pub fn new(config: HuggingFaceConfig) -> Result<Self, ProviderError> {
        if config.api_token.expose_secret().trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Hugging Face API token is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}/v1/chat/completions",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ChatProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        transcript: &Transcript,
        params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        let request = build_request(&self.config.model, transcript, params);

        tracing::debug!(
            model = %self.config.model,
            turns = transcript.len(),
            max_tokens = params.max_tokens,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(self.config.api_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::NetworkError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            return Err(ProviderError::ApiError(format!(
                "Inference API error {}: {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        parse_completion(&body)
    }
}

fn build_request<'a>(
    model: &'a str,
    transcript: &'a Transcript,
    params: &CompletionParams,
) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        messages: transcript
            .iter()
            .map(|turn| Message {
                role: turn.role.as_str(),
                content: &turn.content,
            })
            .collect(),
        max_tokens: params.max_tokens,
        stream: false,
    }
}

fn parse_completion(body: &str) -> Result<Completion, ProviderError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("Response has no choices".to_string()))?;

    let text = choice
        .message
        .content
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ProviderError::MalformedResponse("Response message is empty".to_string()))?;

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("stop") | Some("eos_token") | None => FinishReason::Complete,
        Some("length") => FinishReason::Length,
        Some(_) => FinishReason::Other,
    };

    Ok(Completion {
        text,
        finish_reason,
        output_tokens: parsed.usage.and_then(|u| u.completion_tokens),
    })
}

// ============================================================================
// Chat Completion Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    completion_tokens: Option<u32>,
}
