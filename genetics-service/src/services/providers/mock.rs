//! Mock provider implementation for testing.

use super::{ChatProvider, Completion, CompletionParams, FinishReason, ProviderError};
use crate::models::{Role, Transcript};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Mock chat provider for testing.
///
/// Replies with `Mock response for: <last user message>`, or fails every call
/// when built with [`MockChatProvider::failing`]. Every transcript it receives
/// is recorded for later inspection.
pub struct MockChatProvider {
    enabled: bool,
    delay: Duration,
    received: Mutex<Vec<Transcript>>,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self {
            enabled: true,
            delay: Duration::ZERO,
            received: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails like an unreachable upstream.
    pub fn failing() -> Self {
        Self {
            enabled: false,
            ..Self::new()
        }
    }

    /// Simulate upstream latency before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Transcripts received so far, oldest first.
    pub fn received(&self) -> Vec<Transcript> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }
}

impl Default for MockChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        transcript: &Transcript,
        _params: &CompletionParams,
    ) -> Result<Completion, ProviderError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(transcript.clone());
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if !self.enabled {
            return Err(ProviderError::NetworkError(
                "Mock chat provider not enabled".to_string(),
            ));
        }

        let prompt = transcript
            .iter()
            .filter(|turn| turn.role == Role::User)
            .last()
            .map(|turn| turn.content.as_str())
            .unwrap_or_default();

        Ok(Completion {
            text: format!("Mock response for: {}", prompt),
            finish_reason: FinishReason::Complete,
            output_tokens: Some(5),
        })
    }
}
