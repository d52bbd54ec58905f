//! Chatbot proxy: session history in, model reply out.

use crate::models::{ChatReply, ChatRequest, Turn};
use crate::services::metrics;
use crate::services::providers::{ChatProvider, CompletionParams, ProviderError};
use crate::services::sessions::SessionStore;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;
use validator::{Validate, ValidationErrors};

pub const NO_MESSAGE: &str = "No message provided";
pub const INVALID_SESSION: &str = "Invalid session_id";
const MODEL_UNAVAILABLE: &str = "Sorry, the chatbot model is not available.";
const UPSTREAM_FAILURE: &str = "I'm having trouble processing your request.";

/// Failures of `POST /api/chatbot`.
///
/// Rejected input answers `{"error": ...}`; model problems answer with a
/// user-facing `{"response": ...}` so the chat window can display them.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("Chat model not configured")]
    ServiceUnavailable,

    #[error("Inference failed: {0}")]
    UpstreamFailure(#[from] ProviderError),
}

impl ChatError {
    fn outcome(&self) -> &'static str {
        match self {
            ChatError::BadRequest(_) => "bad_request",
            ChatError::ServiceUnavailable => "unavailable",
            ChatError::UpstreamFailure(_) => "upstream_failure",
        }
    }
}

impl From<ValidationErrors> for ChatError {
    fn from(errors: ValidationErrors) -> Self {
        if errors.field_errors().contains_key("message") {
            ChatError::BadRequest(NO_MESSAGE)
        } else {
            ChatError::BadRequest(INVALID_SESSION)
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        match self {
            ChatError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ChatError::ServiceUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "response": MODEL_UNAVAILABLE })),
            )
                .into_response(),
            ChatError::UpstreamFailure(err) => {
                tracing::error!(error = %err, "Chat completion failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "response": UPSTREAM_FAILURE })),
                )
                    .into_response()
            }
        }
    }
}

/// Runs one exchange per request against the configured model.
pub struct ChatProxy {
    store: Arc<dyn SessionStore>,
    provider: Option<Arc<dyn ChatProvider>>,
    params: CompletionParams,
}

impl ChatProxy {
    /// `provider` is `None` when no credential was configured; every
    /// exchange then fails with [`ChatError::ServiceUnavailable`].
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Option<Arc<dyn ChatProvider>>,
        params: CompletionParams,
    ) -> Self {
        Self {
            store,
            provider,
            params,
        }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Append the user turn, ask the model and record its reply.
    ///
    /// An unconfigured model fails before the request is looked at. Exchanges
    /// on the same session run one at a time. When the model call fails the
    /// user turn stays in the history and no assistant turn is added.
    #[instrument(skip_all, fields(session_id = tracing::field::Empty))]
    pub async fn handle_message(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let result = self.exchange(request).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.outcome(),
        };
        metrics::record_chat_request(outcome);
        metrics::set_active_sessions(self.store.session_count().await);

        result
    }

    async fn exchange(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            tracing::warn!("Chat request received but no model is configured");
            ChatError::ServiceUnavailable
        })?;

        request.validate()?;
        let message = match request.message {
            Some(message) if !message.is_empty() => message,
            _ => return Err(ChatError::BadRequest(NO_MESSAGE)),
        };

        let (session_id, _) = self.store.get_or_create(request.session_id.as_deref()).await;
        tracing::Span::current().record("session_id", session_id.as_str());

        let _guard = self.store.lock(&session_id).await;
        let transcript = self
            .store
            .append_and_trim(&session_id, Turn::user(message))
            .await;

        let start = Instant::now();
        let completion = provider.complete(&transcript, &self.params).await;
        metrics::record_provider_latency(
            provider.name(),
            provider.model(),
            start.elapsed().as_secs_f64(),
        );

        let completion = completion.map_err(|e| {
            metrics::record_provider_error(provider.name(), e.kind());
            ChatError::from(e)
        })?;

        tracing::debug!(
            turns = transcript.len(),
            output_tokens = ?completion.output_tokens,
            finish_reason = ?completion.finish_reason,
            "Chat completion received"
        );

        self.store
            .append_and_trim(&session_id, Turn::assistant(completion.text.as_str()))
            .await;

        Ok(ChatReply {
            response: completion.text,
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatRequest, Role, HISTORY_WINDOW};
    use crate::services::providers::mock::MockChatProvider;
    use crate::services::sessions::InMemorySessionStore;
    use std::time::Duration;

    fn store() -> Arc<InMemorySessionStore> {
        Arc::new(InMemorySessionStore::new(
            HISTORY_WINDOW,
            Duration::from_secs(3600),
        ))
    }

    fn ask(session_id: Option<&str>, message: &str) -> ChatRequest {
        ChatRequest {
            message: Some(message.to_string()),
            session_id: session_id.map(str::to_string),
        }
    }

    fn proxy(
        store: Arc<InMemorySessionStore>,
        provider: Option<Arc<MockChatProvider>>,
    ) -> ChatProxy {
        ChatProxy::new(
            store,
            provider.map(|p| p as Arc<dyn ChatProvider>),
            CompletionParams::default(),
        )
    }

    #[tokio::test]
    async fn reply_carries_generated_session_id() {
        let store = store();
        let chat = proxy(store.clone(), Some(Arc::new(MockChatProvider::new())));

        let reply = chat.handle_message(ask(None, "What is HTT?")).await.unwrap();
        assert_eq!(reply.response, "Mock response for: What is HTT?");
        assert!(uuid::Uuid::parse_str(&reply.session_id).is_ok());

        let (_, transcript) = store.get_or_create(Some(&reply.session_id)).await;
        let roles: Vec<_> = transcript.iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn provider_sees_previous_turns() {
        let provider = Arc::new(MockChatProvider::new());
        let chat = proxy(store(), Some(provider.clone()));

        let first = chat.handle_message(ask(Some("s1"), "hello")).await.unwrap();
        assert_eq!(first.session_id, "s1");
        chat.handle_message(ask(Some("s1"), "again")).await.unwrap();

        let received = provider.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].len(), 1);
        assert_eq!(received[1].len(), 3);
    }

    #[tokio::test]
    async fn history_forwarded_to_model_is_bounded() {
        let provider = Arc::new(MockChatProvider::new());
        let chat = proxy(store(), Some(provider.clone()));

        for i in 0..8 {
            chat.handle_message(ask(Some("s1"), &format!("q{i}")))
                .await
                .unwrap();
        }

        for transcript in provider.received() {
            assert!(transcript.len() <= HISTORY_WINDOW);
        }
        let last = provider.received().pop().unwrap();
        assert_eq!(last.len(), HISTORY_WINDOW);
        assert_eq!(last.last().unwrap().content, "q7");
    }

    #[tokio::test]
    async fn missing_provider_is_unavailable() {
        let store = store();
        let chat = proxy(store.clone(), None);

        let err = chat.handle_message(ask(None, "hello")).await.unwrap_err();
        assert!(matches!(err, ChatError::ServiceUnavailable));
        assert_eq!(store.session_count().await, 0);
    }

    #[tokio::test]
    async fn availability_is_checked_before_the_body() {
        let chat = proxy(store(), None);

        let err = chat.handle_message(ask(None, "")).await.unwrap_err();
        assert!(matches!(err, ChatError::ServiceUnavailable));

        let err = chat
            .handle_message(ChatRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::ServiceUnavailable));
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_and_counted() {
        metrics::init_metrics();
        let bad_requests = || {
            metrics::CHAT_REQUESTS_TOTAL
                .get()
                .map(|c| c.with_label_values(&["bad_request"]).get())
                .unwrap_or_default()
        };
        let before = bad_requests();

        let store = store();
        let chat = proxy(store.clone(), Some(Arc::new(MockChatProvider::new())));

        let err = chat.handle_message(ask(None, "")).await.unwrap_err();
        assert!(matches!(err, ChatError::BadRequest(NO_MESSAGE)));

        let err = chat
            .handle_message(ask(Some(&"x".repeat(129)), "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::BadRequest(INVALID_SESSION)));

        assert_eq!(store.session_count().await, 0);
        assert!(bad_requests() >= before + 2);
    }

    #[tokio::test]
    async fn upstream_failure_keeps_user_turn() {
        let store = store();
        let chat = proxy(store.clone(), Some(Arc::new(MockChatProvider::failing())));

        let err = chat.handle_message(ask(Some("s1"), "hello")).await.unwrap_err();
        assert!(matches!(err, ChatError::UpstreamFailure(_)));

        let (_, transcript) = store.get_or_create(Some("s1")).await;
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.last().unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn concurrent_exchanges_on_one_session_do_not_interleave() {
        let store = store();
        let provider = Arc::new(MockChatProvider::new().with_delay(Duration::from_millis(20)));
        let chat = Arc::new(proxy(store.clone(), Some(provider)));

        let a = {
            let chat = chat.clone();
            tokio::spawn(async move { chat.handle_message(ask(Some("s1"), "a")).await })
        };
        let b = {
            let chat = chat.clone();
            tokio::spawn(async move { chat.handle_message(ask(Some("s1"), "b")).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let (_, transcript) = store.get_or_create(Some("s1")).await;
        let roles: Vec<_> = transcript.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[test]
    fn validation_errors_map_to_messages() {
        let missing = ChatRequest::default().validate().unwrap_err();
        assert!(matches!(
            ChatError::from(missing),
            ChatError::BadRequest(NO_MESSAGE)
        ));

        let long_id = ChatRequest {
            message: Some("hi".to_string()),
            session_id: Some("x".repeat(200)),
        }
        .validate()
        .unwrap_err();
        assert!(matches!(
            ChatError::from(long_id),
            ChatError::BadRequest(INVALID_SESSION)
        ));
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            ChatError::BadRequest(NO_MESSAGE).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ChatError::ServiceUnavailable.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ChatError::UpstreamFailure(ProviderError::Timeout)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
