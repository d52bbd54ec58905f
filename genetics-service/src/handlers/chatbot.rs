use crate::models::{ChatReply, ChatRequest};
use crate::services::chat::ChatError;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

/// `POST /api/chatbot`
///
/// A body that is not JSON, or not an object, is handled as an empty request
/// so model availability is still reported first.
pub async fn chatbot(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ChatError> {
    let request = body.map(|Json(request)| request).unwrap_or_else(|rejection| {
        tracing::debug!(error = %rejection, "Rejected chat body");
        ChatRequest::default()
    });

    let reply = state.chat.handle_message(request).await?;

    Ok(Json(reply))
}
