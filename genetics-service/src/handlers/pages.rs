//! Server-rendered pages. Data is fetched client-side from the JSON API.

use askama::Template;
use axum::{extract::State, http::Uri, response::IntoResponse};
use service_core::error::AppError;

use crate::startup::AppState;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "genes.html")]
pub struct GenesTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "traits.html")]
pub struct TraitsTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "analytics.html")]
pub struct AnalyticsTemplate {
    pub active: &'static str,
}

#[derive(Template)]
#[template(path = "chatbot.html")]
pub struct ChatbotTemplate {
    pub active: &'static str,
    pub model_available: bool,
}

pub async fn index() -> impl IntoResponse {
    IndexTemplate { active: "home" }
}

pub async fn genes() -> impl IntoResponse {
    GenesTemplate { active: "genes" }
}

pub async fn traits() -> impl IntoResponse {
    TraitsTemplate { active: "traits" }
}

pub async fn analytics() -> impl IntoResponse {
    AnalyticsTemplate { active: "analytics" }
}

pub async fn chatbot(State(state): State<AppState>) -> impl IntoResponse {
    ChatbotTemplate {
        active: "chatbot",
        model_available: state.chat.is_available(),
    }
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(anyhow::anyhow!("No route for {}", uri.path()))
}
