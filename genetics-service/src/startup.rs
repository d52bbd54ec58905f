//! Application startup and lifecycle management.

use crate::config::GeneticsConfig;
use crate::handlers::{chatbot, genetics, health, pages};
use crate::services::metrics::{metrics_middleware, set_active_sessions};
use crate::services::providers::huggingface::{HuggingFaceConfig, HuggingFaceProvider};
use crate::services::providers::{ChatProvider, CompletionParams};
use crate::services::{ChatProxy, GeneticsDb, InMemorySessionStore, SessionStore};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::request_id::{request_id_middleware, RequestId};
use service_core::middleware::security_headers::security_headers_middleware;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: GeneticsDb,
    pub chat: Arc<ChatProxy>,
}

/// Assemble the HTTP router: pages, JSON API, health checks and static assets.
pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(pages::index))
        .route("/genes", get(pages::genes))
        .route("/traits", get(pages::traits))
        .route("/analytics", get(pages::analytics))
        .route("/chatbot", get(pages::chatbot))
        .route("/api/genes", get(genetics::api_genes))
        .route("/api/traits", get(genetics::api_traits))
        .route(
            "/api/charts/inheritance-patterns",
            get(genetics::inheritance_patterns),
        )
        .route("/api/charts/most-studied", get(genetics::most_studied))
        .route("/api/chatbot", post(chatbot::chatbot))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(pages::not_found)
        .layer(CorsLayer::permissive())
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map(|id| id.0.as_str())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Build the inference provider, or `None` when chat cannot be offered.
pub fn build_provider(config: &GeneticsConfig) -> Option<Arc<dyn ChatProvider>> {
    let Some(api_token) = config.chat.api_token.clone() else {
        tracing::warn!("HF_TOKEN is not set; the chatbot is disabled");
        return None;
    };

    let provider_config = HuggingFaceConfig {
        api_token,
        model: config.chat.model.clone(),
        api_base: config.chat.api_base.clone(),
        timeout: config.chat.timeout(),
    };

    match HuggingFaceProvider::new(provider_config) {
        Ok(provider) => {
            tracing::info!(model = %config.chat.model, "Initialized Hugging Face chat provider");
            Some(Arc::new(provider) as Arc<dyn ChatProvider>)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to initialize chat provider; the chatbot is disabled");
            None
        }
    }
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    sessions: Arc<dyn SessionStore>,
    purge_interval: Duration,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: GeneticsConfig) -> Result<Self, AppError> {
        let provider = build_provider(&config);
        Self::build_with_provider(config, provider).await
    }

    /// Build with an explicit inference provider.
    pub async fn build_with_provider(
        config: GeneticsConfig,
        provider: Option<Arc<dyn ChatProvider>>,
    ) -> Result<Self, AppError> {
        let db = GeneticsDb::bootstrap(&config.database.path, config.database.max_connections)
            .await
            .map_err(|e| {
                tracing::error!("Failed to open database: {}", e);
                e
            })?;

        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(
            config.chat.history_window,
            config.chat.session_ttl(),
        ));
        let params = CompletionParams {
            max_tokens: config.chat.max_tokens,
        };
        let chat = Arc::new(ChatProxy::new(sessions.clone(), provider, params));

        let router = build_router(AppState { db, chat }, &config.static_dir);

        // Port 0 binds a random port for testing
        let address = config.server.address();
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Genetics service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
            sessions,
            purge_interval: config.chat.purge_interval(),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until a shutdown signal arrives. Expired sessions are purged in
    /// the background meanwhile.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let purge = tokio::spawn(purge_sessions(self.sessions, self.purge_interval));

        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        purge.abort();
        result
    }
}

async fn purge_sessions(sessions: Arc<dyn SessionStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let removed = sessions.purge_expired().await;
        let remaining = sessions.session_count().await;
        set_active_sessions(remaining);
        if removed > 0 {
            tracing::info!(removed, remaining, "Purged expired chat sessions");
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
