//! Shared helpers for driving the router in-process.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use genetics_service::models::HISTORY_WINDOW;
use genetics_service::services::providers::mock::MockChatProvider;
use genetics_service::services::providers::{ChatProvider, CompletionParams};
use genetics_service::services::{ChatProxy, GeneticsDb, InMemorySessionStore};
use genetics_service::startup::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub sessions: Arc<InMemorySessionStore>,
    pub db: GeneticsDb,
    _dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// App over the bundled dataset with a working mock model.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(Some(Arc::new(MockChatProvider::new()))).await
}

/// App over the bundled dataset with the given model, or none at all.
pub async fn spawn_app_with(provider: Option<Arc<MockChatProvider>>) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = GeneticsDb::bootstrap(&dir.path().join("genetics.db"), 2)
        .await
        .expect("Failed to bootstrap database");
    assemble(dir, db, provider.map(|p| p as Arc<dyn ChatProvider>))
}

/// App over the bundled dataset backed by an arbitrary model client.
pub async fn spawn_app_with_provider(provider: Arc<dyn ChatProvider>) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = GeneticsDb::bootstrap(&dir.path().join("genetics.db"), 2)
        .await
        .expect("Failed to bootstrap database");
    assemble(dir, db, Some(provider))
}

/// App over an empty schema populated by `fixture`.
pub async fn spawn_app_with_fixture(fixture: &str) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = GeneticsDb::connect(&dir.path().join("fixture.db"), 2)
        .await
        .expect("Failed to open database");
    db.apply_schema().await.expect("Failed to apply schema");
    db.execute_script("fixture", fixture)
        .await
        .expect("Failed to load fixture");
    assemble(dir, db, Some(Arc::new(MockChatProvider::new())))
}

/// App whose database has no tables, so every query fails.
pub async fn spawn_app_without_schema() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db = GeneticsDb::connect(&dir.path().join("empty.db"), 1)
        .await
        .expect("Failed to open database");
    assemble(dir, db, None)
}

fn assemble(dir: TempDir, db: GeneticsDb, provider: Option<Arc<dyn ChatProvider>>) -> TestApp {
    let sessions = Arc::new(InMemorySessionStore::new(
        HISTORY_WINDOW,
        Duration::from_secs(3600),
    ));
    let chat = ChatProxy::new(
        sessions.clone(),
        provider,
        CompletionParams::default(),
    );
    let state = AppState {
        db: db.clone(),
        chat: Arc::new(chat),
    };
    let static_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("static");

    TestApp {
        router: build_router(state, &static_dir),
        sessions,
        db,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: impl Into<Body>) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
    }
}
