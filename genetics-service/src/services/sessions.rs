//! Conversation history per chat session.
//!
//! The store is injected into the chat proxy as `Arc<dyn SessionStore>`.
//! Every operation leaves a transcript holding at most `window` turns, the
//! most recent ones. Sessions idle for longer than the TTL are treated as
//! unknown and removed by [`SessionStore::purge_expired`].

use crate::models::{Transcript, Turn};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Held for the duration of one chat exchange on a session.
pub type SessionGuard = OwnedMutexGuard<()>;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve `session_id` to its transcript, registering a new session if
    /// needed.
    ///
    /// A missing or empty id yields a freshly generated UUIDv4. A supplied id
    /// that is unknown or expired is registered as-is with an empty transcript.
    async fn get_or_create(&self, session_id: Option<&str>) -> (String, Transcript);

    /// Append `turn`, trim to the window and return the resulting transcript.
    async fn append_and_trim(&self, session_id: &str, turn: Turn) -> Transcript;

    /// Serialize exchanges on one session. The lock is released when the
    /// guard is dropped.
    async fn lock(&self, session_id: &str) -> SessionGuard;

    /// Drop sessions idle longer than the TTL. Returns how many were removed.
    async fn purge_expired(&self) -> usize;

    /// Number of sessions currently held.
    async fn session_count(&self) -> usize;
}

struct SessionEntry {
    transcript: Transcript,
    last_active: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            transcript: Transcript::new(),
            last_active: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.last_active) > ttl
    }
}

/// Process-local session store backed by a sharded concurrent map.
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    window: usize,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(window: usize, ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            locks: DashMap::new(),
            window,
            ttl,
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: Option<&str>) -> (String, Transcript) {
        let session_id = match session_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let now = Instant::now();
        let mut entry = self
            .sessions
            .entry(session_id.clone())
            .or_insert_with(SessionEntry::new);

        if entry.is_expired(self.ttl, now) {
            tracing::debug!(session_id = %session_id, "Session expired, starting a new transcript");
            *entry = SessionEntry::new();
        }

        let transcript = entry.transcript.clone();
        drop(entry);

        (session_id, transcript)
    }

    async fn append_and_trim(&self, session_id: &str, turn: Turn) -> Transcript {
        let now = Instant::now();
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionEntry::new);

        if entry.is_expired(self.ttl, now) {
            entry.transcript = Transcript::new();
        }

        entry.transcript.push_trimmed(turn, self.window);
        entry.last_active = now;
        entry.transcript.clone()
    }

    async fn lock(&self, session_id: &str) -> SessionGuard {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }

    async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();

        self.sessions
            .retain(|_, entry| !entry.is_expired(self.ttl, now));

        // Keep locks that are still held or belong to a live session.
        self.locks.retain(|id, lock| {
            Arc::strong_count(lock) > 1 || self.sessions.contains_key(id)
        });

        before.saturating_sub(self.sessions.len())
    }

    async fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
