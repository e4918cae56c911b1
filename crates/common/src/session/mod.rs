//! Session context store
//!
//! Keeps the previous turn's resolved entities and intents per session id.
//! Bounded by an LRU capacity and an idle TTL; nothing survives a restart.
//! Concurrent turns on the same session id are not serialized, the last
//! writer wins.

use crate::config::SessionConfig;
use crate::context::Intent;
use crate::metrics;
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Session id used when the caller does not send one
pub const DEFAULT_SESSION_ID: &str = "default";

/// What the previous successful turn resolved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub previous_entities: Vec<String>,
    pub previous_intents: Vec<Intent>,
}

impl SessionContext {
    pub fn is_empty(&self) -> bool {
        self.previous_entities.is_empty() && self.previous_intents.is_empty()
    }
}

#[derive(Debug, Clone)]
struct SessionEntry {
    context: SessionContext,
    last_touched: Instant,
}

/// In-process, bounded map from session id to context
pub struct SessionStore {
    entries: Mutex<LruCache<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store holding at most `capacity` sessions (minimum 1)
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_entries, Duration::from_secs(config.ttl_secs))
    }

    /// Context for a session; empty for unknown or idle-expired sessions
    pub async fn get(&self, session_id: &str) -> SessionContext {
        self.get_at(session_id, Instant::now()).await
    }

    async fn get_at(&self, session_id: &str, now: Instant) -> SessionContext {
        let mut entries = self.entries.lock().await;

        let expired = match entries.get_mut(session_id) {
            Some(entry) if now.saturating_duration_since(entry.last_touched) <= self.ttl => {
                entry.last_touched = now;
                return entry.context.clone();
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(session_id);
            debug!(session_id, "Session context expired");
            metrics::record_sessions(entries.len(), 1);
        }

        SessionContext::default()
    }

    /// Replace a session's context after a successful turn
    pub async fn update(&self, session_id: &str, context: SessionContext) {
        self.update_at(session_id, context, Instant::now()).await
    }

    async fn update_at(&self, session_id: &str, context: SessionContext, now: Instant) {
        let mut entries = self.entries.lock().await;

        let displaced = entries.push(
            session_id.to_string(),
            SessionEntry {
                context,
                last_touched: now,
            },
        );

        // `push` hands back the old value when the key already existed
        let evicted = match displaced {
            Some((key, _)) if key != session_id => {
                debug!(evicted_session = %key, "Session evicted at capacity");
                1
            }
            _ => 0,
        };

        metrics::record_sessions(entries.len(), evicted);
    }

    /// Drop every idle-expired session, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }

    async fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().await;

        let stale: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_touched) > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            entries.pop(key);
        }

        metrics::record_sessions(entries.len(), stale.len());
        stale.len()
    }

    /// Number of sessions currently held
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
