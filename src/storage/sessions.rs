// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Open transfer sessions.
//!
//! Sessions live in an LRU keyed by id. A session unused for longer than the
//! idle TTL, or pushed out by the capacity bound, is closed so its in-flight
//! estimation is cancelled.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::transfer::TransferSession;

struct SessionEntry {
    session: Arc<TransferSession>,
    last_used: Instant,
}

/// In-process registry of open sessions with LRU and idle eviction.
pub struct SessionRegistry {
    sessions: Mutex<LruCache<Uuid, SessionEntry>>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    /// - `capacity`: Max number of open sessions.
    /// - `idle_ttl`: How long a session may go unused.
    pub fn new(capacity: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            idle_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<Uuid, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new session, closing whatever it pushes out.
    pub fn insert(&self, session: Arc<TransferSession>) {
        let mut evicted = self.take_idle();
        {
            let mut sessions = self.lock();
            let entry = SessionEntry {
                session: session.clone(),
                last_used: Instant::now(),
            };
            if let Some((id, old)) = sessions.push(session.id, entry) {
                if id != session.id {
                    evicted.push(old.session);
                }
            }
        }
        close_all(evicted, "capacity");
    }

    /// Look up a session and mark it as used. Expired sessions are closed
    /// and reported as absent.
    pub fn get(&self, id: Uuid) -> Option<Arc<TransferSession>> {
        let expired = {
            let mut sessions = self.lock();
            let entry = sessions.get_mut(&id)?;
            if entry.last_used.elapsed() < self.idle_ttl {
                entry.last_used = Instant::now();
                return Some(entry.session.clone());
            }
            sessions.pop(&id)
        };
        if let Some(entry) = expired {
            close_all(vec![entry.session], "idle");
        }
        None
    }

    /// Remove a session without closing it.
    pub fn remove(&self, id: Uuid) -> Option<Arc<TransferSession>> {
        self.lock().pop(&id).map(|entry| entry.session)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every session idle for longer than the TTL. Returns how many
    /// were closed.
    pub fn evict_idle(&self) -> usize {
        let evicted = self.take_idle();
        let count = evicted.len();
        close_all(evicted, "idle");
        count
    }

    /// Least recently used entries come first, so stop at the first live one.
    fn take_idle(&self) -> Vec<Arc<TransferSession>> {
        let mut sessions = self.lock();
        let mut idle = Vec::new();
        while let Some((_, entry)) = sessions.peek_lru() {
            if entry.last_used.elapsed() < self.idle_ttl {
                break;
            }
            if let Some((_, entry)) = sessions.pop_lru() {
                idle.push(entry.session);
            }
        }
        idle
    }

    /// Sweep idle sessions every `every` until `shutdown` is cancelled.
    pub async fn run_eviction(self: Arc<Self>, every: Duration, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(every) => {},
                _ = shutdown.cancelled() => break,
            }
            let closed = self.evict_idle();
            if closed > 0 {
                info!(closed, open = self.len(), "Closed idle transfer sessions");
            }
        }
        debug!("Session eviction stopped");
    }
}

fn close_all(sessions: Vec<Arc<TransferSession>>, reason: &'static str) {
    for session in sessions {
        debug!(session_id = %session.id, reason, "Evicting transfer session");
        session.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::blockchain::retry::RetryConfig;
    use crate::blockchain::Address;
    use crate::testing::{MockTonClient, MOCK_DNS_ROOT};
    use crate::transfer::SessionSettings;

    const IDLE: Duration = Duration::from_secs(60);

    /// Give the session a resolved recipient so closing it is observable.
    async fn with_target(session: &TransferSession) {
        let literal = Address::new(0, [2; 32]).to_raw();
        session.resolver().resolve(&literal).await.unwrap();
        assert!(session.resolver().current().is_some());
    }

    fn session() -> Arc<TransferSession> {
        let settings = SessionSettings {
            dns_root: MOCK_DNS_ROOT,
            retry: RetryConfig::none(),
            debounce: Duration::from_millis(100),
        };
        Arc::new(TransferSession::new(Arc::new(MockTonClient::new()), &settings))
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_evicted_and_closed() {
        let registry = SessionRegistry::new(8, IDLE);
        let idle = session();
        let busy = session();
        with_target(&idle).await;
        registry.insert(idle.clone());
        registry.insert(busy.clone());

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(registry.get(busy.id).is_some());
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(registry.evict_idle(), 1);
        assert!(registry.get(idle.id).is_none());
        assert!(registry.get(busy.id).is_some());
        assert!(idle.resolver().current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_is_absent_on_lookup() {
        let registry = SessionRegistry::new(8, IDLE);
        let s = session();
        registry.insert(s.clone());
        tokio::time::advance(IDLE).await;
        assert!(registry.get(s.id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn capacity_pushes_out_least_recent() {
        let registry = SessionRegistry::new(2, IDLE);
        let (a, b, c) = (session(), session(), session());
        with_target(&b).await;
        registry.insert(a.clone());
        registry.insert(b.clone());
        assert!(registry.get(a.id).is_some());
        registry.insert(c.clone());

        assert_eq!(registry.len(), 2);
        assert!(registry.get(b.id).is_none());
        assert!(registry.get(a.id).is_some());
        assert!(b.resolver().current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_loop_stops_on_shutdown() {
        let registry = Arc::new(SessionRegistry::new(8, IDLE));
        let s = session();
        registry.insert(s.clone());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(registry.clone().run_eviction(IDLE, shutdown.clone()));

        tokio::time::sleep(IDLE * 2 + Duration::from_secs(1)).await;
        assert!(registry.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
