use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Username -> login instant. Sessions expire after `ttl`.
#[derive(Debug)]
pub struct SessionRegistry {
    inner: DashMap<String, Instant>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    /// Record a session for `username` if `verify` accepts the credentials.
    /// Logging in again refreshes the session. Expired sessions of other
    /// users are dropped on the way.
    pub fn login<F>(&self, username: &str, password: &str, verify: F) -> StoreResult<()>
    where
        F: FnOnce(&str, &str) -> bool,
    {
        if !verify(username, password) {
            return Err(StoreError::Unauthorized);
        }
        self.prune_expired();
        self.inner.insert(username.to_string(), Instant::now());
        debug!(username, "session started");
        Ok(())
    }

    pub fn logout(&self, username: &str) -> StoreResult<()> {
        let (_, logged_in_at) = self.inner.remove(username).ok_or(StoreError::NotFound)?;
        if self.is_expired(logged_in_at) {
            return Err(StoreError::NotFound);
        }
        debug!(username, "session ended");
        Ok(())
    }

    pub fn is_logged_in(&self, username: &str) -> bool {
        self.inner
            .get(username)
            .is_some_and(|entry| !self.is_expired(*entry.value()))
    }

    /// Drop any session for `username` without reporting whether one existed.
    pub fn end(&self, username: &str) {
        self.inner.remove(username);
    }

    pub fn active_count(&self) -> usize {
        self.inner
            .iter()
            .filter(|entry| !self.is_expired(*entry.value()))
            .count()
    }

    fn prune_expired(&self) {
        let before = self.inner.len();
        self.inner.retain(|_, logged_in_at| !self.is_expired(*logged_in_at));
        let pruned = before.saturating_sub(self.inner.len());
        if pruned > 0 {
            debug!(pruned, "expired sessions dropped");
        }
    }

    fn is_expired(&self, logged_in_at: Instant) -> bool {
        logged_in_at.elapsed() >= self.ttl
    }
}
