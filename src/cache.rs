//! Registration cache: rate ids this client has already posted to the service.
//!
//! The cache lets the convenience acquisition path skip re-registering a rule on every call.
//! It is an optimization, not a source of truth:
//! - ids are added only after the service confirmed a registration;
//! - ids are never evicted, not even after the rule is deleted server-side;
//! - no lock is held across a network call, so two callers racing on a new id may both
//!   register it. The service treats repeated registration idempotently.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Set of registered rate ids (injectable into [`RateLimiterClient`](crate::RateLimiterClient)).
pub trait RegistrationCache: Send + Sync + std::fmt::Debug {
    /// Whether `id` has been registered through this client.
    fn contains(&self, id: &str) -> bool;
    /// Record a confirmed registration of `id`.
    fn mark_registered(&self, id: &str);
    /// Forget every id.
    fn clear(&self);
    /// Registered ids, sorted.
    fn snapshot(&self) -> Vec<String>;
}

/// In-memory implementation backed by an RwLock.
#[derive(Default, Clone, Debug)]
pub struct InMemoryRegistrationCache {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryRegistrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with ids known to exist on the service.
    pub fn seeded<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = ids.into_iter().map(Into::into).collect();
        Self { inner: Arc::new(RwLock::new(set)) }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegistrationCache for InMemoryRegistrationCache {
    fn contains(&self, id: &str) -> bool {
        // A poisoned lock still holds a usable set; membership never depends on a half-done write.
        self.inner.read().unwrap_or_else(|e| e.into_inner()).contains(id)
    }

    fn mark_registered(&self, id: &str) {
        let inserted = self.inner.write().unwrap_or_else(|e| e.into_inner()).insert(id.to_string());
        if inserted {
            debug!(target: "ratelimiter_client::cache", id = %id, "rate id registered");
        }
    }

    fn clear(&self) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn snapshot(&self) -> Vec<String> {
        let set = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = set.iter().cloned().collect();
        ids.sort();
        ids
    }
}
