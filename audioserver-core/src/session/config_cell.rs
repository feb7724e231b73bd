use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use crate::models::config::SessionConfig;

/// Atomically published `SessionConfig` snapshots.
///
/// Readers take one snapshot and use it for the whole block; writers
/// publish a complete replacement, so a reader never observes a mix of
/// old and new fields.
#[derive(Debug)]
pub struct ConfigCell {
    inner: ArcSwap<SessionConfig>,
}

impl ConfigCell {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: ArcSwap::from_pointee(config),
        }
    }

    /// Current snapshot. Lock-free; callable from the real-time thread.
    pub fn load(&self) -> Arc<SessionConfig> {
        self.inner.load_full()
    }

    /// Borrowed snapshot for the real-time thread. Dropping the guard never
    /// frees a configuration.
    pub fn peek(&self) -> Guard<Arc<SessionConfig>> {
        self.inner.load()
    }

    pub fn publish(&self, config: SessionConfig) -> Arc<SessionConfig> {
        let published = Arc::new(config);
        self.inner.store(Arc::clone(&published));
        published
    }

    /// Derive and publish a new snapshot from the current one. Concurrent
    /// updates are retried, so none is lost.
    pub fn update<F>(&self, f: F) -> Arc<SessionConfig>
    where
        F: Fn(&SessionConfig) -> SessionConfig,
    {
        let mut published = self.inner.load_full();
        self.inner.rcu(|current| {
            published = Arc::new(f(&**current));
            Arc::clone(&published)
        });
        published
    }
}
