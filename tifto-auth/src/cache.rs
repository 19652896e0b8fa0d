//! Process-wide cache of the last resolved token.

use parking_lot::RwLock;
use std::sync::Arc;

/// Last resolved bearer token, shared by every clone.
///
/// Writes are last-value-wins; reads take a short read lock and never wait
/// on an in-progress resolution.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().clone()
    }

    /// Store a token. `None` and empty strings both clear the cache.
    pub fn set(&self, token: Option<String>) {
        *self.inner.write() = token.filter(|t| !t.is_empty());
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().is_some()
    }
}
