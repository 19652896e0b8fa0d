//! Fetch policies and the in-memory response cache.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::{GraphQLRequest, GraphQLResponse};

/// How a request interacts with the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Serve a fresh cached response, otherwise fetch and store.
    #[default]
    CacheFirst,
    /// Fetch and store; callers may show the cached response meanwhile.
    CacheAndNetwork,
    /// Always fetch, store the result.
    NetworkOnly,
    /// Always fetch, never store.
    NoCache,
    /// Serve from cache only, never fetch.
    CacheOnly,
}

impl FetchPolicy {
    /// Whether a cached response may be shown for this policy.
    pub fn reads_cache(&self) -> bool {
        matches!(self, Self::CacheFirst | Self::CacheAndNetwork | Self::CacheOnly)
    }

    /// Whether a network result is written back.
    pub fn writes_cache(&self) -> bool {
        matches!(self, Self::CacheFirst | Self::CacheAndNetwork | Self::NetworkOnly)
    }

    /// Policy for refetches and poll ticks of a query run under `self`.
    /// These always reach the network; only `NoCache` keeps them out of the cache.
    pub fn refetch_policy(&self) -> FetchPolicy {
        match self {
            Self::NoCache => Self::NoCache,
            _ => Self::NetworkOnly,
        }
    }
}

struct Entry {
    stored_at: Instant,
    response: GraphQLResponse<Value>,
}

/// Responses keyed by `(query, operationName, variables)`.
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A fresh entry for `request`, if any. Expired entries are evicted.
    pub fn get(&self, request: &GraphQLRequest) -> Option<GraphQLResponse<Value>> {
        let key = request.cache_key();
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.response.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a response. Responses with GraphQL errors or without data are skipped.
    pub fn put(&self, request: &GraphQLRequest, response: &GraphQLResponse<Value>) {
        if response.has_errors() || response.data.is_none() {
            return;
        }
        self.entries.lock().insert(
            request.cache_key(),
            Entry {
                stored_at: Instant::now(),
                response: response.clone(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}
