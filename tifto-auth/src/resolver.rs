//! Bearer token resolution.
//!
//! Sources are tried in a fixed order:
//!
//! 1. a fresh token minted by the identity provider for the active session,
//! 2. the provider token persisted at sign-in,
//! 3. the token inside the persisted backend login record.
//!
//! Every failure falls through to the next source. Each successful
//! resolution is written to the shared [`TokenCache`].

use crate::{
    AuthError, BackendSession, IdentityProvider, KeyValueStore, NoIdentityProvider, Result,
    StorageKeys, TokenCache,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a single identity-provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything that can produce a bearer token for an outgoing operation.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Resolve the best available token. Never fails; `None` means anonymous.
    async fn resolve(&self) -> Option<String>;

    /// The last resolved token, without touching storage or the provider.
    fn cached(&self) -> Option<String>;
}

/// A fixed token (or none). Useful for tooling and service accounts.
///
/// ```
/// use tifto_auth::{StaticToken, TokenSource};
///
/// # tokio_test::block_on(async {
/// let token = StaticToken::new("service-account");
/// assert_eq!(token.resolve().await.as_deref(), Some("service-account"));
/// assert_eq!(StaticToken::anonymous().resolve().await, None);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn resolve(&self) -> Option<String> {
        self.0.clone()
    }

    fn cached(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Resolves tokens from the provider and persisted records.
#[derive(Clone)]
pub struct TokenResolver {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn KeyValueStore>,
    cache: TokenCache,
    keys: StorageKeys,
    provider_timeout: Duration,
}

impl TokenResolver {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            provider: Arc::new(NoIdentityProvider),
            store,
            cache: TokenCache::new(),
            keys: StorageKeys::default(),
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_keys(mut self, keys: StorageKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Share an existing cache (e.g. one owned by the transport layer).
    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Resolve the best available token, caching the result.
    pub async fn resolve_token(&self) -> Option<String> {
        match self.live_provider_token().await {
            Ok(Some(token)) => return Some(self.remember(token)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Unable to retrieve identity provider token"),
        }

        match self.stored_provider_token().await {
            Ok(Some(token)) => return Some(self.remember(token)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Unable to read stored provider token"),
        }

        match self.stored_backend_token().await {
            Ok(Some(token)) => return Some(self.remember(token)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Unable to read stored backend token"),
        }

        debug!("No bearer token available");
        self.cache.clear();
        None
    }

    /// Persist the record returned by the backend login mutation.
    pub async fn store_backend_session(&self, session: &BackendSession) -> Result<()> {
        let raw = serde_json::to_string(session)?;
        self.store.set(&self.keys.backend_session, raw).await?;
        if let Some(token) = session.bearer() {
            self.cache.set(Some(token.to_string()));
        }
        Ok(())
    }

    /// Persist a token issued by the identity provider at sign-in.
    pub async fn store_provider_token(&self, token: &str) -> Result<()> {
        self.store
            .set(&self.keys.provider_token, token.to_string())
            .await?;
        self.cache.set(Some(token.to_string()));
        Ok(())
    }

    /// Forget every persisted token and the cached one.
    ///
    /// The provider's own session is owned by the caller and must be ended
    /// there, otherwise the next resolution mints a new token from it.
    pub async fn sign_out(&self) -> Result<()> {
        self.cache.clear();
        let backend = self.store.remove(&self.keys.backend_session).await;
        let provider = self.store.remove(&self.keys.provider_token).await;
        backend.and(provider)
    }

    fn remember(&self, token: String) -> String {
        self.cache.set(Some(token.clone()));
        token
    }

    async fn live_provider_token(&self) -> Result<Option<String>> {
        let token = tokio::time::timeout(self.provider_timeout, self.mint_provider_token())
            .await
            .map_err(|_| AuthError::Timeout)??;
        Ok(token.filter(|t| !t.is_empty()))
    }

    async fn mint_provider_token(&self) -> Result<Option<String>> {
        match self.provider.current_user().await? {
            Some(user) => self.provider.id_token(&user).await.map(Some),
            None => Ok(None),
        }
    }

    async fn stored_provider_token(&self) -> Result<Option<String>> {
        let token = self.store.get(&self.keys.provider_token).await?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    async fn stored_backend_token(&self) -> Result<Option<String>> {
        let Some(raw) = self.store.get(&self.keys.backend_session).await? else {
            return Ok(None);
        };

        match BackendSession::parse(&raw) {
            Some(session) => Ok(session.bearer().map(str::to_string)),
            None => {
                debug!(key = %self.keys.backend_session, "Ignoring malformed backend session record");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TokenSource for TokenResolver {
    async fn resolve(&self) -> Option<String> {
        self.resolve_token().await
    }

    fn cached(&self) -> Option<String> {
        self.cache.get()
    }
}
