//! Third-party identity provider seam.

use crate::Result;
use async_trait::async_trait;

/// The provider's notion of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderUser {
    pub uid: String,
    pub email: Option<String>,
}

impl ProviderUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }
}

/// Identity provider capabilities consumed by the resolver.
///
/// Both calls are fallible and may suspend on network I/O.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently signed-in user, if a session is active.
    async fn current_user(&self) -> Result<Option<ProviderUser>>;

    /// Mint a fresh ID token for `user`.
    async fn id_token(&self, user: &ProviderUser) -> Result<String>;
}

/// Provider for deployments that authenticate only against the backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentityProvider;

#[async_trait]
impl IdentityProvider for NoIdentityProvider {
    async fn current_user(&self) -> Result<Option<ProviderUser>> {
        Ok(None)
    }

    async fn id_token(&self, _user: &ProviderUser) -> Result<String> {
        Err(crate::AuthError::Provider("no identity provider configured".to_string()))
    }
}
