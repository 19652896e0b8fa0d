//! # Tifto Auth
//!
//! Resolves the bearer token attached to every outgoing GraphQL operation.
//!
//! A token can come from three places, tried in order:
//!
//! - a fresh token minted by the identity provider for the active session
//! - the provider token persisted at sign-in (`firebase-<app>`)
//! - the backend login record persisted at sign-in (`user-<app>`)
//!
//! Resolution never fails: storage errors, provider errors and malformed
//! records fall through to the next source, and `None` is returned when
//! nothing is available.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tifto_auth::{MemoryStore, StorageKeys, TokenResolver};
//!
//! # async fn run() {
//! let resolver = TokenResolver::new(Arc::new(MemoryStore::new()))
//!     .with_keys(StorageKeys::for_app("tifto-admin"));
//!
//! match resolver.resolve_token().await {
//!     Some(token) => println!("Bearer {}", token),
//!     None => println!("anonymous"),
//! }
//! # }
//! ```

mod cache;
mod error;
mod provider;
mod resolver;
mod session;
mod store;

pub use cache::TokenCache;
pub use error::{AuthError, Result};
pub use provider::{IdentityProvider, NoIdentityProvider, ProviderUser};
pub use resolver::{DEFAULT_PROVIDER_TIMEOUT, StaticToken, TokenResolver, TokenSource};
pub use session::{BackendSession, DEFAULT_APP_NAME, StorageKeys};
pub use store::{FileStore, KeyValueStore, MemoryStore};
