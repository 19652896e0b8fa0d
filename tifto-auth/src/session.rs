// Persisted session records and their storage keys

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default application namespace for persisted keys.
pub const DEFAULT_APP_NAME: &str = "tifto-admin";

/// Namespaced storage keys for the two persisted token sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Key of the backend login record (`user-<app>`).
    pub backend_session: String,
    /// Key of the raw identity-provider token (`firebase-<app>`).
    pub provider_token: String,
}

impl StorageKeys {
    pub fn for_app(app_name: &str) -> Self {
        Self {
            backend_session: format!("user-{}", app_name),
            provider_token: format!("firebase-{}", app_name),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::for_app(DEFAULT_APP_NAME)
    }
}

/// Backend login record: the token plus whatever profile the login
/// mutation returned. Profile fields are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl BackendSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            profile: Map::new(),
        }
    }

    /// Attach a profile field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.profile.insert(key.into(), value.into());
        self
    }

    /// Parse a stored record. Anything unparseable is treated as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    /// The token, if present and non-empty.
    pub fn bearer(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}
