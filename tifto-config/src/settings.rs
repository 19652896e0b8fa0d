//! Transport settings resolved from the environment or a settings file.

use crate::{ConfigError, ConfigLoader, EnvLoader, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// REST origin used when no environment override is present.
pub const DEFAULT_SERVER_REST_URL: &str = "https://ftifto-backend.onrender.com";

/// Socket origin used when no environment override is present.
pub const DEFAULT_WS_SERVER_URL: &str = "wss://ftifto-backend.onrender.com";

/// Namespace for persisted session keys.
pub const DEFAULT_APP_NAME: &str = "tifto-admin";

const SERVER_URL_KEYS: &[&str] = &["NEXT_PUBLIC_SERVER_URL"];
const SERVER_REST_URL_KEYS: &[&str] = &["NEXT_PUBLIC_SERVER_REST_URL", "SERVER_REST_URL"];
const WS_SERVER_URL_KEYS: &[&str] = &[
    "NEXT_PUBLIC_WS_SERVER_URL",
    "NEXT_PUBLIC_SOCKET_URL",
    "SOCKET_URL",
];
const APP_NAME_KEYS: &[&str] = &["NEXT_PUBLIC_APP_NAME", "APP_NAME"];

/// Everything the transport core needs to know about its environment.
///
/// Deliberately narrow: two origins, a storage namespace and timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    /// HTTP origin (queries and mutations), with a trailing slash.
    pub server_url: String,
    /// Socket origin (subscriptions), with a trailing slash.
    pub ws_server_url: String,
    /// Namespace for persisted session keys.
    pub app_name: String,
    /// HTTP request timeout.
    pub request_timeout: Duration,
    /// Bound on one token resolution before falling back to the cached token.
    pub token_timeout: Duration,
    /// Socket connection (and acknowledgement) timeout.
    pub connect_timeout: Duration,
    /// Reconnection ceiling for the socket session; `None` is unbounded.
    pub reconnect_attempts: Option<u32>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            server_url: derive_http_origin(DEFAULT_SERVER_REST_URL),
            ws_server_url: ensure_trailing_slash(DEFAULT_WS_SERVER_URL),
            app_name: DEFAULT_APP_NAME.to_string(),
            request_timeout: Duration::from_secs(30),
            token_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            reconnect_attempts: None,
        }
    }
}

/// On-disk representation; every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    server_url: Option<String>,
    server_rest_url: Option<String>,
    ws_server_url: Option<String>,
    app_name: Option<String>,
    request_timeout_ms: Option<u64>,
    token_timeout_ms: Option<u64>,
    connect_timeout_ms: Option<u64>,
    reconnect_attempts: Option<u32>,
}

impl TransportSettings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_loader(&EnvLoader::default())
    }

    /// Load a `.env` file (the default one when `path` is `None`), then
    /// resolve from the environment.
    pub fn from_dotenv(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                dotenvy::from_path(path)
                    .map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                if dotenvy::dotenv().is_err() {
                    debug!("No .env file found, using process environment");
                }
            }
        }
        Ok(Self::from_env())
    }

    /// Resolve settings from any variable source.
    pub fn from_loader(env: &EnvLoader) -> Self {
        let defaults = Self::default();

        let rest_url = env
            .first_of(SERVER_REST_URL_KEYS)
            .unwrap_or_else(|| DEFAULT_SERVER_REST_URL.to_string());
        let server_url = env
            .first_of(SERVER_URL_KEYS)
            .unwrap_or_else(|| derive_http_origin(&rest_url));
        let ws_server_url = ensure_trailing_slash(
            &env.first_of(WS_SERVER_URL_KEYS)
                .unwrap_or_else(|| DEFAULT_WS_SERVER_URL.to_string()),
        );
        let app_name = env.first_of(APP_NAME_KEYS).unwrap_or(defaults.app_name);

        Self {
            server_url,
            ws_server_url,
            app_name,
            request_timeout: millis_var(env, "TIFTO_REQUEST_TIMEOUT_MS")
                .unwrap_or(defaults.request_timeout),
            token_timeout: millis_var(env, "TIFTO_TOKEN_TIMEOUT_MS")
                .unwrap_or(defaults.token_timeout),
            connect_timeout: millis_var(env, "TIFTO_CONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.connect_timeout),
            reconnect_attempts: parsed_var(env, "TIFTO_RECONNECT_ATTEMPTS"),
        }
    }

    /// Load settings from a JSON or TOML file. Missing fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file: SettingsFile = ConfigLoader::load_file(path)?;
        let defaults = Self::default();

        let server_url = match (file.server_url, file.server_rest_url) {
            (Some(url), _) => url,
            (None, Some(rest)) => derive_http_origin(&rest),
            (None, None) => defaults.server_url,
        };

        Ok(Self {
            server_url,
            ws_server_url: file
                .ws_server_url
                .map(|url| ensure_trailing_slash(&url))
                .unwrap_or(defaults.ws_server_url),
            app_name: file.app_name.unwrap_or(defaults.app_name),
            request_timeout: file
                .request_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            token_timeout: file
                .token_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.token_timeout),
            connect_timeout: file
                .connect_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_timeout),
            reconnect_attempts: file.reconnect_attempts,
        })
    }
}

fn parsed_var<T: std::str::FromStr>(env: &EnvLoader, key: &str) -> Option<T> {
    match env.load_parsed(key) {
        Ok(value) => Some(value),
        Err(e @ ConfigError::InvalidValue { .. }) => {
            warn!(error = %e, "Ignoring unparseable setting");
            None
        }
        Err(_) => None,
    }
}

fn millis_var(env: &EnvLoader, key: &str) -> Option<Duration> {
    parsed_var::<u64>(env, key).map(Duration::from_millis)
}

/// Append a trailing slash unless one is already present.
pub fn ensure_trailing_slash(value: &str) -> String {
    if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    }
}

/// Turn a REST base URL into the server origin by dropping a trailing
/// `/api` segment.
pub fn derive_http_origin(rest_url: &str) -> String {
    let trimmed = rest_url.strip_suffix('/').unwrap_or(rest_url);
    let origin = trimmed.strip_suffix("/api").unwrap_or(trimmed);
    ensure_trailing_slash(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_http_origin() {
        assert_eq!(derive_http_origin("https://h.example/api"), "https://h.example/");
        assert_eq!(derive_http_origin("https://h.example/api/"), "https://h.example/");
        assert_eq!(derive_http_origin("https://h.example"), "https://h.example/");
        assert_eq!(derive_http_origin("https://h.example/apix"), "https://h.example/apix/");
    }

    #[test]
    fn test_defaults_without_environment() {
        let settings = TransportSettings::from_loader(&EnvLoader::from_map(Vec::<(String, String)>::new()));

        assert_eq!(settings.server_url, "https://ftifto-backend.onrender.com/");
        assert_eq!(settings.ws_server_url, "wss://ftifto-backend.onrender.com/");
        assert_eq!(settings.app_name, DEFAULT_APP_NAME);
        assert!(settings.reconnect_attempts.is_none());
    }

    #[test]
    fn test_explicit_server_url_wins() {
        let env = EnvLoader::from_map([
            ("NEXT_PUBLIC_SERVER_URL", "https://graph.example/"),
            ("SERVER_REST_URL", "https://rest.example/api"),
        ]);

        assert_eq!(
            TransportSettings::from_loader(&env).server_url,
            "https://graph.example/"
        );
    }

    #[test]
    fn test_rest_url_derives_origin() {
        let env = EnvLoader::from_map([("SERVER_REST_URL", "https://rest.example/api")]);
        assert_eq!(
            TransportSettings::from_loader(&env).server_url,
            "https://rest.example/"
        );
    }

    #[test]
    fn test_socket_fallback_chain() {
        let env = EnvLoader::from_map([
            ("SOCKET_URL", "wss://third.example"),
            ("NEXT_PUBLIC_SOCKET_URL", "wss://second.example"),
        ]);
        assert_eq!(
            TransportSettings::from_loader(&env).ws_server_url,
            "wss://second.example/"
        );
    }

    #[test]
    fn test_unparseable_timeout_uses_default() {
        let env = EnvLoader::from_map([
            ("TIFTO_CONNECT_TIMEOUT_MS", "soon"),
            ("TIFTO_TOKEN_TIMEOUT_MS", "250"),
            ("TIFTO_RECONNECT_ATTEMPTS", "12"),
        ]);
        let settings = TransportSettings::from_loader(&env);

        assert_eq!(settings.connect_timeout, Duration::from_secs(30));
        assert_eq!(settings.token_timeout, Duration::from_millis(250));
        assert_eq!(settings.reconnect_attempts, Some(12));
    }
}
