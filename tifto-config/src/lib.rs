// Transport configuration for the Tifto admin front-end
//
// Resolves the HTTP and socket origins (plus transport timeouts) from the
// environment, a `.env` file, or a JSON/TOML settings file. Nothing else
// from the admin configuration surface is exposed here.

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{
    DEFAULT_APP_NAME, DEFAULT_SERVER_REST_URL, DEFAULT_WS_SERVER_URL, TransportSettings,
    derive_http_origin, ensure_trailing_slash,
};
