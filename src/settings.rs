use std::path::PathBuf;
use std::time::Duration;

use crate::oauth::credentials::default_credentials_path;

/// Overall timeout for the browser login, covering the full callback wait.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for one authentication attempt.
///
/// Threaded explicitly through every call so the engine has no hidden
/// process-wide state and can be exercised with substituted values in tests.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the identity provider, e.g. `https://auth.example.com`.
    pub oauth_host: String,
    /// OAuth client id registered with the provider (UUID-shaped).
    pub client_id: String,
    /// How long to wait for the browser redirect before giving up.
    pub auth_timeout: Duration,
    /// Where credentials are persisted between runs.
    pub credentials_path: PathBuf,
}

impl Settings {
    pub fn new(oauth_host: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            oauth_host: oauth_host.into(),
            client_id: client_id.into(),
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            credentials_path: default_credentials_path(),
        }
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn with_credentials_path(mut self, path: PathBuf) -> Self {
        self.credentials_path = path;
        self
    }
}
