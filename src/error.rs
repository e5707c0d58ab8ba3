use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AuthflowError {
    #[error("Failed to discover provider endpoints: {0}")]
    Discovery(String),

    #[error("Timed out waiting for the browser callback after {}s", .0.as_secs())]
    CallbackTimeout(Duration),

    #[error("Browser callback completed without an authorization code")]
    CallbackEmpty,

    #[error("State parameter mismatch in callback, possible CSRF attempt")]
    StateMismatch,

    #[error("{}", format_denied(.error, .description.as_deref()))]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Invalid {field}: {detail}")]
    Validation { field: &'static str, detail: String },

    #[error("Credential store error: {0}")]
    CredentialStore(String),

    #[error("Authentication failed; no token obtained")]
    AuthenticationFailed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_denied(error: &str, description: Option<&str>) -> String {
    match description {
        Some(d) => format!("Authorization denied by provider: {error} - {d}"),
        None => format!("Authorization denied by provider: {error}"),
    }
}

impl AuthflowError {
    /// Error code string for structured output and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            AuthflowError::Discovery(_) => "discovery_error",
            AuthflowError::CallbackTimeout(_) => "callback_timeout",
            AuthflowError::CallbackEmpty => "callback_empty",
            AuthflowError::StateMismatch => "state_mismatch",
            AuthflowError::AuthorizationDenied { .. } => "authorization_denied",
            AuthflowError::TokenExchange(_) => "token_exchange_error",
            AuthflowError::Validation { .. } => "validation_error",
            AuthflowError::CredentialStore(_) => "credential_store_error",
            AuthflowError::AuthenticationFailed => "auth_failed",
            AuthflowError::Io(_) => "io_error",
        }
    }
}
