use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuthflowError;
use crate::oauth::authorize::validate_client_id;

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// One set of tokens issued by the provider. Immutable once constructed;
/// refreshing produces a new value. Provider fields the engine does not
/// model are kept in `extra` so they survive persistence round-trips.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Absolute expiry in epoch seconds, derived locally from `expires_in`
    /// at the moment the provider response is processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Derived view of a token set's usability. Computed on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenValidation {
    pub is_valid: bool,
    pub is_expired: bool,
    pub needs_refresh: bool,
    pub has_refresh_token: bool,
}

impl TokenSet {
    /// Build a token set from a provider response body, deriving the
    /// absolute expiry from the current time. A wire-supplied `expires_at`
    /// is never trusted.
    fn from_response(body: serde_json::Value) -> Result<Self, AuthflowError> {
        if let Some(error) = body.get("error").and_then(|v| v.as_str()) {
            let description = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or(error);
            return Err(AuthflowError::TokenExchange(format!(
                "{error}: {description}"
            )));
        }

        match body.get("access_token").and_then(|v| v.as_str()) {
            Some(token) if !token.is_empty() => {}
            _ => {
                return Err(AuthflowError::TokenExchange(
                    "no access token received".into(),
                ))
            }
        }

        let mut token_set: TokenSet = serde_json::from_value(body)
            .map_err(|e| AuthflowError::TokenExchange(format!("malformed token response: {e}")))?;
        token_set.expires_at = token_set
            .expires_in
            .map(|secs| chrono::Utc::now().timestamp() + secs);
        Ok(token_set)
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => chrono::Utc::now().timestamp() >= at,
            None => false,
        }
    }

    pub fn validate(&self) -> TokenValidation {
        let is_expired = self.is_expired();
        let has_refresh_token = self.refresh_token.is_some();
        TokenValidation {
            is_valid: !self.access_token.is_empty() && !is_expired,
            is_expired,
            needs_refresh: is_expired && has_refresh_token,
            has_refresh_token,
        }
    }
}

fn http_client() -> Result<reqwest::Client, AuthflowError> {
    reqwest::Client::builder()
        .timeout(EXCHANGE_TIMEOUT)
        .build()
        .map_err(|e| AuthflowError::TokenExchange(format!("failed to build HTTP client: {e}")))
}

async fn post_token_request(
    token_endpoint: &str,
    form: &[(&str, &str)],
    operation: &str,
) -> Result<TokenSet, AuthflowError> {
    let resp = http_client()?
        .post(token_endpoint)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthflowError::TokenExchange(format!("{operation} request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthflowError::TokenExchange(format!(
            "{operation} returned HTTP {status}: {body}"
        )));
    }

    let body: serde_json::Value = resp.json().await.map_err(|e| {
        AuthflowError::TokenExchange(format!("unparsable {operation} response: {e}"))
    })?;

    TokenSet::from_response(body)
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
    token_endpoint: &str,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
    client_id: &str,
) -> Result<TokenSet, AuthflowError> {
    validate_client_id(client_id)?;
    post_token_request(
        token_endpoint,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("code_verifier", code_verifier),
        ],
        "token exchange",
    )
    .await
}

/// Obtain a fresh token set using a refresh token.
pub async fn refresh_token(
    token_endpoint: &str,
    refresh_tok: &str,
    client_id: &str,
) -> Result<TokenSet, AuthflowError> {
    validate_client_id(client_id)?;
    post_token_request(
        token_endpoint,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_tok),
            ("client_id", client_id),
        ],
        "token refresh",
    )
    .await
}
