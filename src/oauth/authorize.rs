use crate::error::AuthflowError;
use crate::oauth::pkce::PkceMaterial;

/// Scopes requested on every authentication attempt.
pub const SCOPES: [&str; 6] = [
    "openid",
    "profile",
    "email",
    "phone",
    "address",
    "offline_access",
];

/// The provider mandates UUID-shaped client identifiers. Checked before any
/// request is sent so a typo fails fast instead of mid-flow.
pub fn validate_client_id(client_id: &str) -> Result<(), AuthflowError> {
    uuid::Uuid::parse_str(client_id)
        .map(|_| ())
        .map_err(|_| AuthflowError::Validation {
            field: "client_id",
            detail: format!("expected a UUID, got {client_id:?}"),
        })
}

/// Compose the browser-facing authorization request. Pure; the only failure
/// modes are malformed inputs.
pub fn build_authorization_url(
    authorization_endpoint: &str,
    client_id: &str,
    redirect_uri: &str,
    pkce: &PkceMaterial,
) -> Result<String, AuthflowError> {
    validate_client_id(client_id)?;

    let mut url =
        reqwest::Url::parse(authorization_endpoint).map_err(|e| AuthflowError::Validation {
            field: "authorization_endpoint",
            detail: format!("{authorization_endpoint:?} is not a valid URL: {e}"),
        })?;

    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("state", &pkce.state)
        .append_pair("code_challenge", &pkce.challenge)
        .append_pair("code_challenge_method", "S256");

    Ok(url.into())
}
