use std::time::Duration;

use serde::Deserialize;

use crate::error::AuthflowError;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolved provider endpoints, immutable for one authentication attempt.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

/// Raw well-known configuration document. Unknown fields are ignored; the
/// two required endpoints are checked explicitly so the error names what is
/// missing.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    #[serde(default)]
    authorization_endpoint: Option<String>,
    #[serde(default)]
    token_endpoint: Option<String>,
}

fn build_discovery_url(oauth_host: &str) -> String {
    format!(
        "{}/.well-known/openid-configuration",
        oauth_host.trim_end_matches('/')
    )
}

/// Fetch the provider's well-known configuration and extract the
/// authorization and token endpoints. No retries; the caller decides whether
/// to retry the whole authentication attempt.
pub async fn discover_endpoints(oauth_host: &str) -> Result<ProviderEndpoints, AuthflowError> {
    let url = build_discovery_url(oauth_host);
    let client = reqwest::Client::builder()
        .timeout(DISCOVERY_TIMEOUT)
        .build()
        .map_err(|e| AuthflowError::Discovery(format!("failed to build HTTP client: {e}")))?;

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| AuthflowError::Discovery(format!("request to {url} failed: {e}")))?;

    if !resp.status().is_success() {
        return Err(AuthflowError::Discovery(format!(
            "{url} returned status {}",
            resp.status()
        )));
    }

    let doc: DiscoveryDocument = resp
        .json()
        .await
        .map_err(|e| AuthflowError::Discovery(format!("unparsable configuration document: {e}")))?;

    let authorization_endpoint = doc.authorization_endpoint.ok_or_else(|| {
        AuthflowError::Discovery("configuration document lacks authorization_endpoint".into())
    })?;
    let token_endpoint = doc.token_endpoint.ok_or_else(|| {
        AuthflowError::Discovery("configuration document lacks token_endpoint".into())
    })?;

    Ok(ProviderEndpoints {
        authorization_endpoint,
        token_endpoint,
    })
}
