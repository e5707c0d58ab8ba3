use crate::error::AuthflowError;
use crate::oauth::authorize::{build_authorization_url, validate_client_id};
use crate::oauth::callback::{validate_callback, CallbackListener};
use crate::oauth::credentials::{load_credentials, save_credentials};
use crate::oauth::discovery::discover_endpoints;
use crate::oauth::pkce::generate_pkce;
use crate::oauth::token::{exchange_code, refresh_token, TokenSet};
use crate::settings::Settings;

/// Obtain a currently valid access token, optionally forcing a fresh
/// browser login.
///
/// Stored credentials are used when still valid (no network traffic on that
/// path). An expired token with a refresh token gets one refresh attempt;
/// any refresh failure falls back to the browser flow. Stage-specific errors
/// from the browser flow are logged here and reported as a single terminal
/// failure.
pub async fn obtain_access_token(
    settings: &Settings,
    force_reauth: bool,
) -> Result<String, AuthflowError> {
    if !force_reauth {
        if let Some(creds) = load_credentials(&settings.credentials_path) {
            let token_set = creds.token_set;
            let validation = token_set.validate();

            if validation.is_valid {
                tracing::debug!("using stored access token");
                return Ok(token_set.access_token);
            }

            if validation.needs_refresh {
                // needs_refresh implies the refresh token is present.
                let refresh_tok = token_set.refresh_token.as_deref().unwrap_or_default();
                match try_refresh(settings, refresh_tok).await {
                    Ok(fresh) => return Ok(fresh.access_token),
                    Err(e) => {
                        tracing::warn!(code = e.code(), "token refresh failed, falling back to browser login: {e}");
                    }
                }
            }
        }
    }

    match authenticate(settings).await {
        Ok(token_set) => Ok(token_set.access_token),
        Err(e) => {
            tracing::warn!(code = e.code(), "browser authentication failed: {e}");
            Err(AuthflowError::AuthenticationFailed)
        }
    }
}

async fn try_refresh(settings: &Settings, refresh_tok: &str) -> Result<TokenSet, AuthflowError> {
    let endpoints = discover_endpoints(&settings.oauth_host).await?;
    let fresh = refresh_token(&endpoints.token_endpoint, refresh_tok, &settings.client_id).await?;
    save_credentials(&settings.credentials_path, &fresh)?;
    tracing::debug!("token refreshed");
    Ok(fresh)
}

/// Run the full browser authentication flow: PKCE material, endpoint
/// discovery, authorization URL, browser open, callback wait, state
/// validation, code exchange. The token set is persisted before it is
/// returned.
async fn authenticate(settings: &Settings) -> Result<TokenSet, AuthflowError> {
    validate_client_id(&settings.client_id)?;

    let pkce = generate_pkce();
    let endpoints = discover_endpoints(&settings.oauth_host).await?;

    let listener = CallbackListener::bind().await?;
    let redirect_uri = listener.redirect_uri();
    tracing::debug!(port = listener.port(), "callback listener bound");

    let auth_url = build_authorization_url(
        &endpoints.authorization_endpoint,
        &settings.client_id,
        &redirect_uri,
        &pkce,
    )?;

    // Fire-and-forget: the callback wait below is the synchronization point.
    if webbrowser::open(&auth_url).is_err() {
        tracing::warn!("could not open a browser automatically; please visit:\n{auth_url}");
    }

    let result = listener.wait_for_callback(settings.auth_timeout).await?;
    let code = validate_callback(&result, &pkce.state)?;

    let token_set = exchange_code(
        &endpoints.token_endpoint,
        &code,
        &pkce.verifier,
        &redirect_uri,
        &settings.client_id,
    )
    .await?;
    save_credentials(&settings.credentials_path, &token_set)?;

    Ok(token_set)
}
