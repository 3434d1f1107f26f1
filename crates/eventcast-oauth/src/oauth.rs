//! OAuth 2.0 authorization-code flow primitives: consent URL, PKCE, grants.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::credentials::ClientIdentity;
use crate::error::{OAuthError, Result};
use crate::tokens::{TokenResponse, TokenSet};

/// Google's authorization endpoint.
pub const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope covering caption download and live broadcast management.
pub const YOUTUBE_SCOPE: &str = eventcast_config::DEFAULT_SCOPE;

/// Provider endpoints and the scope requested from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub scope: String,
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self::google()
    }
}

impl OAuthEndpoints {
    /// Google endpoints with the YouTube scope.
    pub fn google() -> Self {
        Self {
            authorize_url: GOOGLE_AUTHORIZE_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            scope: YOUTUBE_SCOPE.to_string(),
        }
    }

    /// Prefer the endpoints advertised in the client credential file.
    pub fn for_identity(identity: &ClientIdentity) -> Self {
        let mut endpoints = Self::google();
        if let Some(auth_uri) = &identity.auth_uri {
            endpoints.authorize_url = auth_uri.clone();
        }
        if let Some(token_uri) = &identity.token_uri {
            endpoints.token_url = token_uri.clone();
        }
        endpoints
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

/// PKCE code verifier and challenge pair.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge pair.
    pub fn generate() -> Self {
        let mut verifier_bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));

        Self {
            verifier,
            challenge,
        }
    }
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut state_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut state_bytes);
    URL_SAFE_NO_PAD.encode(state_bytes)
}

/// Build the consent URL.
///
/// Always requests offline access and forces the consent prompt so the
/// provider issues a refresh token even for a user who consented before.
pub fn build_authorization_url(
    endpoints: &OAuthEndpoints,
    client_id: &str,
    redirect_uri: &str,
    challenge: &str,
    state: &str,
) -> String {
    let params = [
        ("response_type", "code"),
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("scope", endpoints.scope.as_str()),
        ("access_type", "offline"),
        ("prompt", "consent"),
        ("state", state),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if endpoints.authorize_url.contains('?') {
        '&'
    } else {
        '?'
    };
    format!("{}{}{}", endpoints.authorize_url, separator, query)
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Render a failed token endpoint response as `error: description`.
async fn describe_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<TokenErrorResponse>(&body) {
        Ok(TokenErrorResponse {
            error,
            error_description: Some(description),
        }) => format!("{} ({}): {}", error, status, description),
        Ok(TokenErrorResponse { error, .. }) => format!("{} ({})", error, status),
        Err(_) if body.is_empty() => format!("HTTP {}", status),
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

/// Exchange an authorization code for a token set.
pub async fn exchange_code_for_tokens(
    http: &reqwest::Client,
    endpoints: &OAuthEndpoints,
    identity: &ClientIdentity,
    code: &str,
    verifier: &str,
    redirect_uri: &str,
) -> Result<TokenSet> {
    let response = http
        .post(&endpoints.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", identity.client_id.as_str()),
            ("client_secret", identity.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| OAuthError::CodeExchangeFailed(format!("request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(OAuthError::CodeExchangeFailed(
            describe_failure(response).await,
        ));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| OAuthError::CodeExchangeFailed(format!("unreadable response: {}", e)))?;

    if body.refresh_token.is_none() {
        tracing::warn!("Code exchange returned no refresh token; the session cannot be renewed");
    }

    Ok(TokenSet::from_response(body, &endpoints.scope, Utc::now()))
}

/// Run the refresh-token grant and return the raw response.
///
/// The caller folds the response into its stored set with
/// [`TokenSet::merge_refresh`].
pub async fn refresh_access_token(
    http: &reqwest::Client,
    endpoints: &OAuthEndpoints,
    identity: &ClientIdentity,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = http
        .post(&endpoints.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", identity.client_id.as_str()),
            ("client_secret", identity.client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| OAuthError::TokenRefreshFailed(format!("request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(OAuthError::TokenRefreshFailed(
            describe_failure(response).await,
        ));
    }

    response
        .json()
        .await
        .map_err(|e| OAuthError::TokenRefreshFailed(format!("unreadable response: {}", e)))
}
