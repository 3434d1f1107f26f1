//! Error types for the OAuth lifecycle.

use std::path::PathBuf;

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur while acquiring, refreshing or storing credentials.
///
/// Every variant is terminal for the operation that produced it; callers
/// decide whether to re-run the interactive flow.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The OAuth client credential file does not exist.
    #[error("OAuth client credentials not found at {}", .path.display())]
    CredentialsNotFound { path: PathBuf },

    /// The OAuth client credential file exists but cannot be used.
    #[error("OAuth client credentials at {} are malformed: {reason}", .path.display())]
    CredentialsMalformed { path: PathBuf, reason: String },

    /// No token set is stored and interactive authentication was not allowed.
    #[error("Not authenticated (no tokens at {})", .token_path.display())]
    NotAuthenticated { token_path: PathBuf },

    /// The callback port is held by another process.
    #[error("Callback port {port} is already in use")]
    PortInUse { port: u16 },

    /// The user did not finish consent before the listener gave up.
    #[error("Authorization was not completed within {timeout_secs} seconds")]
    AuthorizationTimeout { timeout_secs: u64 },

    /// The provider redirected back with an error (usually `access_denied`).
    #[error("Authorization denied by provider: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    /// Exchanging the authorization code for tokens failed.
    #[error("Code exchange failed: {0}")]
    CodeExchangeFailed(String),

    /// The refresh token was rejected, revoked or missing.
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Another `authenticate()` call is already waiting for a callback.
    #[error("An authorization flow is already in progress")]
    AuthorizationInProgress,

    /// Network/HTTP error outside of a grant exchange.
    #[error("Network error: {0}")]
    Network(String),

    /// Reading or writing the token file failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Socket or process I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl OAuthError {
    /// Human-readable next step for the user, if there is one.
    pub fn remediation(&self) -> Option<String> {
        match self {
            OAuthError::CredentialsNotFound { path } => Some(format!(
                "Create an OAuth client (type \"Desktop app\") in the Google Cloud console, \
                 download its JSON and save it as {}",
                path.display()
            )),
            OAuthError::CredentialsMalformed { path, .. } => Some(format!(
                "Re-download the OAuth client JSON and replace {}",
                path.display()
            )),
            OAuthError::NotAuthenticated { .. } | OAuthError::TokenRefreshFailed(_) => {
                Some("Run 'eventcast auth login' to re-run interactive setup".to_string())
            }
            OAuthError::PortInUse { port } => Some(format!(
                "Stop the process listening on port {port} or set [oauth].callback_port"
            )),
            OAuthError::AuthorizationTimeout { .. } => {
                Some("Run 'eventcast auth login' again and finish consent in the browser".to_string())
            }
            OAuthError::AuthorizationInProgress => {
                Some("Finish or wait out the running authorization first".to_string())
            }
            _ => None,
        }
    }

    /// Whether simply trying the same operation again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OAuthError::AuthorizationTimeout { .. } | OAuthError::Network(_)
        )
    }
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for OAuthError {
    fn from(e: serde_json::Error) -> Self {
        OAuthError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_denied_display() {
        let err = OAuthError::ProviderDenied {
            error: "access_denied".to_string(),
            description: Some("user said no".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Authorization denied by provider: access_denied (user said no)"
        );

        let bare = OAuthError::ProviderDenied {
            error: "access_denied".to_string(),
            description: None,
        };
        assert_eq!(bare.to_string(), "Authorization denied by provider: access_denied");
    }

    #[test]
    fn test_remediation_mentions_paths() {
        let err = OAuthError::CredentialsNotFound {
            path: PathBuf::from("/tmp/eventcast/credentials.json"),
        };
        assert!(err.remediation().unwrap().contains("/tmp/eventcast/credentials.json"));

        let err = OAuthError::TokenRefreshFailed("invalid_grant".to_string());
        assert!(err.remediation().unwrap().contains("auth login"));

        assert!(OAuthError::Config("x".to_string()).remediation().is_none());
    }

    #[test]
    fn test_retryable() {
        assert!(OAuthError::AuthorizationTimeout { timeout_secs: 300 }.is_retryable());
        assert!(!OAuthError::PortInUse { port: 8085 }.is_retryable());
        assert!(
            !OAuthError::ProviderDenied {
                error: "access_denied".to_string(),
                description: None
            }
            .is_retryable()
        );
    }
}
