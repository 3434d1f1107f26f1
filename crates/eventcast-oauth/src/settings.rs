//! Runtime settings shared by the flow controller and the token manager.

use std::time::Duration;

use crate::callback::DEFAULT_CALLBACK_TIMEOUT;
use crate::credentials::ClientIdentity;
use crate::oauth::{OAuthEndpoints, YOUTUBE_SCOPE};
use crate::tokens::REFRESH_BUFFER_SECS;

pub use eventcast_config::DEFAULT_CALLBACK_PORT;

/// Settings for the OAuth lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    /// Local port the redirect is received on.
    pub callback_port: u16,

    /// How long the user has to complete consent.
    pub callback_timeout: Duration,

    /// Tokens closer than this to expiry are refreshed before use.
    pub refresh_buffer: Duration,

    /// Scope requested during consent.
    pub scope: String,

    /// Overrides the authorization endpoint from the credential file.
    pub authorize_url: Option<String>,

    /// Overrides the token endpoint from the credential file.
    pub token_url: Option<String>,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            refresh_buffer: Duration::from_secs(REFRESH_BUFFER_SECS),
            scope: YOUTUBE_SCOPE.to_string(),
            authorize_url: None,
            token_url: None,
        }
    }
}

impl OAuthSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = Some(url.into());
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Resolve endpoints: explicit overrides, then the credential file, then Google.
    pub fn endpoints_for(&self, identity: &ClientIdentity) -> OAuthEndpoints {
        let mut endpoints = OAuthEndpoints::for_identity(identity).with_scope(self.scope.clone());
        if let Some(url) = &self.authorize_url {
            endpoints = endpoints.with_authorize_url(url.clone());
        }
        if let Some(url) = &self.token_url {
            endpoints = endpoints.with_token_url(url.clone());
        }
        endpoints
    }

    /// Refresh buffer as a chrono duration for expiry arithmetic.
    pub fn refresh_buffer_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.refresh_buffer)
            .unwrap_or_else(|_| chrono::Duration::seconds(REFRESH_BUFFER_SECS as i64))
    }
}
