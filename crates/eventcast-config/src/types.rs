//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [oauth]                  # consent flow and token refresh
//! [logging]                # CLI console and file logging
//! ```

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default local port for the OAuth redirect.
pub const DEFAULT_CALLBACK_PORT: u16 = 8085;

/// Default time allowed for finishing consent, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default refresh buffer before token expiry, in seconds.
pub const DEFAULT_REFRESH_BUFFER_SECS: u64 = 300;

/// Default OAuth scope.
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventcastConfig {
    /// OAuth configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthConfig>,

    /// Logging configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

impl EventcastConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: EventcastConfig) {
        if other.oauth.is_some() {
            self.oauth = other.oauth;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Effective OAuth settings (defaults when the section is absent).
    pub fn oauth(&self) -> OAuthConfig {
        self.oauth.clone().unwrap_or_default()
    }

    /// Effective logging settings (defaults when the section is absent).
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OAuth Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// OAuth configuration section.
///
/// ```toml
/// [oauth]
/// callback_port = 8085
/// timeout_secs = 300
/// refresh_buffer_secs = 300
/// auto_reauthenticate = false
/// open_browser = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Local port the provider redirects to.
    pub callback_port: u16,

    /// Seconds the user has to finish consent.
    pub timeout_secs: u64,

    /// Tokens closer than this many seconds to expiry are refreshed.
    pub refresh_buffer_secs: u64,

    /// Run the browser flow when tokens are missing or refresh fails.
    ///
    /// Off by default so unattended runs fail instead of waiting on a browser.
    pub auto_reauthenticate: bool,

    /// Try to open the system browser during login.
    pub open_browser: bool,

    /// Scope requested during consent.
    pub scope: String,

    /// Override for the authorization endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,

    /// Override for the token endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            callback_port: DEFAULT_CALLBACK_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
            auto_reauthenticate: false,
            open_browser: true,
            scope: DEFAULT_SCOPE.to_string(),
            authorize_url: None,
            token_url: None,
        }
    }
}

impl OAuthConfig {
    /// Reject values that would make the flow unusable.
    pub fn validate(&self) -> Result<()> {
        if self.callback_port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "oauth.callback_port".to_string(),
                reason: "must be a fixed port registered with the provider".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "oauth.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.scope.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "oauth.scope".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console filter directive (e.g. `"debug"` or `"eventcast_oauth=trace"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Write JSON logs under `<config_dir>/logs`.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            file: true,
        }
    }
}
