//! CLI command handlers.

pub mod auth;
pub mod config;

use std::path::Path;
use std::time::Duration;

use eventcast_config::{LoadedConfig, OAuthConfig};
use eventcast_oauth::{CredentialStore, OAuthSettings};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Merged configuration and the directory it was found in.
    pub loaded: LoadedConfig,
}

impl Context {
    /// Per-user config directory (credentials, tokens, logs).
    pub fn config_dir(&self) -> &Path {
        &self.loaded.config_dir
    }

    /// Effective `[oauth]` section.
    pub fn oauth_config(&self) -> OAuthConfig {
        self.loaded.config.oauth()
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.config_dir())
    }

    /// Library settings from the `[oauth]` section.
    pub fn oauth_settings(&self) -> anyhow::Result<OAuthSettings> {
        let oauth = self.oauth_config();
        oauth.validate()?;

        let mut settings = OAuthSettings::new()
            .with_callback_port(oauth.callback_port)
            .with_callback_timeout(Duration::from_secs(oauth.timeout_secs))
            .with_refresh_buffer(Duration::from_secs(oauth.refresh_buffer_secs))
            .with_scope(oauth.scope);
        if let Some(url) = oauth.authorize_url {
            settings = settings.with_authorize_url(url);
        }
        if let Some(url) = oauth.token_url {
            settings = settings.with_token_url(url);
        }
        Ok(settings)
    }
}
