//! Client identity loading and token persistence.
//!
//! Both files live in one per-user directory. The store is the only writer
//! of the token file and keeps it readable by the owning user alone.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{OAuthError, Result};
use crate::tokens::TokenSet;

/// OAuth client credential file name within the config directory.
pub const CREDENTIALS_FILE: &str = "credentials.json";

/// Token file name within the config directory.
pub const TOKEN_FILE: &str = "tokens.json";

/// The registered OAuth client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
    /// First entry of `redirect_uris`.
    pub redirect_uri: String,
    /// Authorization endpoint advertised by the credential file, if any.
    pub auth_uri: Option<String>,
    /// Token endpoint advertised by the credential file, if any.
    pub token_uri: Option<String>,
}

/// Credential file as downloaded from the provider console.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<RawClient>,
    web: Option<RawClient>,
}

#[derive(Debug, Deserialize)]
struct RawClient {
    client_id: Option<String>,
    client_secret: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl RawClient {
    fn into_identity(self, path: &Path) -> Result<ClientIdentity> {
        let malformed = |reason: &str| OAuthError::CredentialsMalformed {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let client_id = self
            .client_id
            .filter(|v| !v.is_empty())
            .ok_or_else(|| malformed("missing client_id"))?;
        let client_secret = self
            .client_secret
            .filter(|v| !v.is_empty())
            .ok_or_else(|| malformed("missing client_secret"))?;
        let redirect_uri = self
            .redirect_uris
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| malformed("redirect_uris is missing or empty"))?;

        Ok(ClientIdentity {
            client_id,
            client_secret,
            redirect_uri,
            auth_uri: self.auth_uri,
            token_uri: self.token_uri,
        })
    }
}

/// File-backed store for the client identity and the token set.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    credentials_path: PathBuf,
    token_path: PathBuf,
}

impl CredentialStore {
    /// Store rooted at `config_dir` (`credentials.json` + `tokens.json`).
    pub fn new(config_dir: &Path) -> Self {
        Self {
            credentials_path: config_dir.join(CREDENTIALS_FILE),
            token_path: config_dir.join(TOKEN_FILE),
        }
    }

    /// Create with explicit file paths.
    pub fn with_paths(credentials_path: PathBuf, token_path: PathBuf) -> Self {
        Self {
            credentials_path,
            token_path,
        }
    }

    /// Path of the OAuth client credential file.
    pub fn client_identity_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Path of the token file.
    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Whether a token file exists.
    pub fn has_tokens(&self) -> bool {
        self.token_path.is_file()
    }

    /// Load the registered client from the credential file.
    pub fn load_client_identity(&self) -> Result<ClientIdentity> {
        let path = &self.credentials_path;
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OAuthError::CredentialsNotFound { path: path.clone() });
            }
            Err(e) => {
                return Err(OAuthError::Storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let file: CredentialsFile =
            serde_json::from_str(&content).map_err(|e| OAuthError::CredentialsMalformed {
                path: path.clone(),
                reason: format!("invalid JSON: {}", e),
            })?;

        let raw = file
            .installed
            .or(file.web)
            .ok_or_else(|| OAuthError::CredentialsMalformed {
                path: path.clone(),
                reason: "expected an \"installed\" or \"web\" object".to_string(),
            })?;

        let identity = raw.into_identity(path)?;
        tracing::debug!(path = %path.display(), client_id = %identity.client_id, "Loaded client identity");
        Ok(identity)
    }

    /// Load the stored token set, or `None` if nothing has been saved yet.
    pub fn load_token_set(&self) -> Result<Option<TokenSet>> {
        let content = match fs::read_to_string(&self.token_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OAuthError::Storage(format!(
                    "Failed to read token file: {}",
                    e
                )));
            }
        };

        let tokens: TokenSet = serde_json::from_str(&content)
            .map_err(|e| OAuthError::Serialization(format!("Failed to parse token file: {}", e)))?;

        Ok(Some(tokens))
    }

    /// Overwrite the token file with `tokens`, owner read/write only.
    ///
    /// The set is written to a fresh `0600` sibling file that is then renamed
    /// over the token file, so a pre-existing file with wider permissions
    /// never receives the new secrets.
    pub fn save_token_set(&self, tokens: &TokenSet) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                OAuthError::Storage(format!("Failed to create token directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(tokens)
            .map_err(|e| OAuthError::Serialization(format!("Failed to serialize tokens: {}", e)))?;

        let tmp_path = self.token_path.with_extension("json.tmp");
        match fs::remove_file(&tmp_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(OAuthError::Storage(format!(
                    "Failed to remove stale {}: {}",
                    tmp_path.display(),
                    e
                )));
            }
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let written = options
            .open(&tmp_path)
            .and_then(|mut file| {
                file.write_all(json.as_bytes())?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&tmp_path, &self.token_path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(OAuthError::Storage(format!(
                "Failed to write token file: {}",
                e
            )));
        }

        tracing::info!("Tokens saved to {}", self.token_path.display());
        Ok(())
    }

    /// Step-by-step instructions for provisioning the credential file.
    pub fn setup_instructions(&self) -> String {
        format!(
            "1. Open https://console.cloud.google.com/apis/credentials\n\
             2. Enable the YouTube Data API v3 for your project\n\
             3. Create an OAuth client ID of type \"Desktop app\"\n\
             4. Download the client JSON and save it as:\n   {}\n\
             5. Run 'eventcast auth login'\n\
             \n\
             Tokens will be stored in:\n   {}",
            self.credentials_path.display(),
            self.token_path.display()
        )
    }
}
