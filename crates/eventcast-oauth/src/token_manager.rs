//! Token lifecycle management.
//!
//! [`TokenLifecycleManager::get_authenticated_client`] is the one call the
//! rest of the application makes: it loads the stored token set, refreshes
//! it when it is inside the refresh buffer and, if allowed, falls back to
//! the interactive flow when there is nothing usable left.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::credentials::{ClientIdentity, CredentialStore};
use crate::error::{OAuthError, Result};
use crate::flow::Authenticator;
use crate::oauth::refresh_access_token;
use crate::settings::OAuthSettings;
use crate::tokens::TokenSet;

/// Shared authenticator used for re-authentication.
pub type SharedAuthenticator = Arc<dyn Authenticator>;

/// Whether `tokens` should be refreshed at `now` given `settings`.
pub fn needs_refresh(tokens: &TokenSet, now: DateTime<Utc>, settings: &OAuthSettings) -> bool {
    tokens.needs_refresh(now, settings.refresh_buffer_delta())
}

/// Keeps the stored token set usable.
#[derive(Debug)]
pub struct TokenLifecycleManager {
    store: Arc<CredentialStore>,
    settings: OAuthSettings,
    http: reqwest::Client,
    authenticator: SharedAuthenticator,
}

impl TokenLifecycleManager {
    pub fn new(
        store: Arc<CredentialStore>,
        settings: OAuthSettings,
        authenticator: SharedAuthenticator,
    ) -> Self {
        Self {
            store,
            settings,
            http: reqwest::Client::new(),
            authenticator,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Return a client carrying a currently valid access token.
    ///
    /// Refreshes at most once. With `auto_reauthenticate` a missing token
    /// file or a rejected refresh runs the interactive flow instead of
    /// failing. Other errors, such as failing to save a refreshed set, are
    /// returned as-is.
    pub async fn get_authenticated_client(
        &self,
        auto_reauthenticate: bool,
    ) -> Result<AuthenticatedClient> {
        let identity = self.store.load_client_identity()?;

        let tokens = match self.store.load_token_set()? {
            Some(tokens) => tokens,
            None if auto_reauthenticate => {
                tracing::info!("No stored tokens, starting authorization");
                self.authenticator.authenticate().await?
            }
            None => {
                return Err(OAuthError::NotAuthenticated {
                    token_path: self.store.token_path().to_path_buf(),
                });
            }
        };

        let tokens = if needs_refresh(&tokens, Utc::now(), &self.settings) {
            match self.refresh_with(&identity, &tokens).await {
                Ok(refreshed) => refreshed,
                Err(e @ OAuthError::TokenRefreshFailed(_)) if auto_reauthenticate => {
                    tracing::warn!(error = %e, "Token refresh failed, re-authenticating");
                    self.authenticator.authenticate().await?
                }
                Err(e) => return Err(e),
            }
        } else {
            tracing::debug!(
                expires_in_secs = tokens.remaining(Utc::now()).num_seconds(),
                "Stored access token is still valid"
            );
            tokens
        };

        Ok(AuthenticatedClient {
            http: self.http.clone(),
            tokens,
        })
    }

    /// Refresh the stored token set now, regardless of its expiry.
    pub async fn refresh(&self) -> Result<TokenSet> {
        let identity = self.store.load_client_identity()?;
        let tokens = self
            .store
            .load_token_set()?
            .ok_or_else(|| OAuthError::NotAuthenticated {
                token_path: self.store.token_path().to_path_buf(),
            })?;
        self.refresh_with(&identity, &tokens).await
    }

    async fn refresh_with(&self, identity: &ClientIdentity, tokens: &TokenSet) -> Result<TokenSet> {
        let refresh_token = tokens.refresh_token.as_deref().ok_or_else(|| {
            OAuthError::TokenRefreshFailed("no refresh token stored".to_string())
        })?;

        tracing::info!("Refreshing access token");
        let endpoints = self.settings.endpoints_for(identity);
        let response = refresh_access_token(&self.http, &endpoints, identity, refresh_token).await?;

        let merged = tokens.merge_refresh(response, Utc::now());
        self.store.save_token_set(&merged)?;
        tracing::info!("Token refreshed successfully");
        Ok(merged)
    }

    /// Summary of the stored token set, if any.
    pub fn token_info(&self) -> Result<Option<TokenInfo>> {
        let now = Utc::now();
        Ok(self
            .store
            .load_token_set()?
            .map(|tokens| TokenInfo::from_tokens(&tokens, now, &self.settings)))
    }
}

/// HTTP client bound to a valid token set.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    tokens: TokenSet,
}

impl AuthenticatedClient {
    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    pub fn token_set(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).bearer_auth(&self.tokens.access_token)
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.post(url).bearer_auth(&self.tokens.access_token)
    }
}

/// Information about stored tokens for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub expires_in_secs: u64,
    pub is_expired: bool,
    pub needs_refresh: bool,
    pub scope: String,
    pub has_refresh_token: bool,
}

impl TokenInfo {
    fn from_tokens(tokens: &TokenSet, now: DateTime<Utc>, settings: &OAuthSettings) -> Self {
        let remaining = tokens.remaining(now).num_seconds();
        Self {
            expires_in_secs: remaining.max(0) as u64,
            is_expired: remaining <= 0,
            needs_refresh: needs_refresh(tokens, now, settings),
            scope: tokens.scope.clone(),
            has_refresh_token: tokens.refresh_token.is_some(),
        }
    }

    pub fn expires_in_display(&self) -> String {
        if self.is_expired {
            "Expired (will refresh on next use)".to_string()
        } else {
            let hours = self.expires_in_secs / 3600;
            let minutes = (self.expires_in_secs % 3600) / 60;
            format!("{}h {}m", hours, minutes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Counts calls and hands back a canned token set.
    #[derive(Debug, Default)]
    struct CountingAuthenticator {
        calls: AtomicUsize,
    }

    impl CountingAuthenticator {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for CountingAuthenticator {
        async fn authenticate(&self) -> Result<TokenSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(tokens_expiring_in(Duration::hours(1), "reauth_access", Some("reauth_refresh")))
        }
    }

    fn tokens_expiring_in(lifetime: Duration, access: &str, refresh: Option<&str>) -> TokenSet {
        TokenSet {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            scope: "https://www.googleapis.com/auth/youtube.force-ssl".to_string(),
            token_type: "Bearer".to_string(),
            // Stored with millisecond precision.
            expiry_date: DateTime::from_timestamp_millis((Utc::now() + lifetime).timestamp_millis())
                .unwrap(),
        }
    }

    fn setup(token_uri: &str) -> (TempDir, Arc<CredentialStore>) {
        let dir = tempdir().unwrap();
        let json = serde_json::json!({
            "installed": {
                "client_id": "test-client",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost"],
                "token_uri": token_uri,
            }
        });
        std::fs::write(dir.path().join("credentials.json"), json.to_string()).unwrap();
        let store = Arc::new(CredentialStore::new(dir.path()));
        (dir, store)
    }

    fn manager(store: Arc<CredentialStore>, auth: Arc<CountingAuthenticator>) -> TokenLifecycleManager {
        TokenLifecycleManager::new(store, OAuthSettings::default(), auth)
    }

    async fn refresh_server(body: serde_json::Value, expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fresh_token_skips_refresh() {
        let server = refresh_server(serde_json::json!({"access_token": "unused"}), 0).await;
        let (_dir, store) = setup(&format!("{}/token", server.uri()));
        let stored = tokens_expiring_in(Duration::hours(1), "stored_access", Some("stored_refresh"));
        store.save_token_set(&stored).unwrap();

        let auth = Arc::new(CountingAuthenticator::default());
        let client = manager(store, auth.clone())
            .get_authenticated_client(true)
            .await
            .unwrap();

        assert_eq!(client.access_token(), "stored_access");
        assert_eq!(client.token_set(), &stored);
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_expiring_token_refreshes_once_and_keeps_refresh_token() {
        let server = refresh_server(
            serde_json::json!({"access_token": "new_access", "expires_in": 3599}),
            1,
        )
        .await;
        let (_dir, store) = setup(&format!("{}/token", server.uri()));
        store
            .save_token_set(&tokens_expiring_in(
                Duration::minutes(2),
                "old_access",
                Some("old_refresh"),
            ))
            .unwrap();

        let auth = Arc::new(CountingAuthenticator::default());
        let client = manager(store.clone(), auth.clone())
            .get_authenticated_client(false)
            .await
            .unwrap();

        assert_eq!(client.access_token(), "new_access");
        let persisted = store.load_token_set().unwrap().unwrap();
        assert_eq!(persisted.access_token, "new_access");
        assert_eq!(persisted.refresh_token.as_deref(), Some("old_refresh"));
        assert!(persisted.remaining(Utc::now()) > Duration::minutes(55));
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes() {
        let server = refresh_server(
            serde_json::json!({"access_token": "new_access", "refresh_token": "rotated"}),
            1,
        )
        .await;
        let (_dir, store) = setup(&format!("{}/token", server.uri()));
        store
            .save_token_set(&tokens_expiring_in(
                -Duration::hours(3),
                "old_access",
                Some("old_refresh"),
            ))
            .unwrap();

        let auth = Arc::new(CountingAuthenticator::default());
        manager(store.clone(), auth)
            .get_authenticated_client(false)
            .await
            .unwrap();

        let persisted = store.load_token_set().unwrap().unwrap();
        assert_eq!(persisted.refresh_token.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn test_no_tokens_without_reauth_is_not_authenticated() {
        let server = refresh_server(serde_json::json!({"access_token": "unused"}), 0).await;
        let (_dir, store) = setup(&format!("{}/token", server.uri()));

        let auth = Arc::new(CountingAuthenticator::default());
        let err = manager(store, auth.clone())
            .get_authenticated_client(false)
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::NotAuthenticated { .. }));
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_tokens_with_reauth_runs_flow() {
        let (_dir, store) = setup("http://127.0.0.1:9/token");

        let auth = Arc::new(CountingAuthenticator::default());
        let client = manager(store, auth.clone())
            .get_authenticated_client(true)
            .await
            .unwrap();

        assert_eq!(client.access_token(), "reauth_access");
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_surfaces_without_reauth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (_dir, store) = setup(&format!("{}/token", server.uri()));
        store
            .save_token_set(&tokens_expiring_in(-Duration::minutes(1), "old", Some("revoked")))
            .unwrap();

        let auth = Arc::new(CountingAuthenticator::default());
        let err = manager(store, auth.clone())
            .get_authenticated_client(false)
            .await
            .unwrap_err();

        match &err {
            OAuthError::TokenRefreshFailed(detail) => assert!(detail.contains("invalid_grant")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.remediation().unwrap().contains("auth login"));
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_with_reauth_runs_flow() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (_dir, store) = setup(&format!("{}/token", server.uri()));
        store
            .save_token_set(&tokens_expiring_in(-Duration::minutes(1), "old", Some("revoked")))
            .unwrap();

        let auth = Arc::new(CountingAuthenticator::default());
        let client = manager(store, auth.clone())
            .get_authenticated_client(true)
            .await
            .unwrap();

        assert_eq!(client.access_token(), "reauth_access");
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_save_failure_after_refresh_does_not_reauthenticate() {
        let server = refresh_server(serde_json::json!({"access_token": "new_access"}), 1).await;
        let (dir, store) = setup(&format!("{}/token", server.uri()));
        store
            .save_token_set(&tokens_expiring_in(-Duration::minutes(1), "old", Some("r")))
            .unwrap();

        // A directory where the temporary token file goes makes the save fail
        let blocker = dir.path().join("tokens.json.tmp");
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        let auth = Arc::new(CountingAuthenticator::default());
        let err = manager(store, auth.clone())
            .get_authenticated_client(true)
            .await
            .unwrap_err();

        assert!(matches!(err, OAuthError::Storage(_)), "unexpected error: {err}");
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_is_refresh_failure() {
        let (_dir, store) = setup("http://127.0.0.1:9/token");
        store
            .save_token_set(&tokens_expiring_in(Duration::seconds(30), "old", None))
            .unwrap();

        let auth = Arc::new(CountingAuthenticator::default());
        let err = manager(store, auth)
            .get_authenticated_client(false)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::TokenRefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_fatal() {
        let dir = tempdir().unwrap();
        let store = Arc::new(CredentialStore::new(dir.path()));
        let auth = Arc::new(CountingAuthenticator::default());

        let err = manager(store, auth.clone())
            .get_authenticated_client(true)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::CredentialsNotFound { .. }));
        assert_eq!(auth.calls(), 0);
    }

    #[tokio::test]
    async fn test_client_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/liveBroadcasts"))
            .and(wiremock::matchers::header("authorization", "Bearer stored_access"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let (_dir, store) = setup(&format!("{}/token", server.uri()));
        store
            .save_token_set(&tokens_expiring_in(Duration::hours(1), "stored_access", Some("r")))
            .unwrap();

        let client = manager(store, Arc::new(CountingAuthenticator::default()))
            .get_authenticated_client(false)
            .await
            .unwrap();
        let response = client
            .get(&format!("{}/youtube/v3/liveBroadcasts", server.uri()))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    #[test]
    fn test_token_info() {
        let (_dir, store) = setup("http://127.0.0.1:9/token");
        let auth = Arc::new(CountingAuthenticator::default());
        let lifecycle = manager(store.clone(), auth);
        assert_eq!(lifecycle.token_info().unwrap(), None);

        store
            .save_token_set(&tokens_expiring_in(
                Duration::hours(2) + Duration::minutes(30) + Duration::seconds(30),
                "a",
                Some("r"),
            ))
            .unwrap();
        let info = lifecycle.token_info().unwrap().unwrap();
        assert!(!info.is_expired);
        assert!(!info.needs_refresh);
        assert!(info.has_refresh_token);
        assert_eq!(info.expires_in_display(), "2h 30m");

        store
            .save_token_set(&tokens_expiring_in(-Duration::minutes(5), "a", None))
            .unwrap();
        let info = lifecycle.token_info().unwrap().unwrap();
        assert!(info.is_expired);
        assert!(info.needs_refresh);
        assert_eq!(info.expires_in_secs, 0);
        assert_eq!(info.expires_in_display(), "Expired (will refresh on next use)");
    }
}
