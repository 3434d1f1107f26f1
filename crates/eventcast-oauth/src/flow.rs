//! Interactive authorization-code flow.
//!
//! One [`AuthorizationFlowController::authenticate`] call walks
//! `Idle -> AwaitingCallback -> Exchanging -> Completed | Failed`:
//! build the consent URL, claim the callback port, show the URL and try
//! to open a browser, wait for the redirect, exchange the code and save
//! the resulting token set.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::browser::{SharedBrowser, SystemBrowser};
use crate::callback::{CallbackListener, CallbackOutcome};
use crate::credentials::{ClientIdentity, CredentialStore};
use crate::error::{OAuthError, Result};
use crate::oauth::{PkceChallenge, build_authorization_url, exchange_code_for_tokens, generate_state};
use crate::settings::OAuthSettings;
use crate::tokens::TokenSet;

/// Receives the consent URL before the browser is launched.
pub type UrlHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Where the controller is in the current (or last) authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingCallback,
    Exchanging,
    Completed,
    Failed,
}

/// Anything that can produce a fresh token set interactively.
#[async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Run the full consent flow and return the persisted token set.
    async fn authenticate(&self) -> Result<TokenSet>;
}

/// Drives the browser-based authorization-code flow.
pub struct AuthorizationFlowController {
    store: Arc<CredentialStore>,
    settings: OAuthSettings,
    http: reqwest::Client,
    browser: SharedBrowser,
    url_handler: Option<UrlHandler>,
    session: tokio::sync::Mutex<()>,
    state: Mutex<FlowState>,
}

impl std::fmt::Debug for AuthorizationFlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationFlowController")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .field("browser", &self.browser)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl AuthorizationFlowController {
    pub fn new(store: Arc<CredentialStore>, settings: OAuthSettings) -> Self {
        Self {
            store,
            settings,
            http: reqwest::Client::new(),
            browser: Arc::new(SystemBrowser),
            url_handler: None,
            session: tokio::sync::Mutex::new(()),
            state: Mutex::new(FlowState::Idle),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_browser(mut self, browser: SharedBrowser) -> Self {
        self.browser = browser;
        self
    }

    /// Show the consent URL through `handler` instead of the log.
    pub fn with_url_handler(mut self, handler: UrlHandler) -> Self {
        self.url_handler = Some(handler);
        self
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    pub fn state(&self) -> FlowState {
        *self.state.lock()
    }

    fn transition(&self, next: FlowState) {
        let mut state = self.state.lock();
        tracing::debug!(from = ?*state, to = ?next, "Authorization flow transition");
        *state = next;
    }

    /// Run the consent flow once.
    ///
    /// Fails fast if the client identity cannot be loaded. A second call
    /// while one is waiting for its callback is rejected with
    /// [`OAuthError::AuthorizationInProgress`].
    pub async fn authenticate(&self) -> Result<TokenSet> {
        let identity = self.store.load_client_identity()?;

        let _session = self
            .session
            .try_lock()
            .map_err(|_| OAuthError::AuthorizationInProgress)?;

        self.transition(FlowState::Idle);
        let result = self.run(&identity).await;
        match &result {
            Ok(_) => self.transition(FlowState::Completed),
            Err(e) => {
                tracing::warn!(error = %e, "Authorization flow failed");
                self.transition(FlowState::Failed);
            }
        }
        result
    }

    async fn run(&self, identity: &ClientIdentity) -> Result<TokenSet> {
        let endpoints = self.settings.endpoints_for(identity);
        let redirect_uri =
            loopback_redirect_uri(&identity.redirect_uri, self.settings.callback_port);
        let pkce = PkceChallenge::generate();
        let csrf_state = generate_state();

        let auth_url = build_authorization_url(
            &endpoints,
            &identity.client_id,
            &redirect_uri,
            &pkce.challenge,
            &csrf_state,
        );

        let listener = CallbackListener::new(self.settings.callback_port)
            .with_timeout(self.settings.callback_timeout)
            .with_expected_state(csrf_state)
            .bind()
            .await?;

        self.present(&auth_url);
        self.transition(FlowState::AwaitingCallback);

        let code = match listener.wait().await? {
            CallbackOutcome::Code(code) => code,
            CallbackOutcome::ProviderError { error, description } => {
                return Err(OAuthError::ProviderDenied { error, description });
            }
            CallbackOutcome::TimedOut => {
                return Err(OAuthError::AuthorizationTimeout {
                    timeout_secs: self.settings.callback_timeout.as_secs(),
                });
            }
            CallbackOutcome::PortInUse { port } => return Err(OAuthError::PortInUse { port }),
        };

        self.transition(FlowState::Exchanging);
        let tokens = exchange_code_for_tokens(
            &self.http,
            &endpoints,
            identity,
            &code,
            &pkce.verifier,
            &redirect_uri,
        )
        .await?;

        self.store.save_token_set(&tokens)?;
        Ok(tokens)
    }

    fn present(&self, auth_url: &str) {
        match &self.url_handler {
            Some(handler) => handler(auth_url),
            None => tracing::info!(url = %auth_url, "Open this URL to authorize"),
        }

        if let Err(e) = self.browser.open(auth_url) {
            tracing::warn!(error = %e, "Could not open a browser; use the URL above");
        }
    }
}

#[async_trait]
impl Authenticator for AuthorizationFlowController {
    async fn authenticate(&self) -> Result<TokenSet> {
        AuthorizationFlowController::authenticate(self).await
    }
}

/// Point the registered redirect URI at the local callback port.
///
/// Loopback redirects (`localhost`, `127.0.0.1`) keep their host and path.
/// `[::1]` becomes `127.0.0.1` since the callback listener binds IPv4 only.
/// Anything else is replaced by `http://localhost:<port>/`.
pub fn loopback_redirect_uri(registered: &str, port: u16) -> String {
    let fallback = format!("http://localhost:{port}/");

    let Ok(mut url) = Url::parse(registered) else {
        tracing::warn!(redirect_uri = %registered, "Unparseable redirect URI, using {fallback}");
        return fallback;
    };

    let is_loopback = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );
    if url.scheme() != "http" || !is_loopback {
        tracing::warn!(redirect_uri = %registered, "Redirect URI is not a loopback address, using {fallback}");
        return fallback;
    }

    if url.host_str() == Some("[::1]") && url.set_host(Some("127.0.0.1")).is_err() {
        return fallback;
    }
    if url.set_port(Some(port)).is_err() {
        return fallback;
    }
    url.to_string()
}
