//! OAuth 2.0 credential and token lifecycle for eventcast.
//!
//! Acquires user consent through a browser-driven authorization-code flow,
//! receives the redirect on a short-lived local listener, persists the
//! token set with owner-only permissions and keeps it valid across runs.
//!
//! # Components
//!
//! - [`credentials`] - client identity and token file storage
//! - [`callback`] - one-shot local redirect listener with a timeout
//! - [`oauth`] - PKCE, consent URL, code exchange and refresh grants
//! - [`flow`] - the interactive authorization state machine
//! - [`token_manager`] - "give me a usable client": refresh or re-authenticate

pub mod browser;
pub mod callback;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod oauth;
pub mod settings;
pub mod token_manager;
pub mod tokens;

pub use browser::{BrowserLauncher, NoBrowser, SharedBrowser, SystemBrowser};
pub use callback::{BoundCallbackListener, CallbackListener, CallbackOutcome, wait_for_code};
pub use credentials::{ClientIdentity, CredentialStore};
pub use error::{OAuthError, Result};
pub use flow::{AuthorizationFlowController, Authenticator, FlowState};
pub use oauth::{OAuthEndpoints, PkceChallenge};
pub use settings::{DEFAULT_CALLBACK_PORT, OAuthSettings};
pub use token_manager::{AuthenticatedClient, SharedAuthenticator, TokenInfo, TokenLifecycleManager};
pub use tokens::{TokenResponse, TokenSet};
