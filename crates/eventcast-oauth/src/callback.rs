//! One-shot localhost listener for the OAuth redirect.
//!
//! [`CallbackListener::wait`] binds the callback port, serves until the first
//! qualifying redirect arrives or the timeout fires, and always shuts the
//! server down and joins it before returning. A returned outcome therefore
//! means the port is free again.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{OAuthError, Result};

/// Default time the user has to finish consent.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration =
    Duration::from_secs(eventcast_config::DEFAULT_TIMEOUT_SECS);

/// Upper bound on waiting for in-flight responses after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>eventcast</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Authentication successful</h2>
<p>You can close this tab and return to the terminal.</p>
</body>
</html>"#;

const FAILURE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>eventcast</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Authentication failed</h2>
<p>Authorization was not granted. Close this tab and check the terminal.</p>
</body>
</html>"#;

/// The single result of waiting for a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The provider redirected back with an authorization code.
    Code(String),
    /// The provider redirected back with an error (e.g. `access_denied`).
    ProviderError {
        error: String,
        description: Option<String>,
    },
    /// Nothing qualifying arrived before the timeout.
    TimedOut,
    /// The port was already bound by someone else.
    PortInUse { port: u16 },
}

/// Query parameters the provider may append to the redirect.
#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Shared state for the callback handler.
struct CallbackState {
    sender: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
    expected_state: Option<String>,
}

/// Waits for exactly one OAuth redirect on a local port.
#[derive(Debug, Clone)]
pub struct CallbackListener {
    port: u16,
    timeout: Duration,
    expected_state: Option<String>,
}

impl CallbackListener {
    /// Listener on `127.0.0.1:<port>` with the default timeout.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            timeout: DEFAULT_CALLBACK_TIMEOUT,
            expected_state: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ignore redirects whose `state` does not match.
    pub fn with_expected_state(mut self, state: impl Into<String>) -> Self {
        self.expected_state = Some(state.into());
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind, wait for the first qualifying redirect or the timeout, release.
    ///
    /// Bind failures other than "address in use" are returned as errors.
    pub async fn wait(self) -> Result<CallbackOutcome> {
        match self.bind().await {
            Ok(bound) => bound.wait().await,
            Err(OAuthError::PortInUse { port }) => Ok(CallbackOutcome::PortInUse { port }),
            Err(e) => Err(e),
        }
    }

    /// Claim the port without serving yet.
    ///
    /// Fails with [`OAuthError::PortInUse`] when the port is taken. Dropping
    /// the returned handle releases the port.
    pub async fn bind(self) -> Result<BoundCallbackListener> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::warn!(port = self.port, "OAuth callback port already in use");
                return Err(OAuthError::PortInUse { port: self.port });
            }
            Err(e) => return Err(OAuthError::Io(e)),
        };

        Ok(BoundCallbackListener {
            listener,
            port: self.port,
            timeout: self.timeout,
            expected_state: self.expected_state,
        })
    }
}

/// A callback listener that holds its port.
#[derive(Debug)]
pub struct BoundCallbackListener {
    listener: TcpListener,
    port: u16,
    timeout: Duration,
    expected_state: Option<String>,
}

impl BoundCallbackListener {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the first qualifying redirect or the timeout, then release.
    ///
    /// Never returns [`CallbackOutcome::PortInUse`].
    pub async fn wait(self) -> Result<CallbackOutcome> {
        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = callback_router(Arc::new(CallbackState {
            sender: Mutex::new(Some(result_tx)),
            expected_state: self.expected_state,
        }));

        tracing::debug!(
            port = self.port,
            timeout_secs = self.timeout.as_secs(),
            "OAuth callback listener started"
        );

        let listener = self.listener;
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let received = tokio::select! {
            received = result_rx => Some(received),
            _ = tokio::time::sleep(self.timeout) => None,
        };

        release(server, shutdown_tx).await;
        tracing::debug!(port = self.port, "OAuth callback listener released");

        match received {
            Some(Ok(outcome)) => Ok(outcome),
            // The handler holds the sender until it resolves; losing it means the server died.
            Some(Err(_)) => Err(OAuthError::Io(std::io::Error::other(
                "OAuth callback server stopped before a redirect arrived",
            ))),
            None => {
                tracing::info!(
                    timeout_secs = self.timeout.as_secs(),
                    "Timed out waiting for OAuth callback"
                );
                Ok(CallbackOutcome::TimedOut)
            }
        }
    }
}

/// Wait once on `port` for up to `timeout`.
pub async fn wait_for_code(port: u16, timeout: Duration) -> Result<CallbackOutcome> {
    CallbackListener::new(port).with_timeout(timeout).wait().await
}

/// Stop the server and wait until its listener is dropped.
async fn release(
    mut server: JoinHandle<std::io::Result<()>>,
    shutdown_tx: oneshot::Sender<()>,
) {
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "OAuth callback server exited with error"),
        Ok(Err(e)) => tracing::warn!(error = %e, "OAuth callback server task failed"),
        Err(_) => {
            tracing::warn!("OAuth callback server did not drain in time, aborting");
            server.abort();
            let _ = server.await;
        }
    }
}

/// Build the router: every path is routed to the callback handler.
fn callback_router(state: Arc<CallbackState>) -> Router {
    Router::new().fallback(handle_callback).with_state(state)
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let CallbackParams {
        code,
        state: returned_state,
        error,
        error_description,
    } = params;

    let (outcome, body) = match (error, code) {
        (Some(error), _) => (
            CallbackOutcome::ProviderError {
                error,
                description: error_description,
            },
            FAILURE_HTML,
        ),
        (None, Some(code)) => (CallbackOutcome::Code(code), SUCCESS_HTML),
        (None, None) => return page(StatusCode::NOT_FOUND, "Not found"),
    };

    if let Some(expected) = &state.expected_state
        && returned_state.as_deref() != Some(expected.as_str())
    {
        tracing::warn!("Ignoring OAuth callback with mismatched state");
        return page(StatusCode::BAD_REQUEST, FAILURE_HTML);
    }

    let Some(sender) = state.sender.lock().take() else {
        return page(StatusCode::OK, body);
    };

    if let CallbackOutcome::ProviderError { error, .. } = &outcome {
        tracing::info!(error = %error, "Provider returned an authorization error");
    }
    let _ = sender.send(outcome);
    page(StatusCode::OK, body)
}

fn page(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONNECTION, "close")], Html(body)).into_response()
}
