//! Best-effort launch of the system browser.

use std::sync::Arc;

/// Opens the consent URL for the user.
pub trait BrowserLauncher: Send + Sync + std::fmt::Debug {
    /// Start opening `url` without waiting for the browser to exit.
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that_detached(url)
    }
}

/// Never opens anything; the user follows the printed URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBrowser;

impl BrowserLauncher for NoBrowser {
    fn open(&self, _url: &str) -> std::io::Result<()> {
        tracing::debug!("Browser launch disabled");
        Ok(())
    }
}

/// Shared browser launcher.
pub type SharedBrowser = Arc<dyn BrowserLauncher>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_browser_is_not_a_failure() {
        assert!(NoBrowser.open("https://accounts.example.test/auth").is_ok());
    }
}
