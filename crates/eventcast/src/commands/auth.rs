//! Auth command - OAuth credential management.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::{Style, style};
use eventcast_oauth::{
    AuthorizationFlowController, CredentialStore, NoBrowser, OAuthError, SharedBrowser,
    SystemBrowser, TokenInfo, TokenLifecycleManager,
};
use serde::Serialize;

use super::Context;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Authorize eventcast with your Google account
    Login {
        /// Re-run consent even if a valid token is stored
        #[arg(long)]
        force: bool,

        /// Print the consent URL without opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Show authentication status
    Status,

    /// Print a valid access token, refreshing it if needed
    Token {
        /// Run the browser flow if the stored token cannot be used
        #[arg(long)]
        reauth: bool,
    },

    /// Show how to provision the OAuth client credentials
    Setup,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { force, no_browser } => cmd_login(force, no_browser, ctx).await,
        AuthCommand::Status => cmd_status(ctx).await,
        AuthCommand::Token { reauth } => cmd_token(reauth, ctx).await,
        AuthCommand::Setup => cmd_setup(ctx).await,
    }
}

/// The pieces every auth subcommand works with.
struct Auth {
    store: Arc<CredentialStore>,
    flow: Arc<AuthorizationFlowController>,
    manager: TokenLifecycleManager,
}

/// Build the flow controller and the lifecycle manager on top of it.
fn build(ctx: &Context, open_browser: bool) -> Result<Auth> {
    let store = Arc::new(ctx.credential_store());
    let settings = ctx.oauth_settings()?;

    let browser: SharedBrowser = if open_browser {
        Arc::new(SystemBrowser)
    } else {
        Arc::new(NoBrowser)
    };

    let flow = Arc::new(
        AuthorizationFlowController::new(store.clone(), settings.clone())
            .with_browser(browser)
            .with_url_handler(Arc::new(|url: &str| {
                eprintln!();
                eprintln!("Open this URL in your browser to authorize eventcast:");
                eprintln!();
                eprintln!("  {}", url);
                eprintln!();
                eprintln!("Waiting for the redirect...");
            })),
    );
    let manager = TokenLifecycleManager::new(store.clone(), settings, flow.clone());

    Ok(Auth {
        store,
        flow,
        manager,
    })
}

/// Print the remediation hint for `err` and convert it for `main`.
fn fail(err: OAuthError) -> anyhow::Error {
    if let Some(hint) = err.remediation() {
        eprintln!("{} {}", Style::new().yellow().apply_to("hint:"), hint);
    }
    anyhow::Error::new(err)
}

async fn cmd_login(force: bool, no_browser: bool, ctx: &Context) -> Result<()> {
    let open_browser = ctx.oauth_config().open_browser && !no_browser;
    let Auth {
        store,
        flow,
        manager,
    } = build(ctx, open_browser)?;

    // Fail before anything else if the client file is missing
    store.load_client_identity().map_err(fail)?;

    if !force
        && let Ok(Some(info)) = manager.token_info()
        && !info.is_expired
    {
        println!(
            "Already authenticated (expires in {})",
            info.expires_in_display()
        );
        println!("Run 'eventcast auth login --force' to re-authenticate.");
        return Ok(());
    }

    let tokens = flow.authenticate().await.map_err(fail)?;

    if ctx.json_output {
        let info = manager.token_info().map_err(fail)?;
        let output = StatusOutput::new(store.as_ref(), info);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    println!();
    println!("{}", green.apply_to("✓ Authentication successful"));
    println!("  Scope: {}", tokens.scope);
    println!("  Tokens saved to {}", store.token_path().display());
    if tokens.refresh_token.is_none() {
        println!(
            "  {}",
            Style::new()
                .yellow()
                .apply_to("No refresh token was issued; you will need to log in again when it expires")
        );
    }

    Ok(())
}

/// Status response for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    credentials_path: String,
    credentials_present: bool,
    token_path: String,
    authenticated: bool,
    expires_in_secs: Option<u64>,
    is_expired: Option<bool>,
    needs_refresh: Option<bool>,
    has_refresh_token: Option<bool>,
    scope: Option<String>,
}

impl StatusOutput {
    fn new(store: &CredentialStore, info: Option<TokenInfo>) -> Self {
        Self {
            credentials_path: store.client_identity_path().display().to_string(),
            credentials_present: store.client_identity_path().is_file(),
            token_path: store.token_path().display().to_string(),
            authenticated: info.is_some(),
            expires_in_secs: info.as_ref().map(|i| i.expires_in_secs),
            is_expired: info.as_ref().map(|i| i.is_expired),
            needs_refresh: info.as_ref().map(|i| i.needs_refresh),
            has_refresh_token: info.as_ref().map(|i| i.has_refresh_token),
            scope: info.map(|i| i.scope),
        }
    }
}

async fn cmd_status(ctx: &Context) -> Result<()> {
    let Auth { store, manager, .. } = build(ctx, false)?;
    let info = manager.token_info().map_err(fail)?;
    let output = StatusOutput::new(store.as_ref(), info.clone());

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let green = Style::new().green();
    let yellow = Style::new().yellow();
    let red = Style::new().red();
    let dim = Style::new().dim();

    println!();
    println!("{}", style("Authentication Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    if output.credentials_present {
        println!(
            "  {} {}",
            dim.apply_to("Client:"),
            green.apply_to("● configured")
        );
    } else {
        println!("  {} {}", dim.apply_to("Client:"), red.apply_to("● missing"));
        println!("    Run 'eventcast auth setup' for instructions");
    }

    match info {
        Some(info) => {
            let state = if info.is_expired {
                yellow.apply_to("● expired")
            } else {
                green.apply_to("● authenticated")
            };
            println!("  {} {}", dim.apply_to("OAuth:"), state);
            println!("  {} {}", dim.apply_to("Expires:"), info.expires_in_display());
            println!("  {} {}", dim.apply_to("Scope:"), info.scope);
            if !info.has_refresh_token {
                println!(
                    "  {} {}",
                    dim.apply_to("Refresh:"),
                    yellow.apply_to("no refresh token stored")
                );
            }
        }
        None => {
            println!(
                "  {} {}",
                dim.apply_to("OAuth:"),
                red.apply_to("● not authenticated")
            );
            println!("    Run 'eventcast auth login' to authenticate");
        }
    }

    if ctx.verbose {
        println!();
        println!("  {} {}", dim.apply_to("Credentials:"), output.credentials_path);
        println!("  {} {}", dim.apply_to("Tokens:"), output.token_path);
    }
    println!();

    Ok(())
}

async fn cmd_token(reauth: bool, ctx: &Context) -> Result<()> {
    let oauth = ctx.oauth_config();
    let Auth { manager, .. } = build(ctx, oauth.open_browser)?;

    let client = manager
        .get_authenticated_client(reauth || oauth.auto_reauthenticate)
        .await
        .map_err(fail)?;

    if ctx.json_output {
        let tokens = client.token_set();
        let output = serde_json::json!({
            "access_token": tokens.access_token,
            "token_type": tokens.token_type,
            "expiry_date": tokens.expiry_date.timestamp_millis(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", client.access_token());
    }

    Ok(())
}

async fn cmd_setup(ctx: &Context) -> Result<()> {
    let store = ctx.credential_store();

    println!("{}", style("OAuth client setup").bold());
    println!();
    println!("{}", store.setup_instructions());
    println!();

    match store.load_client_identity() {
        Ok(identity) => println!(
            "{} Client credentials found (client id {})",
            Style::new().green().apply_to("✓"),
            identity.client_id
        ),
        Err(e) => println!("{} {}", Style::new().yellow().apply_to("·"), e),
    }

    Ok(())
}
