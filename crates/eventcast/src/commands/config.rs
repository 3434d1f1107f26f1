//! Config command - configuration management.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;
use eventcast_config::EventcastConfig;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and where it came from
    Show,

    /// Show configuration, credential, token and log paths
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Path => cmd_path(ctx).await,
    }
}

/// The merged config with every section filled in.
fn effective(ctx: &Context) -> EventcastConfig {
    EventcastConfig {
        oauth: Some(ctx.loaded.config.oauth()),
        logging: Some(ctx.loaded.config.logging()),
    }
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    let config = effective(ctx);

    if ctx.json_output {
        let output = serde_json::json!({
            "sources": ctx.loaded.loaded_from(),
            "warnings": ctx.loaded.warnings,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# eventcast Configuration\n");

    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)\n");
    } else {
        println!("# Config files:");
        for source in &sources {
            println!("#   {}", source.display());
        }
        println!();
    }

    if ctx.verbose {
        println!("# Search order (later overrides earlier):");
        for layer in &ctx.loaded.layers {
            println!("#   {} ({})", layer.path.display(), layer.status.as_str());
        }
        println!();
    }

    print!("{}", config.to_toml()?);

    if !ctx.loaded.warnings.is_empty() {
        let yellow = Style::new().yellow();
        eprintln!();
        for w in &ctx.loaded.warnings {
            eprintln!("{} {}", yellow.apply_to("⚠"), w);
        }
    }

    Ok(())
}

async fn cmd_path(ctx: &Context) -> Result<()> {
    let store = ctx.credential_store();
    let config_file = ctx.loaded.user_config_path();
    let log_dir = ctx.loaded.log_dir();

    if ctx.json_output {
        let output = serde_json::json!({
            "config_dir": ctx.config_dir(),
            "config_file": config_file,
            "credentials": store.client_identity_path(),
            "tokens": store.token_path(),
            "logs": log_dir,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{} {}", dim.apply_to("Config dir: "), ctx.config_dir().display());
    println!("{} {}", dim.apply_to("Config file:"), config_file.display());
    println!(
        "{} {}",
        dim.apply_to("Credentials:"),
        store.client_identity_path().display()
    );
    println!("{} {}", dim.apply_to("Tokens:     "), store.token_path().display());
    println!("{} {}", dim.apply_to("Logs:       "), log_dir.display());

    Ok(())
}
