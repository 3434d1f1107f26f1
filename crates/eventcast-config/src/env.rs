//! Environment variable overrides.
//!
//! Applied after all config files are merged:
//!
//! - `EVENTCAST_CALLBACK_PORT` - override `[oauth].callback_port`
//! - `EVENTCAST_AUTO_REAUTH` - override `[oauth].auto_reauthenticate` ("true"/"false"/"1"/"0")
//!
//! `EVENTCAST_CONFIG_DIR` is handled by [`crate::resolve_config_dir`].

use crate::EventcastConfig;

/// Overrides the OAuth callback port.
pub const CALLBACK_PORT_ENV: &str = "EVENTCAST_CALLBACK_PORT";

/// Overrides automatic re-authentication.
pub const AUTO_REAUTH_ENV: &str = "EVENTCAST_AUTO_REAUTH";

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut EventcastConfig, warnings: &mut Vec<String>) {
    apply_overrides_from(config, |key| std::env::var(key).ok(), warnings);
}

/// Apply overrides read through `lookup`.
///
/// Unparseable values are skipped with a warning.
pub fn apply_overrides_from(
    config: &mut EventcastConfig,
    lookup: impl Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
) {
    let port = lookup(CALLBACK_PORT_ENV).filter(|v| !v.is_empty());
    let reauth = lookup(AUTO_REAUTH_ENV).filter(|v| !v.is_empty());
    if port.is_none() && reauth.is_none() {
        return;
    }

    let mut oauth = config.oauth();

    if let Some(value) = port {
        match value.parse::<u16>() {
            Ok(port) if port != 0 => oauth.callback_port = port,
            _ => warnings.push(format!(
                "Ignoring {}={:?}: expected a port number",
                CALLBACK_PORT_ENV, value
            )),
        }
    }

    if let Some(value) = reauth {
        match parse_bool(&value) {
            Some(enabled) => oauth.auto_reauthenticate = enabled,
            None => warnings.push(format!(
                "Ignoring {}={:?}: expected true or false",
                AUTO_REAUTH_ENV, value
            )),
        }
    }

    config.oauth = Some(oauth);
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
