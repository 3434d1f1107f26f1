//! Locating the eventcast directory and layering its config files.
//!
//! The directory holding `config.toml`, `credentials.json`, `tokens.json`
//! and `logs/` is taken from `--config-dir`, then `EVENTCAST_CONFIG_DIR`,
//! then the platform config directory. Its `config.toml` is read first,
//! `eventcast.toml` in the working directory is laid over it and the
//! environment overrides in [`crate::env`] are applied last.

use std::path::{Path, PathBuf};

use crate::env::apply_env_overrides;
use crate::{ConfigError, EventcastConfig, Result};

/// Environment variable naming the eventcast directory.
pub const CONFIG_DIR_ENV: &str = "EVENTCAST_CONFIG_DIR";

const USER_CONFIG_FILE: &str = "config.toml";
const PROJECT_CONFIG_FILE: &str = "eventcast.toml";
const LOG_DIR: &str = "logs";
const APP_NAME: &str = "eventcast";

/// Which file a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// `config.toml` in the eventcast directory.
    User,
    /// `eventcast.toml` in the working directory.
    Project,
}

/// What happened when a layer was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerStatus {
    Loaded,
    Missing,
    /// Present but unreadable or not valid TOML; skipped with a warning.
    Invalid,
}

impl LayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerStatus::Loaded => "loaded",
            LayerStatus::Missing => "not found",
            LayerStatus::Invalid => "invalid, skipped",
        }
    }
}

/// One config file that was considered.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub kind: LayerKind,
    pub path: PathBuf,
    pub status: LayerStatus,
}

/// The merged configuration and everything needed to explain it.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EventcastConfig,
    /// Directory holding the user config, credentials, tokens and logs.
    pub config_dir: PathBuf,
    /// Layers in the order they were applied.
    pub layers: Vec<ConfigLayer>,
    /// Skipped layers and ignored environment values.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the layers that contributed values.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.layers
            .iter()
            .filter(|l| l.status == LayerStatus::Loaded)
            .map(|l| l.path.as_path())
            .collect()
    }

    pub fn user_config_path(&self) -> PathBuf {
        self.config_dir.join(USER_CONFIG_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.config_dir.join(LOG_DIR)
    }
}

/// Resolve the eventcast directory, preferring `explicit` (`--config-dir`).
pub fn resolve_config_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    resolve_config_dir_from(explicit, |key| std::env::var(key).ok())
}

fn resolve_config_dir_from(
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = lookup(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    dirs::config_dir()
        .map(|d| d.join(APP_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

/// Read and merge every layer. Never fails; bad layers become warnings.
pub fn load(config_dir: PathBuf, working_dir: &Path) -> LoadedConfig {
    let mut config = EventcastConfig::new();
    let mut warnings = Vec::new();

    let layers = vec![
        apply_layer(
            &mut config,
            LayerKind::User,
            config_dir.join(USER_CONFIG_FILE),
            &mut warnings,
        ),
        apply_layer(
            &mut config,
            LayerKind::Project,
            working_dir.join(PROJECT_CONFIG_FILE),
            &mut warnings,
        ),
    ];

    apply_env_overrides(&mut config, &mut warnings);

    LoadedConfig {
        config,
        config_dir,
        layers,
        warnings,
    }
}

fn apply_layer(
    config: &mut EventcastConfig,
    kind: LayerKind,
    path: PathBuf,
    warnings: &mut Vec<String>,
) -> ConfigLayer {
    let status = if !path.is_file() {
        LayerStatus::Missing
    } else {
        match read_layer(&path) {
            Ok(layer) => {
                config.merge(layer);
                LayerStatus::Loaded
            }
            Err(e) => {
                warnings.push(format!("Skipping {}: {}", path.display(), e));
                LayerStatus::Invalid
            }
        }
    };
    ConfigLayer { kind, path, status }
}

fn read_layer(path: &Path) -> Result<EventcastConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    EventcastConfig::from_toml(&contents)
}
