//! Configuration system for eventcast.
//!
//! Provides TOML-based configuration with:
//! - An `[oauth]` section for the consent flow and token refresh
//! - A `[logging]` section for the CLI's console and file output
//! - Config directory resolution and file layering (user + project-local)
//! - Environment variable overrides for headless use

pub mod discovery;
pub mod env;
pub mod error;
pub mod types;

pub use discovery::{
    CONFIG_DIR_ENV, ConfigLayer, LayerKind, LayerStatus, LoadedConfig, load, resolve_config_dir,
};
pub use error::{ConfigError, Result};
pub use types::*;
