// src/commands/mod.rs
//! Command handlers for the modport CLI

mod check;
mod convert;
pub mod progress;
mod rules;

pub use check::cmd_check;
pub use convert::{cmd_convert, ConvertOptions};
pub use rules::cmd_rules;

use anyhow::{Context, Result};
use modport::{load_config, Definitions, ModportConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load configuration and fold definition flags into it
pub(crate) fn load_settings(
    config_path: Option<&Path>,
    extra_definitions: &[PathBuf],
    no_builtin: bool,
) -> Result<ModportConfig> {
    let mut config = load_config(config_path).context("Failed to load configuration")?;
    config
        .definitions
        .paths
        .extend(extra_definitions.iter().cloned());
    if no_builtin {
        config.definitions.include_builtin = false;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Load the definition set described by a configuration
pub(crate) fn load_definitions(config: &ModportConfig) -> Result<Definitions> {
    debug!(
        "Loading definitions (builtin: {}, dirs: {:?})",
        config.definitions.include_builtin, config.definitions.paths
    );
    Definitions::load(&config.definitions.paths, config.definitions.include_builtin)
        .context("Failed to load definitions")
}
