// src/commands/check.rs
//! Definition validation command

use super::{load_definitions, load_settings};
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Load and validate definitions, then print what was found
pub fn cmd_check(config: Option<&Path>, definitions: &[PathBuf], no_builtin: bool) -> Result<()> {
    let config = load_settings(config, definitions, no_builtin)?;
    let defs = load_definitions(&config)?;
    let stats = defs.stats();

    println!("Definitions OK");
    println!("  Mappings:     {}", stats.mappings);
    println!("  Rules:        {}", stats.rules);
    println!("  Templates:    {}", stats.templates);
    println!("  Capabilities: {}", stats.capabilities);
    if config.definitions.include_builtin {
        println!("  Sources:      builtin");
    }
    for dir in &config.definitions.paths {
        println!("                {}", dir.display());
    }
    Ok(())
}
