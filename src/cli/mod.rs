// src/cli/mod.rs
//! CLI definitions for modport
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modport")]
#[command(author = "Modport Contributors")]
#[command(version)]
#[command(about = "Port Java game mod features to a restricted target platform", long_about = None)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Definition source arguments shared by several commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct DefinitionArgs {
    /// Extra definition directory (repeatable, loaded after the built-in set)
    #[arg(short = 'D', long = "definitions", value_name = "DIR")]
    pub definitions: Vec<PathBuf>,

    /// Do not load the built-in definitions
    #[arg(long)]
    pub no_builtin: bool,

    /// Configuration file (default: ./modport.toml if present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert an extracted feature set into a target package
    Convert {
        /// Feature set produced by the extractor (JSON array)
        features: PathBuf,

        /// Output package directory
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        defs: DefinitionArgs,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Namespace for feature ids that carry none
        #[arg(long)]
        namespace: Option<String>,

        /// Pack name written to the package header
        #[arg(long)]
        name: Option<String>,

        /// Write into a non-empty output directory
        #[arg(short, long)]
        force: bool,

        /// Print the report as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Do not show a progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Validate definition files without converting anything
    Check {
        #[command(flatten)]
        defs: DefinitionArgs,
    },

    /// List mappings and assumption rules
    Rules {
        #[command(flatten)]
        defs: DefinitionArgs,

        /// Only show entries for this category
        #[arg(long)]
        category: Option<String>,

        /// Also list template variants per capability
        #[arg(long)]
        templates: bool,
    },
}
