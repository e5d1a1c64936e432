// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Convert {
            features,
            output,
            defs,
            workers,
            namespace,
            name,
            force,
            json,
            quiet,
        }) => commands::cmd_convert(commands::ConvertOptions {
            features,
            output,
            config: defs.config,
            definitions: defs.definitions,
            no_builtin: defs.no_builtin,
            workers,
            namespace,
            name,
            force,
            json,
            quiet,
        }),
        Some(Commands::Check { defs }) => {
            commands::cmd_check(defs.config.as_deref(), &defs.definitions, defs.no_builtin)
        }
        Some(Commands::Rules {
            defs,
            category,
            templates,
        }) => commands::cmd_rules(
            defs.config.as_deref(),
            &defs.definitions,
            defs.no_builtin,
            category.as_deref(),
            templates,
        ),
        None => {
            println!("modport v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'modport --help' for usage information");
            Ok(())
        }
    }
}
