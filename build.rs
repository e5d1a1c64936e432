// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common arguments: definition sources and config file
fn definition_args() -> [Arg; 3] {
    [
        Arg::new("definitions")
            .short('D')
            .long("definitions")
            .value_name("DIR")
            .action(ArgAction::Append)
            .help("Extra definition directory (repeatable, loaded after the built-in set)"),
        Arg::new("no_builtin")
            .long("no-builtin")
            .action(ArgAction::SetTrue)
            .help("Do not load the built-in definitions"),
        Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("Configuration file (default: ./modport.toml if present)"),
    ]
}

fn build_cli() -> Command {
    Command::new("modport")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Modport Contributors")
        .about("Port Java game mod features to a restricted target platform")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging (overridden by RUST_LOG)"),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert an extracted feature set into a target package")
                .arg(Arg::new("features").required(true).help("Feature set produced by the extractor (JSON array)"))
                .arg(Arg::new("output").short('o').long("output").required(true).help("Output package directory"))
                .args(definition_args())
                .arg(Arg::new("workers").short('w').long("workers").help("Worker threads (0 = one per CPU)"))
                .arg(Arg::new("namespace").long("namespace").help("Namespace for feature ids that carry none"))
                .arg(Arg::new("name").long("name").help("Pack name written to the package header"))
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Write into a non-empty output directory"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON instead of a table"),
                )
                .arg(
                    Arg::new("quiet")
                        .short('q')
                        .long("quiet")
                        .action(ArgAction::SetTrue)
                        .help("Do not show a progress bar"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Validate definition files without converting anything")
                .args(definition_args()),
        )
        .subcommand(
            Command::new("rules")
                .about("List mappings and assumption rules")
                .args(definition_args())
                .arg(Arg::new("category").long("category").help("Only show entries for this category"))
                .arg(
                    Arg::new("templates")
                        .long("templates")
                        .action(ArgAction::SetTrue)
                        .help("Also list template variants per capability"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = manifest_dir.join("man").join("modport.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
