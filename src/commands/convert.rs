// src/commands/convert.rs
//! Conversion command: features in, package and report out

use super::load_settings;
use super::progress::ConversionProgress;
use anyhow::{Context, Result};
use modport::{ConversionJob, SilentProgress};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for `modport convert`
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub features: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub definitions: Vec<PathBuf>,
    pub no_builtin: bool,
    pub workers: Option<usize>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub force: bool,
    pub json: bool,
    pub quiet: bool,
}

pub fn cmd_convert(opts: ConvertOptions) -> Result<()> {
    let mut config = load_settings(opts.config.as_deref(), &opts.definitions, opts.no_builtin)?;
    if let Some(workers) = opts.workers {
        config.pipeline.workers = workers;
    }
    if let Some(namespace) = opts.namespace {
        config.pipeline.namespace = namespace;
    }
    if let Some(name) = opts.name {
        config.output.pack_name = name;
    }
    if opts.force {
        config.output.overwrite = true;
    }

    // Without a terminal the job falls back to periodic log lines
    let mut job = ConversionJob::new(config);
    if opts.quiet || opts.json {
        job = job.with_progress(Arc::new(SilentProgress::new()));
    } else if std::io::stderr().is_terminal() {
        job = job.with_progress(Arc::new(ConversionProgress::new(0)));
    }

    let summary = job.run(&opts.features, &opts.output).with_context(|| {
        format!(
            "Failed to convert {} into {}",
            opts.features.display(),
            opts.output.display()
        )
    })?;

    let report = &summary.outcome.report;
    if opts.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
        println!(
            "Package '{}' written to {} ({} files, {} assets)",
            summary.package.header.name,
            summary.package.root.display(),
            summary.package.files,
            summary.assets.len()
        );
    }
    Ok(())
}
