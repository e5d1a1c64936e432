// src/job.rs

//! End-to-end conversion jobs
//!
//! A [`ConversionJob`] drives one configured run: definitions are loaded,
//! features are converted, referenced assets are handed to the transcoder
//! and the package is written. Any step that cannot continue returns the
//! crate-level [`Error`](crate::Error).

use crate::config::ModportConfig;
use crate::definitions::Definitions;
use crate::feature::{load_features, FeatureRecord};
use crate::package::{
    collect_assets, transcode_all, AssetRecord, AssetTranscoder, PackageWriter,
    PassthroughTranscoder, WrittenPackage,
};
use crate::pipeline::{JobOutcome, Orchestrator};
use crate::progress::{LogProgress, ProgressTracker};
use crate::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a finished job produced
#[derive(Debug)]
pub struct JobSummary {
    pub outcome: JobOutcome,
    pub assets: Vec<AssetRecord>,
    pub package: WrittenPackage,
}

/// A configured conversion run
pub struct ConversionJob {
    config: ModportConfig,
    progress: Option<Arc<dyn ProgressTracker>>,
    transcoder: Box<dyn AssetTranscoder>,
}

impl ConversionJob {
    pub fn new(config: ModportConfig) -> Self {
        Self {
            config,
            progress: None,
            transcoder: Box::new(PassthroughTranscoder),
        }
    }

    /// Report progress here instead of the periodic log lines
    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_transcoder(mut self, transcoder: Box<dyn AssetTranscoder>) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn config(&self) -> &ModportConfig {
        &self.config
    }

    /// Load definitions and features from disk, then convert
    pub fn run(&self, features_path: &Path, output: &Path) -> Result<JobSummary> {
        self.config.validate()?;
        let definitions = Definitions::load(
            &self.config.definitions.paths,
            self.config.definitions.include_builtin,
        )?;
        let features = load_features(features_path)?;
        if features.is_empty() {
            warn!("{} contains no features", features_path.display());
        }
        info!(
            "Converting {} features from {}",
            features.len(),
            features_path.display()
        );
        self.convert(definitions, &features, output)
    }

    /// Convert already loaded features and write the package
    pub fn convert(
        &self,
        definitions: Definitions,
        features: &[FeatureRecord],
        output: &Path,
    ) -> Result<JobSummary> {
        self.config.validate()?;
        let progress: Arc<dyn ProgressTracker> = match &self.progress {
            Some(progress) => Arc::clone(progress),
            None => Arc::new(LogProgress::new("convert", features.len() as u64)),
        };
        let orchestrator = Orchestrator::new(Arc::new(definitions), self.config.pipeline_options())
            .with_progress(progress);
        let mut outcome = orchestrator.run(features)?;

        let assets = if self.config.output.assets {
            let refs = collect_assets(&outcome.results);
            let (records, warnings) = transcode_all(self.transcoder.as_ref(), &refs);
            outcome.report.warnings.extend(warnings);
            records
        } else {
            Vec::new()
        };

        let package = PackageWriter::new(output, self.config.package_options())
            .write(&outcome.report, &assets)?;
        Ok(JobSummary {
            outcome,
            assets,
            package,
        })
    }
}
