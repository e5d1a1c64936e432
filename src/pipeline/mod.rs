// src/pipeline/mod.rs

//! Stage orchestrator
//!
//! Drives every feature record of one conversion job through
//! mapping, assumption, selection and rendering. Features are independent:
//! the shared tables are read-only, so each feature's state machine runs on a
//! rayon worker without locking. The only synchronization point is the
//! result-collection barrier before the report is aggregated.
//!
//! Failure isolation is structural. Every stage returns a `Result`, panics
//! are caught per stage, and each feature always ends in exactly one terminal
//! [`ConversionResult`]; nothing a single feature does can abort the job.

mod result;
mod state;

pub use result::{ConversionResult, ConversionStatus, Stage, StageError};
pub use state::FeatureState;

use crate::assumption::{AssumptionOutcome, ImpactLevel};
use crate::definitions::Definitions;
use crate::feature::FeatureRecord;
use crate::mapping::{MappingEntry, MappingKind};
use crate::progress::{ProgressTracker, SilentProgress};
use crate::report::{ConversionReport, ReportAggregator};
use crate::resolve::ResolvedFeature;
use crate::template::{RenderedOutput, Renderer, TemplateSelector, ValidationLimits};
use rayon::prelude::*;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Reason recorded for features skipped by cancellation
pub const CANCELLED_REASON: &str = "cancelled";

/// Default confidence multiplier for output produced by a fallback retry
pub const DEFAULT_FALLBACK_PENALTY: f64 = 0.8;

/// Job-level failures (never caused by an individual feature)
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Options for a conversion job
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Worker threads (0 = one per CPU)
    pub workers: usize,
    /// Namespace for feature ids without one
    pub namespace: String,
    /// Confidence multiplier applied when only the fallback variant rendered
    pub fallback_penalty: f64,
    /// Bounds on schema validation
    pub limits: ValidationLimits,
    /// Cancellation token, observed at every stage boundary
    pub cancel_token: Option<Arc<AtomicBool>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            namespace: "converted".to_string(),
            fallback_penalty: DEFAULT_FALLBACK_PENALTY,
            limits: ValidationLimits::default(),
            cancel_token: None,
        }
    }
}

impl PipelineOptions {
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn fallback_penalty(mut self, penalty: f64) -> Self {
        self.fallback_penalty = penalty;
        self
    }

    pub fn limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cancel_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map(|t| t.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Everything a finished job produced
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// One result per input record, in input order
    pub results: Vec<ConversionResult>,
    pub report: ConversionReport,
    /// Cancellation was observed during the run
    pub cancelled: bool,
}

/// Runs the conversion pipeline over feature sets
pub struct Orchestrator {
    definitions: Arc<Definitions>,
    options: PipelineOptions,
    progress: Arc<dyn ProgressTracker>,
}

/// Why a feature left the pipeline early
enum Exit {
    Skip(String),
    Fail(StageError),
}

impl Orchestrator {
    pub fn new(definitions: Arc<Definitions>, options: PipelineOptions) -> Self {
        Self {
            definitions,
            options,
            progress: Arc::new(SilentProgress::new()),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// Convert every feature and aggregate the report
    ///
    /// Returns only after every feature has reached a terminal status.
    pub fn run(&self, features: &[FeatureRecord]) -> Result<JobOutcome, PipelineError> {
        warn_duplicate_ids(features);
        info!("Converting {} features", features.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .thread_name(|i| format!("modport-worker-{}", i))
            .build()?;

        self.progress.set_length(features.len() as u64);
        let results: Vec<ConversionResult> = pool.install(|| {
            features
                .par_iter()
                .enumerate()
                .map(|(index, feature)| {
                    let result = self.convert_feature(index, feature);
                    self.progress.feature_done(&result.feature_id, result.status);
                    result
                })
                .collect()
        });

        let report = ReportAggregator::aggregate(&results);
        let cancelled = self.options.is_cancelled();
        if cancelled {
            self.progress.finish_with_error("conversion cancelled");
            warn!("Conversion cancelled; unfinished features were skipped");
        } else {
            self.progress.finish_with_message(&format!(
                "{} converted, {} partial, {} failed, {} skipped",
                report.converted, report.partial, report.failed, report.skipped
            ));
        }

        Ok(JobOutcome {
            results,
            report,
            cancelled,
        })
    }

    /// Run one feature's state machine to a terminal status
    pub fn convert_feature(&self, index: usize, feature: &FeatureRecord) -> ConversionResult {
        let mut run = FeatureRun::new(index, feature);
        match self.drive(&mut run) {
            Ok((output, used_fallback)) => run.complete(output, used_fallback),
            Err(Exit::Skip(reason)) => run.skip(reason),
            Err(Exit::Fail(error)) => run.fail(error),
        }
    }

    fn checkpoint(&self) -> Result<(), Exit> {
        if self.options.is_cancelled() {
            Err(Exit::Skip(CANCELLED_REASON.to_string()))
        } else {
            Ok(())
        }
    }

    fn drive(&self, run: &mut FeatureRun<'_>) -> Result<(RenderedOutput, bool), Exit> {
        let definitions = &*self.definitions;
        let feature = run.feature;
        let namespace = self.options.namespace.as_str();

        self.checkpoint()?;
        let entry = guarded(Stage::Mapping, || definitions.registry.lookup(feature).cloned())
            .map_err(Exit::Fail)?;
        run.advance(if entry.is_some() {
            FeatureState::Mapped
        } else {
            FeatureState::Unmapped
        });

        self.checkpoint()?;
        let outcome = match &entry {
            Some(entry) if entry.kind.resolves_directly() => guarded(Stage::Mapping, || {
                AssumptionOutcome::Resolved(ResolvedFeature::direct(feature, entry, namespace))
            }),
            Some(entry) if entry.kind == MappingKind::Unsupported => {
                Ok(AssumptionOutcome::Unsupported {
                    reason: unsupported_reason(feature, entry),
                })
            }
            Some(entry) => guarded(Stage::Assumption, || {
                definitions.engine.resolve_entry(feature, entry, namespace)
            }),
            None => guarded(Stage::Assumption, || {
                definitions.engine.resolve(feature, namespace)
            }),
        }
        .map_err(Exit::Fail)?;

        let resolved = match outcome {
            AssumptionOutcome::Resolved(resolved) => resolved,
            AssumptionOutcome::Unsupported { reason } => {
                run.advance(FeatureState::Unsupported);
                debug!("{} skipped: {}", feature.id, reason);
                return Err(Exit::Skip(reason));
            }
        };
        run.advance(FeatureState::Resolved);
        run.resolved = Some(resolved.clone());

        self.checkpoint()?;
        let selector = TemplateSelector::new(&definitions.templates);
        let handle = guarded(Stage::Selection, || selector.select(&resolved))
            .map_err(Exit::Fail)?
            .map_err(|e| Exit::Fail(StageError::new(Stage::Selection, e.to_string())))?;
        run.advance(FeatureState::Selected);

        self.checkpoint()?;
        let renderer = Renderer::new(&definitions.templates, self.options.limits);
        let first = guarded(Stage::Render, || renderer.render(handle, &resolved.bindings))
            .map_err(Exit::Fail)?;

        match first {
            Ok(output) => {
                run.advance(FeatureState::Rendered);
                Ok((output, false))
            }
            Err(err) => {
                let template = definitions.templates.get(handle).label();
                debug!("{}: {} failed, retrying with fallback: {}", feature.id, template, err);
                run.errors
                    .push(StageError::new(Stage::Render, err.to_string()).with_template(template));
                run.advance(FeatureState::ValidationFailed);

                self.checkpoint()?;
                let fallback = selector
                    .fallback(&resolved.capability)
                    .map_err(|e| Exit::Fail(StageError::new(Stage::Fallback, e.to_string())))?;
                let retry = guarded(Stage::Fallback, || {
                    renderer.render(fallback, &resolved.bindings)
                })
                .map_err(Exit::Fail)?;

                match retry {
                    Ok(output) => {
                        run.resolved = Some(resolved.penalized(self.options.fallback_penalty));
                        run.advance(FeatureState::Rendered);
                        Ok((output, true))
                    }
                    Err(err) => Err(Exit::Fail(
                        StageError::new(Stage::Fallback, err.to_string())
                            .with_template(definitions.templates.get(fallback).label()),
                    )),
                }
            }
        }
    }
}

/// Mutable bookkeeping for one feature's run
struct FeatureRun<'a> {
    index: usize,
    feature: &'a FeatureRecord,
    state: FeatureState,
    errors: Vec<StageError>,
    resolved: Option<ResolvedFeature>,
}

impl<'a> FeatureRun<'a> {
    fn new(index: usize, feature: &'a FeatureRecord) -> Self {
        Self {
            index,
            feature,
            state: FeatureState::Pending,
            errors: Vec::new(),
            resolved: None,
        }
    }

    fn advance(&mut self, next: FeatureState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        trace!("{}: {} -> {}", self.feature.id, self.state, next);
        self.state = next;
    }

    fn complete(mut self, output: RenderedOutput, used_fallback: bool) -> ConversionResult {
        let high_impact = self
            .resolved
            .as_ref()
            .and_then(|r| r.impact())
            .is_some_and(|impact| impact == ImpactLevel::High);
        self.advance(if high_impact {
            FeatureState::Partial
        } else {
            FeatureState::Converted
        });
        self.into_result(Some(output), None, used_fallback)
    }

    fn skip(mut self, reason: String) -> ConversionResult {
        self.advance(FeatureState::Skipped);
        self.into_result(None, Some(reason), false)
    }

    fn fail(mut self, error: StageError) -> ConversionResult {
        warn!("Feature {} failed: {}", self.feature.id, error);
        self.errors.push(error);
        self.advance(FeatureState::Failed);
        self.into_result(None, None, false)
    }

    fn into_result(
        self,
        output: Option<RenderedOutput>,
        reason: Option<String>,
        used_fallback: bool,
    ) -> ConversionResult {
        let status = self.state.status().unwrap_or(ConversionStatus::Failed);
        ConversionResult {
            index: self.index,
            feature_id: self.feature.id.clone(),
            category: self.feature.category,
            source: self.feature.source.clone(),
            resolved: self.resolved,
            output,
            errors: self.errors,
            status,
            reason,
            used_fallback,
        }
    }
}

/// Run a stage, turning a panic into a stage error
fn guarded<T>(stage: Stage, f: impl FnOnce() -> T) -> Result<T, StageError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        StageError::new(stage, format!("internal error: {}", panic_message(payload.as_ref())))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn unsupported_reason(feature: &FeatureRecord, entry: &MappingEntry) -> String {
    match &entry.note {
        Some(note) => format!("unsupported: {} ({})", feature.category, note),
        None => format!("unsupported: {}", feature.category),
    }
}

fn warn_duplicate_ids(features: &[FeatureRecord]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for feature in features {
        *counts.entry(feature.id.as_str()).or_default() += 1;
    }
    let mut duplicates: Vec<_> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
    duplicates.sort();
    for (id, count) in duplicates {
        warn!("Feature id '{}' appears {} times", id, count);
    }
}
