// src/lib.rs

//! Modport: mod conversion pipeline
//!
//! Ports features extracted from a Java game mod to a restricted target
//! platform. Each feature flows through a fixed chain of stages:
//!
//! - Mapping: category and properties select a target capability
//! - Assumption: rules fill gaps the target cannot express directly
//! - Selection: the most specific template variant for the capability
//! - Render: parameter substitution plus output schema validation
//!
//! Features are independent; a failure in one never affects another.
//! A job ends in a deterministic [`ConversionReport`] and an on-disk
//! package written by [`PackageWriter`].

pub mod assumption;
pub mod config;
pub mod definitions;
mod error;
pub mod feature;
pub mod job;
pub mod mapping;
pub mod package;
pub mod pipeline;
pub mod predicate;
pub mod progress;
pub mod report;
pub mod resolve;
pub mod template;

pub use assumption::{AssumptionEngine, AssumptionOutcome, AssumptionRule, ImpactLevel};
pub use config::{load_config, parse_config, ConfigError, ModportConfig};
pub use definitions::{DefinitionError, Definitions};
pub use error::{Error, Result};
pub use feature::{
    load_features, parse_features, FeatureCategory, FeatureRecord, PropertyBag, PropertyValue,
};
pub use job::{ConversionJob, JobSummary};
pub use mapping::{MappingEntry, MappingKind, MappingRegistry};
pub use package::{PackageOptions, PackageWriter};
pub use pipeline::{
    ConversionResult, ConversionStatus, JobOutcome, Orchestrator, PipelineOptions,
};
pub use predicate::Predicate;
pub use progress::{CallbackProgress, LogProgress, ProgressEvent, ProgressTracker, SilentProgress};
pub use report::{ConversionReport, ReportAggregator};
pub use resolve::{Assumption, ResolvedFeature};
pub use template::{Template, TemplateSet};
