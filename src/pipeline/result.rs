// src/pipeline/result.rs

//! Per-feature conversion outcomes

use crate::assumption::ImpactLevel;
use crate::feature::{FeatureCategory, SourceLocation};
use crate::mapping::MappingKind;
use crate::resolve::ResolvedFeature;
use crate::template::RenderedOutput;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage names used in error records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Mapping,
    Assumption,
    Selection,
    Render,
    /// Render retry with the fallback variant
    Fallback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mapping => "mapping",
            Self::Assumption => "assumption",
            Self::Selection => "selection",
            Self::Render => "render",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error recorded against one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
    /// Template involved, for render and fallback errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            template: None,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.message)
    }
}

/// Terminal status of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    /// Rendered and validated
    Converted,
    /// Rendered and validated, but a high-impact assumption changed behavior
    Partial,
    /// A stage error or a second validation failure
    Failed,
    /// Unsupported or cancelled
    Skipped,
}

impl ConversionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Converted => "converted",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn all() -> &'static [ConversionStatus] {
        &[Self::Converted, Self::Partial, Self::Failed, Self::Skipped]
    }

    /// Whether the feature produced package output
    pub fn has_output(&self) -> bool {
        matches!(self, Self::Converted | Self::Partial)
    }
}

impl fmt::Display for ConversionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConversionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "converted" => Ok(Self::Converted),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown conversion status: {}", s)),
        }
    }
}

/// Outcome of one feature's pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionResult {
    /// Position in the input
    pub index: usize,
    pub feature_id: String,
    pub category: FeatureCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedFeature>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<RenderedOutput>,
    /// Errors in the order they occurred
    pub errors: Vec<StageError>,
    pub status: ConversionStatus,
    /// Why the feature was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Output came from the fallback variant after a failed render
    pub used_fallback: bool,
}

impl ConversionResult {
    pub fn kind(&self) -> Option<MappingKind> {
        self.resolved.as_ref().map(|r| r.kind)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.resolved.as_ref().map(|r| r.confidence)
    }

    pub fn capability(&self) -> Option<&str> {
        self.resolved.as_ref().map(|r| r.capability.as_str())
    }

    pub fn impact(&self) -> Option<ImpactLevel> {
        self.resolved.as_ref().and_then(|r| r.impact())
    }

    /// Converted through a registry entry of kind `direct`
    pub fn is_full_fidelity(&self) -> bool {
        self.status == ConversionStatus::Converted && self.kind() == Some(MappingKind::Direct)
    }

    /// Display string explaining a non-`converted` outcome or an approximation
    pub fn rationale(&self) -> Option<String> {
        match self.status {
            ConversionStatus::Skipped => self.reason.clone(),
            ConversionStatus::Failed => Some(
                self.errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            ConversionStatus::Converted | ConversionStatus::Partial => self
                .resolved
                .as_ref()
                .and_then(|r| r.assumption.as_ref())
                .map(|a| a.rationale()),
        }
    }
}
