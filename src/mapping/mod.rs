// src/mapping/mod.rs

//! Feature mapping registry
//!
//! A static, ordered table of known source-feature to target-capability
//! mappings. Lookup narrows by feature category, then walks the category's
//! entries in declaration order and returns the first whose predicates match.
//! Ordering is the only tie-break; there is no specificity scoring, so entry
//! authors list the most specific entries first.
//!
//! A miss is not an error: it tells the orchestrator to consult the
//! assumption engine instead.

use crate::feature::{FeatureCategory, FeatureRecord, PropertyBag};
use crate::predicate::{all_match, MatchContext, Predicate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// How a source feature maps onto the target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingKind {
    /// One-to-one equivalent exists
    Direct,
    /// Equivalent exists behind a different API shape
    ApiAdaptation,
    /// Behavior re-expressed through target events
    EventMapping,
    /// Needs a documented approximation
    SmartAssumption,
    /// Known to have no equivalent
    Unsupported,
}

impl MappingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ApiAdaptation => "api_adaptation",
            Self::EventMapping => "event_mapping",
            Self::SmartAssumption => "smart_assumption",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether an entry of this kind is resolved without the assumption engine
    pub fn resolves_directly(&self) -> bool {
        matches!(self, Self::Direct | Self::ApiAdaptation | Self::EventMapping)
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MappingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "direct" => Ok(Self::Direct),
            "api_adaptation" => Ok(Self::ApiAdaptation),
            "event_mapping" => Ok(Self::EventMapping),
            "smart_assumption" => Ok(Self::SmartAssumption),
            "unsupported" => Ok(Self::Unsupported),
            _ => Err(format!("Unknown mapping kind: {}", s)),
        }
    }
}

/// One registry row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub category: FeatureCategory,

    /// Property predicates, all must match
    #[serde(default)]
    pub when: Vec<Predicate>,

    /// Target capability identifier
    pub capability: String,

    pub kind: MappingKind,

    /// Base confidence in [0.0, 1.0]
    pub confidence: f64,

    /// Static parameter bindings contributed to the resolved feature
    #[serde(default)]
    pub bindings: PropertyBag,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MappingEntry {
    pub fn new(
        category: FeatureCategory,
        capability: impl Into<String>,
        kind: MappingKind,
        confidence: f64,
    ) -> Self {
        Self {
            category,
            when: Vec::new(),
            capability: capability.into(),
            kind,
            confidence,
            bindings: PropertyBag::new(),
            note: None,
        }
    }

    /// Builder-style predicate append
    pub fn when(mut self, predicate: Predicate) -> Self {
        self.when.push(predicate);
        self
    }

    fn matches(&self, feature: &FeatureRecord) -> bool {
        all_match(&self.when, &MatchContext::new(&feature.id, &feature.properties))
    }
}

/// Registry construction errors
#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("mapping #{index} ({capability}) has confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange {
        index: usize,
        capability: String,
        confidence: f64,
    },

    #[error("mapping #{index} has an empty capability id")]
    EmptyCapability { index: usize },
}

/// Read-only, ordered mapping table
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    entries: Vec<MappingEntry>,
    by_category: HashMap<FeatureCategory, Vec<usize>>,
}

impl MappingRegistry {
    /// Build a registry, preserving declaration order
    pub fn new(entries: Vec<MappingEntry>) -> Result<Self, RegistryError> {
        let mut by_category: HashMap<FeatureCategory, Vec<usize>> = HashMap::new();

        for (index, entry) in entries.iter().enumerate() {
            if !(0.0..=1.0).contains(&entry.confidence) {
                return Err(RegistryError::ConfidenceOutOfRange {
                    index,
                    capability: entry.capability.clone(),
                    confidence: entry.confidence,
                });
            }
            if entry.capability.trim().is_empty() {
                return Err(RegistryError::EmptyCapability { index });
            }
            by_category.entry(entry.category).or_default().push(index);
        }

        Ok(Self {
            entries,
            by_category,
        })
    }

    /// First matching entry for the feature, or `None` (NotFound)
    pub fn lookup(&self, feature: &FeatureRecord) -> Option<&MappingEntry> {
        self.by_category
            .get(&feature.category)?
            .iter()
            .map(|&index| &self.entries[index])
            .find(|entry| entry.matches(feature))
    }

    /// All entries in declaration order
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Entries for one category in declaration order
    pub fn entries_for(&self, category: FeatureCategory) -> impl Iterator<Item = &MappingEntry> {
        self.by_category
            .get(&category)
            .into_iter()
            .flatten()
            .map(|&index| &self.entries[index])
    }

    /// Capability ids referenced by the registry (excluding `unsupported` rows)
    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.kind != MappingKind::Unsupported)
            .map(|e| e.capability.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
