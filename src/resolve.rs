// src/resolve.rs

//! Resolved features
//!
//! The outcome of mapping/assumption resolution for one feature record: the
//! target capability, how it was reached, a confidence score and the
//! parameter bindings handed to template rendering. Created once per record
//! per run and never mutated afterwards.

use crate::assumption::ImpactLevel;
use crate::feature::{FeatureRecord, PropertyBag, PropertyValue};
use crate::mapping::{MappingEntry, MappingKind};
use serde::{Deserialize, Serialize};

/// Clamp a score into [0.0, 1.0] (NaN becomes 0.0)
pub fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Record of an applied assumption rule, surfaced verbatim in reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assumption {
    /// Rule name
    pub rule: String,
    /// Original property that drove the decision
    pub property: String,
    /// Its value on the source feature, if it had one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<PropertyValue>,
    /// Capability substituted on the target platform
    pub capability: String,
    pub impact: ImpactLevel,
    pub certainty: f64,
    /// What was changed and why
    pub description: String,
}

impl Assumption {
    /// One-line rationale for reports
    pub fn rationale(&self) -> String {
        let original = self
            .original
            .as_ref()
            .map(|v| format!(" = {}", v))
            .unwrap_or_default();
        format!(
            "{} ({} impact): '{}'{} -> {}: {}",
            self.rule, self.impact, self.property, original, self.capability, self.description
        )
    }
}

/// Output of resolution, ready for template selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFeature {
    pub feature_id: String,
    pub kind: MappingKind,
    pub confidence: f64,
    pub capability: String,
    pub bindings: PropertyBag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assumption: Option<Assumption>,
}

impl ResolvedFeature {
    /// Resolve through a registry entry that needs no approximation
    ///
    /// Confidence is the entry's base confidence, unchanged.
    pub fn direct(feature: &FeatureRecord, entry: &MappingEntry, namespace: &str) -> Self {
        let mut bindings = feature.bindings(namespace);
        merge_preserving_reserved(&mut bindings, &entry.bindings);

        Self {
            feature_id: feature.id.clone(),
            kind: entry.kind,
            confidence: clamp_confidence(entry.confidence),
            capability: entry.capability.clone(),
            bindings,
            assumption: None,
        }
    }

    /// Impact of the applied assumption, if any
    pub fn impact(&self) -> Option<ImpactLevel> {
        self.assumption.as_ref().map(|a| a.impact)
    }

    /// Copy with confidence scaled by a penalty factor in [0, 1]
    pub fn penalized(&self, factor: f64) -> Self {
        let mut degraded = self.clone();
        degraded.confidence = clamp_confidence(self.confidence * clamp_confidence(factor));
        degraded
    }
}

/// Merge `overrides` into `bindings`, leaving the reserved derived keys alone
pub(crate) fn merge_preserving_reserved(bindings: &mut PropertyBag, overrides: &PropertyBag) {
    for (key, value) in overrides.iter() {
        if !crate::feature::RESERVED_BINDINGS.contains(&key.as_str()) {
            bindings.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureCategory;

    #[test]
    fn test_direct_keeps_base_confidence() {
        let feature = FeatureRecord::new("mod:chest", FeatureCategory::Block)
            .with_property("inventory", true);
        let mut entry =
            MappingEntry::new(FeatureCategory::Block, "minecraft:block", MappingKind::Direct, 0.95);
        entry.bindings.insert("container_kind", "chest");
        entry.bindings.insert("name", "ignored");

        let resolved = ResolvedFeature::direct(&feature, &entry, "converted");
        assert_eq!(resolved.confidence, 0.95);
        assert_eq!(resolved.kind, MappingKind::Direct);
        assert_eq!(resolved.bindings.get_str("container_kind"), Some("chest"));
        assert_eq!(resolved.bindings.get_str("name"), Some("chest"));
        assert!(resolved.assumption.is_none());
    }

    #[test]
    fn test_penalty_never_raises_confidence() {
        let feature = FeatureRecord::new("mod:gem", FeatureCategory::Item);
        let entry =
            MappingEntry::new(FeatureCategory::Item, "minecraft:item", MappingKind::Direct, 0.9);
        let resolved = ResolvedFeature::direct(&feature, &entry, "converted");
        assert!(resolved.penalized(0.8).confidence <= resolved.confidence);
        assert_eq!(resolved.penalized(7.0).confidence, resolved.confidence);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp_confidence(1.2), 1.0);
        assert_eq!(clamp_confidence(-0.1), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
    }
}
