// src/assumption/mod.rs

//! Smart assumption engine
//!
//! Resolves features that have no direct equivalent on the target platform
//! into documented approximations. Rules are tried in declared priority
//! order and the first match wins; this is a total-order policy, not a
//! best-score one, so rule files list rules from most to least specific.
//!
//! Every applied rule leaves an [`Assumption`] record naming the property
//! that drove the decision, the substituted capability and the impact level.
//! When no rule matches, the feature is `Unsupported`, a terminal and
//! expected outcome that is reported as a limitation rather than an error.
//!
//! # Confidence
//!
//! `confidence = clamp(base * certainty)` where `base` is the registry
//! entry's confidence, or [`DEFAULT_BASE_CONFIDENCE`] when the registry had
//! no entry for the feature.

use crate::feature::{FeatureCategory, FeatureRecord, PropertyBag};
use crate::mapping::{MappingEntry, MappingKind};
use crate::predicate::{all_match, first_key, MatchContext, Predicate};
use crate::resolve::{clamp_confidence, merge_preserving_reserved, Assumption, ResolvedFeature};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Base confidence used when the registry had no entry for a feature
pub const DEFAULT_BASE_CONFIDENCE: f64 = 0.5;

/// How much an approximation changes functional behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ImpactLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown impact level: {}", s)),
        }
    }
}

/// A predicate over a feature plus the approximation it applies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionRule {
    pub name: String,

    /// Restrict to one category; any category when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FeatureCategory>,

    #[serde(default)]
    pub when: Vec<Predicate>,

    /// Property that drives the decision (defaults to the first predicate key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,

    /// Substituted target capability
    pub capability: String,

    /// Certainty factor in [0.0, 1.0]
    pub certainty: f64,

    pub impact: ImpactLevel,

    /// Human-readable description of what was changed and why
    pub description: String,

    /// Binding overrides applied after the feature's own properties
    #[serde(default)]
    pub set: PropertyBag,

    /// Binding keys removed from the resolved feature
    #[serde(default)]
    pub drop: Vec<String>,
}

impl AssumptionRule {
    pub fn new(
        name: impl Into<String>,
        capability: impl Into<String>,
        certainty: f64,
        impact: ImpactLevel,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: None,
            when: Vec::new(),
            property: None,
            capability: capability.into(),
            certainty,
            impact,
            description: description.into(),
            set: PropertyBag::new(),
            drop: Vec::new(),
        }
    }

    pub fn for_category(mut self, category: FeatureCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn when(mut self, predicate: Predicate) -> Self {
        self.when.push(predicate);
        self
    }

    /// The property reported as driving this rule
    pub fn driving_property(&self) -> &str {
        self.property
            .as_deref()
            .or_else(|| first_key(&self.when))
            .unwrap_or("category")
    }

    pub fn matches(&self, feature: &FeatureRecord) -> bool {
        if self.category.is_some_and(|c| c != feature.category) {
            return false;
        }
        all_match(&self.when, &MatchContext::new(&feature.id, &feature.properties))
    }

    /// Apply this rule to a feature with the given base confidence
    fn apply(&self, feature: &FeatureRecord, base: f64, namespace: &str) -> ResolvedFeature {
        let mut bindings = feature.bindings(namespace);
        merge_preserving_reserved(&mut bindings, &self.set);
        for key in &self.drop {
            if !crate::feature::RESERVED_BINDINGS.contains(&key.as_str()) {
                bindings.remove(key);
            }
        }

        let property = self.driving_property().to_string();
        let original = if property == "category" {
            Some(feature.category.as_str().into())
        } else {
            feature.properties.get(&property).cloned()
        };

        ResolvedFeature {
            feature_id: feature.id.clone(),
            kind: MappingKind::SmartAssumption,
            confidence: clamp_confidence(base * self.certainty),
            capability: self.capability.clone(),
            bindings,
            assumption: Some(Assumption {
                rule: self.name.clone(),
                property,
                original,
                capability: self.capability.clone(),
                impact: self.impact,
                certainty: self.certainty,
                description: self.description.clone(),
            }),
        }
    }
}

/// Outcome of assumption resolution
#[derive(Debug, Clone, PartialEq)]
pub enum AssumptionOutcome {
    Resolved(ResolvedFeature),
    /// No rule matched; terminal, documented limitation
    Unsupported { reason: String },
}

/// Rule-set construction errors
#[derive(Error, Debug, PartialEq)]
pub enum RuleError {
    #[error("rule '{name}' has certainty {certainty} outside [0, 1]")]
    CertaintyOutOfRange { name: String, certainty: f64 },

    #[error("rule #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("duplicate rule name '{0}'")]
    DuplicateName(String),
}

/// Ordered, first-match assumption rules
#[derive(Debug, Clone, Default)]
pub struct AssumptionEngine {
    rules: Vec<AssumptionRule>,
}

impl AssumptionEngine {
    pub fn new(rules: Vec<AssumptionRule>) -> Result<Self, RuleError> {
        let mut seen = std::collections::HashSet::new();
        for (index, rule) in rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(RuleError::EmptyName { index });
            }
            if !(0.0..=1.0).contains(&rule.certainty) {
                return Err(RuleError::CertaintyOutOfRange {
                    name: rule.name.clone(),
                    certainty: rule.certainty,
                });
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(RuleError::DuplicateName(rule.name.clone()));
            }
        }
        Ok(Self { rules })
    }

    /// Resolve a registry miss with the default base confidence
    pub fn resolve(&self, feature: &FeatureRecord, namespace: &str) -> AssumptionOutcome {
        self.resolve_with_base(feature, DEFAULT_BASE_CONFIDENCE, namespace)
    }

    /// Resolve a feature whose registry entry asked for an approximation
    pub fn resolve_entry(
        &self,
        feature: &FeatureRecord,
        entry: &MappingEntry,
        namespace: &str,
    ) -> AssumptionOutcome {
        self.resolve_with_base(feature, entry.confidence, namespace)
    }

    /// Apply the first matching rule, scaling `base` by its certainty
    pub fn resolve_with_base(
        &self,
        feature: &FeatureRecord,
        base: f64,
        namespace: &str,
    ) -> AssumptionOutcome {
        match self.rules.iter().find(|rule| rule.matches(feature)) {
            Some(rule) => {
                debug!(
                    "Assumption '{}' applied to {} -> {}",
                    rule.name, feature.id, rule.capability
                );
                AssumptionOutcome::Resolved(rule.apply(feature, base, namespace))
            }
            None => AssumptionOutcome::Unsupported {
                reason: format!("unsupported: {}", feature.category),
            },
        }
    }

    pub fn rules(&self) -> &[AssumptionRule] {
        &self.rules
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.capability.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> AssumptionEngine {
        AssumptionEngine::new(vec![
            AssumptionRule::new(
                "custom_screen_to_form",
                "modport:form_ui",
                0.6,
                ImpactLevel::High,
                "Custom screens become text-based forms",
            )
            .for_category(FeatureCategory::Gui)
            .when(Predicate::is_true("custom_screen")),
            AssumptionRule::new(
                "gui_fallback",
                "modport:form_ui",
                0.4,
                ImpactLevel::High,
                "Any other screen becomes a plain message form",
            )
            .for_category(FeatureCategory::Gui),
        ])
        .unwrap()
    }

    #[test]
    fn test_assumption_confidence_product() {
        let feature = FeatureRecord::new("mod:terminal", FeatureCategory::Gui)
            .with_property("custom_screen", true);

        let AssumptionOutcome::Resolved(resolved) = engine().resolve(&feature, "converted") else {
            panic!("expected a resolution");
        };
        assert!((resolved.confidence - 0.30).abs() < 1e-9);
        assert_eq!(resolved.kind, MappingKind::SmartAssumption);

        let assumption = resolved.assumption.unwrap();
        assert_eq!(assumption.rule, "custom_screen_to_form");
        assert_eq!(assumption.property, "custom_screen");
        assert_eq!(assumption.impact, ImpactLevel::High);
        assert!(assumption.rationale().contains("text-based forms"));
    }

    #[test]
    fn test_first_match_in_declared_order() {
        let feature = FeatureRecord::new("mod:menu", FeatureCategory::Gui);
        let AssumptionOutcome::Resolved(resolved) = engine().resolve(&feature, "converted") else {
            panic!("expected a resolution");
        };
        let assumption = resolved.assumption.unwrap();
        assert_eq!(assumption.rule, "gui_fallback");
        assert_eq!(assumption.property, "category");
        assert_eq!(assumption.original, Some("gui".into()));
    }

    #[test]
    fn test_no_rule_is_unsupported() {
        let feature = FeatureRecord::new("mod:twilight", FeatureCategory::Dimension);
        assert_eq!(
            engine().resolve(&feature, "converted"),
            AssumptionOutcome::Unsupported {
                reason: "unsupported: dimension".to_string()
            }
        );
    }

    #[test]
    fn test_entry_base_and_clamp() {
        let feature = FeatureRecord::new("mod:terminal", FeatureCategory::Gui)
            .with_property("custom_screen", true);
        let AssumptionOutcome::Resolved(resolved) =
            engine().resolve_with_base(&feature, 0.9, "converted")
        else {
            panic!("expected a resolution");
        };
        assert!((resolved.confidence - 0.54).abs() < 1e-9);

        let AssumptionOutcome::Resolved(resolved) =
            engine().resolve_with_base(&feature, 4.0, "converted")
        else {
            panic!("expected a resolution");
        };
        assert_eq!(resolved.confidence, 1.0);
    }

    #[test]
    fn test_set_and_drop_bindings() {
        let mut rule = AssumptionRule::new("r", "cap", 1.0, ImpactLevel::Low, "d");
        rule.set.insert("mode", "text");
        rule.drop.push("renderer".to_string());
        rule.drop.push("name".to_string());
        let engine = AssumptionEngine::new(vec![rule]).unwrap();

        let feature = FeatureRecord::new("mod:x", FeatureCategory::Other)
            .with_property("renderer", "custom");
        let AssumptionOutcome::Resolved(resolved) = engine.resolve(&feature, "converted") else {
            panic!("expected a resolution");
        };
        assert_eq!(resolved.bindings.get_str("mode"), Some("text"));
        assert!(!resolved.bindings.contains_key("renderer"));
        assert_eq!(resolved.bindings.get_str("name"), Some("x"));
    }

    #[test]
    fn test_rule_validation() {
        let bad = AssumptionRule::new("r", "cap", 1.5, ImpactLevel::Low, "d");
        assert!(matches!(
            AssumptionEngine::new(vec![bad]),
            Err(RuleError::CertaintyOutOfRange { .. })
        ));

        let a = AssumptionRule::new("same", "cap", 0.5, ImpactLevel::Low, "d");
        assert_eq!(
            AssumptionEngine::new(vec![a.clone(), a]).unwrap_err(),
            RuleError::DuplicateName("same".to_string())
        );
    }

    #[test]
    fn test_impact_ordering() {
        assert!(ImpactLevel::High > ImpactLevel::Medium);
        assert_eq!("HIGH".parse::<ImpactLevel>().unwrap(), ImpactLevel::High);
    }
}
