// src/feature/mod.rs

//! Feature records produced by the external extractor
//!
//! A feature record is one detected unit of source mod behavior (a block, an
//! item, a recipe, a custom screen...). Records are immutable once loaded and
//! are owned by the pipeline for the duration of one conversion job.
//!
//! # Input format
//!
//! ```json
//! {
//!   "features": [
//!     {
//!       "id": "examplemod:copper_chest",
//!       "category": "block",
//!       "properties": { "inventory": true, "slots": 27 },
//!       "source": { "file": "CopperChestBlock.java", "line": 42 }
//!     }
//!   ]
//! }
//! ```
//!
//! A bare JSON array of records is accepted as well.

mod properties;

pub use properties::{format_number, PropertyBag, PropertyValue};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Binding keys derived from the record itself; properties cannot override them
pub const RESERVED_BINDINGS: &[&str] = &["feature_id", "category", "namespace", "name"];

/// Errors raised while loading a feature set
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Failed to read feature file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse feature file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Feature at position {0} has an empty id")]
    EmptyId(usize),
}

/// Feature category as reported by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureCategory {
    Block,
    Item,
    Entity,
    Recipe,
    Dimension,
    Machinery,
    Gui,
    Other,
}

impl FeatureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Item => "item",
            Self::Entity => "entity",
            Self::Recipe => "recipe",
            Self::Dimension => "dimension",
            Self::Machinery => "machinery",
            Self::Gui => "gui",
            Self::Other => "other",
        }
    }

    pub fn all() -> &'static [FeatureCategory] {
        &[
            Self::Block,
            Self::Item,
            Self::Entity,
            Self::Recipe,
            Self::Dimension,
            Self::Machinery,
            Self::Gui,
            Self::Other,
        ]
    }

    /// Lenient parse used for extractor input: unknown names become `Other`
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Self::Other)
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FeatureCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "item" => Ok(Self::Item),
            "entity" => Ok(Self::Entity),
            "recipe" => Ok(Self::Recipe),
            "dimension" => Ok(Self::Dimension),
            "machinery" => Ok(Self::Machinery),
            "gui" => Ok(Self::Gui),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown feature category: {}", s)),
        }
    }
}

fn lenient_category<'de, D>(deserializer: D) -> Result<FeatureCategory, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(FeatureCategory::parse_lenient(&raw))
}

/// Where in the original mod a feature was found (reporting only)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let file = self.file.as_deref().unwrap_or("<unknown>");
        match (self.line, &self.symbol) {
            (Some(line), Some(symbol)) => write!(f, "{}:{} ({})", file, line, symbol),
            (Some(line), None) => write!(f, "{}:{}", file, line),
            (None, Some(symbol)) => write!(f, "{} ({})", file, symbol),
            (None, None) => write!(f, "{}", file),
        }
    }
}

/// One detected unit of source behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Stable identifier, usually `namespace:name`
    pub id: String,

    #[serde(deserialize_with = "lenient_category")]
    pub category: FeatureCategory,

    #[serde(default)]
    pub properties: PropertyBag,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLocation>,
}

static NAME_SANITIZER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_]+").expect("valid sanitizer pattern"));

/// Lowercase and replace anything outside `[a-z0-9_]` with `_`
pub fn sanitize_name(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let cleaned = NAME_SANITIZER.replace_all(&lowered, "_");
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

impl FeatureRecord {
    pub fn new(id: impl Into<String>, category: FeatureCategory) -> Self {
        Self {
            id: id.into(),
            category,
            properties: PropertyBag::new(),
            source: None,
        }
    }

    /// Builder-style property insert
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// Split the id into `(namespace, name)`, both sanitized
    pub fn namespace_and_name(&self, default_namespace: &str) -> (String, String) {
        match self.id.split_once(':') {
            Some((ns, name)) if !ns.trim().is_empty() => (sanitize_name(ns), sanitize_name(name)),
            Some((_, name)) => (sanitize_name(default_namespace), sanitize_name(name)),
            None => (sanitize_name(default_namespace), sanitize_name(&self.id)),
        }
    }

    /// Initial parameter bindings for this feature
    ///
    /// All properties are carried over (opaque ones included), then the
    /// reserved keys are set from the record itself.
    pub fn bindings(&self, default_namespace: &str) -> PropertyBag {
        let mut bindings = self.properties.clone();
        let (namespace, name) = self.namespace_and_name(default_namespace);
        bindings.insert("feature_id", self.id.as_str());
        bindings.insert("category", self.category.as_str());
        bindings.insert("namespace", namespace);
        bindings.insert("name", name);
        bindings
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureDocument {
    Wrapped { features: Vec<FeatureRecord> },
    Bare(Vec<FeatureRecord>),
}

/// Parse a feature set from a JSON string
pub fn parse_features(content: &str) -> Result<Vec<FeatureRecord>, FeatureError> {
    let features = match serde_json::from_str::<FeatureDocument>(content)? {
        FeatureDocument::Wrapped { features } => features,
        FeatureDocument::Bare(features) => features,
    };

    if let Some(pos) = features.iter().position(|f| f.id.trim().is_empty()) {
        return Err(FeatureError::EmptyId(pos));
    }

    Ok(features)
}

/// Load a feature set from a JSON file
pub fn load_features(path: &Path) -> Result<Vec<FeatureRecord>, FeatureError> {
    let content = std::fs::read_to_string(path)?;
    parse_features(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_document() {
        let json = r#"{
            "features": [
                {"id": "examplemod:copper_chest", "category": "block",
                 "properties": {"inventory": true},
                 "source": {"file": "CopperChest.java", "line": 12}}
            ]
        }"#;
        let features = parse_features(json).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].category, FeatureCategory::Block);
        assert_eq!(features[0].properties.get_bool("inventory"), Some(true));
        assert_eq!(
            features[0].source.as_ref().unwrap().to_string(),
            "CopperChest.java:12"
        );
    }

    #[test]
    fn test_parse_bare_array_and_unknown_category() {
        let json = r#"[{"id": "a", "category": "Wormhole"}]"#;
        let features = parse_features(json).unwrap();
        assert_eq!(features[0].category, FeatureCategory::Other);
        assert!(features[0].properties.is_empty());
    }

    #[test]
    fn test_empty_id_rejected() {
        let json = r#"[{"id": "ok", "category": "item"}, {"id": " ", "category": "item"}]"#;
        assert!(matches!(parse_features(json), Err(FeatureError::EmptyId(1))));
    }

    #[test]
    fn test_namespace_and_name() {
        let feature = FeatureRecord::new("ExampleMod:Copper Chest", FeatureCategory::Block);
        assert_eq!(
            feature.namespace_and_name("converted"),
            ("examplemod".to_string(), "copper_chest".to_string())
        );

        let bare = FeatureRecord::new("ruby", FeatureCategory::Item);
        assert_eq!(
            bare.namespace_and_name("converted"),
            ("converted".to_string(), "ruby".to_string())
        );
    }

    #[test]
    fn test_bindings_reserve_derived_keys() {
        let feature = FeatureRecord::new("mod:lamp", FeatureCategory::Block)
            .with_property("name", "Fancy Lamp")
            .with_property("light_level", 15.0);
        let bindings = feature.bindings("converted");
        assert_eq!(bindings.get_str("name"), Some("lamp"));
        assert_eq!(bindings.get_str("namespace"), Some("mod"));
        assert_eq!(bindings.get_str("category"), Some("block"));
        assert_eq!(bindings.get_number("light_level"), Some(15.0));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Iron--Gear!"), "iron_gear");
        assert_eq!(sanitize_name("***"), "unnamed");
    }
}
