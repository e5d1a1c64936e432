// src/template/schema.rs

//! Output schema validation
//!
//! Every template declares the structure its rendered JSON must have. The
//! validator never coerces or truncates: a violation is reported as a
//! structured [`ValidationError`]. Validation cost is bounded relative to the
//! output size (see [`ValidationLimits`]).

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// JSON kind a field must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        };
        write!(f, "{}", name)
    }
}

/// A compiled regex that round-trips through its source text
#[derive(Debug, Clone)]
pub struct FieldPattern(Regex);

impl FieldPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for FieldPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for FieldPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Constraint on one field of the rendered output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Slash-separated path; array elements are addressed by index
    pub path: String,

    #[serde(default = "default_kind")]
    pub kind: FieldKind,

    #[serde(default = "default_required")]
    pub required: bool,

    /// Strings, arrays and objects must not be empty
    #[serde(default)]
    pub non_empty: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<FieldPattern>,
}

fn default_kind() -> FieldKind {
    FieldKind::Any
}

fn default_required() -> bool {
    true
}

impl FieldRule {
    pub fn new(path: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            path: path.into(),
            kind,
            required: true,
            non_empty: false,
            min: None,
            max: None,
            one_of: Vec::new(),
            pattern: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Bounds on validation work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    /// Node visits allowed per byte of output
    pub budget_per_byte: usize,
    /// Largest accepted rendered body
    pub max_output_bytes: usize,
}

impl ValidationLimits {
    /// Fixed allowance added to every budget
    pub const BASE_BUDGET: usize = 64;

    pub fn budget_for(&self, output_len: usize) -> usize {
        self.budget_per_byte
            .saturating_mul(output_len)
            .saturating_add(Self::BASE_BUDGET)
    }
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            budget_per_byte: 4,
            max_output_bytes: 1024 * 1024,
        }
    }
}

/// Rendered output violates its template's schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("output is not valid JSON: {0}")]
    Malformed(String),

    #[error("output is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("validation budget of {budget} node visits exceeded")]
    BudgetExceeded { budget: usize },

    #[error("required field '{path}' is missing")]
    MissingField { path: String },

    #[error("field '{path}' should be {expected}, found {found}")]
    WrongKind {
        path: String,
        expected: FieldKind,
        found: String,
    },

    #[error("field '{path}' must not be empty")]
    Empty { path: String },

    #[error("field '{path}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        path: String,
        value: f64,
        min: String,
        max: String,
    },

    #[error("field '{path}' value '{value}' is not one of the allowed values")]
    NotAllowed { path: String, value: String },

    #[error("field '{path}' value '{value}' does not match /{pattern}/")]
    PatternMismatch {
        path: String,
        value: String,
        pattern: String,
    },
}

/// Declared structure of a template's output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSchema {
    fields: Vec<FieldRule>,
}

fn kind_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// Counts node visits against a fixed budget
struct Budget {
    remaining: usize,
    total: usize,
}

impl Budget {
    fn new(total: usize) -> Self {
        Self {
            remaining: total,
            total,
        }
    }

    fn spend(&mut self, visits: usize) -> Result<(), ValidationError> {
        self.remaining = self
            .remaining
            .checked_sub(visits)
            .ok_or(ValidationError::BudgetExceeded { budget: self.total })?;
        Ok(())
    }
}

impl OutputSchema {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse rendered text and validate it
    pub fn validate_text(
        &self,
        text: &str,
        limits: &ValidationLimits,
    ) -> Result<Value, ValidationError> {
        if text.len() > limits.max_output_bytes {
            return Err(ValidationError::TooLarge {
                size: text.len(),
                limit: limits.max_output_bytes,
            });
        }
        let value: Value =
            serde_json::from_str(text).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        self.validate(&value, limits.budget_for(text.len()))?;
        Ok(value)
    }

    /// Validate a parsed document within `budget` node visits
    pub fn validate(&self, value: &Value, budget: usize) -> Result<(), ValidationError> {
        let mut budget = Budget::new(budget);
        count_nodes(value, &mut budget)?;

        for rule in &self.fields {
            let found = lookup(value, &rule.path, &mut budget)?;
            match found {
                None if rule.required => {
                    return Err(ValidationError::MissingField {
                        path: rule.path.clone(),
                    });
                }
                None => {}
                Some(field) => check_field(rule, field)?,
            }
        }
        Ok(())
    }
}

fn count_nodes(value: &Value, budget: &mut Budget) -> Result<(), ValidationError> {
    budget.spend(1)?;
    match value {
        Value::Array(items) => items.iter().try_for_each(|v| count_nodes(v, budget)),
        Value::Object(map) => map.values().try_for_each(|v| count_nodes(v, budget)),
        _ => Ok(()),
    }
}

fn lookup<'a>(
    root: &'a Value,
    path: &str,
    budget: &mut Budget,
) -> Result<Option<&'a Value>, ValidationError> {
    let mut current = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        budget.spend(1)?;
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

fn check_field(rule: &FieldRule, field: &Value) -> Result<(), ValidationError> {
    let path = || rule.path.clone();

    if !rule.kind.accepts(field) {
        return Err(ValidationError::WrongKind {
            path: path(),
            expected: rule.kind,
            found: kind_name(field),
        });
    }

    if rule.non_empty {
        let empty = match field {
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        };
        if empty {
            return Err(ValidationError::Empty { path: path() });
        }
    }

    if let Some(n) = field.as_f64() {
        let below = rule.min.is_some_and(|min| n < min);
        let above = rule.max.is_some_and(|max| n > max);
        if below || above {
            let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
            return Err(ValidationError::OutOfRange {
                path: path(),
                value: n,
                min: bound(rule.min),
                max: bound(rule.max),
            });
        }
    }

    if let Some(s) = field.as_str() {
        if !rule.one_of.is_empty() && !rule.one_of.iter().any(|allowed| allowed == s) {
            return Err(ValidationError::NotAllowed {
                path: path(),
                value: s.to_string(),
            });
        }
        if let Some(pattern) = &rule.pattern
            && !pattern.is_match(s)
        {
            return Err(ValidationError::PatternMismatch {
                path: path(),
                value: s.to_string(),
                pattern: pattern.as_str().to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block_schema() -> OutputSchema {
        let mut identifier = FieldRule::new("minecraft:block/description/identifier", FieldKind::String);
        identifier.pattern = Some(FieldPattern::new(r"^[a-z0-9_]+:[a-z0-9_]+$").unwrap());
        OutputSchema::new(vec![
            FieldRule::new("format_version", FieldKind::String),
            identifier,
            FieldRule::new("minecraft:block/components/light", FieldKind::Integer)
                .optional()
                .range(Some(0.0), Some(15.0)),
        ])
    }

    #[test]
    fn test_valid_document() {
        let doc = json!({
            "format_version": "1.20.0",
            "minecraft:block": {"description": {"identifier": "mod:lamp"},
                                "components": {"light": 12}}
        });
        assert!(block_schema().validate(&doc, 1000).is_ok());
    }

    #[test]
    fn test_missing_and_wrong_kind() {
        let doc = json!({"minecraft:block": {"description": {"identifier": "mod:lamp"}}});
        assert_eq!(
            block_schema().validate(&doc, 1000),
            Err(ValidationError::MissingField {
                path: "format_version".into()
            })
        );

        let doc = json!({"format_version": 1, "minecraft:block": {}});
        assert!(matches!(
            block_schema().validate(&doc, 1000),
            Err(ValidationError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_range_and_pattern() {
        let doc = json!({
            "format_version": "1.20.0",
            "minecraft:block": {"description": {"identifier": "mod:lamp"},
                                "components": {"light": 20}}
        });
        assert!(matches!(
            block_schema().validate(&doc, 1000),
            Err(ValidationError::OutOfRange { .. })
        ));

        let doc = json!({
            "format_version": "1.20.0",
            "minecraft:block": {"description": {"identifier": "Not Valid"}}
        });
        assert!(matches!(
            block_schema().validate(&doc, 1000),
            Err(ValidationError::PatternMismatch { .. })
        ));
    }

    #[test]
    fn test_budget_is_enforced() {
        let doc = json!({"a": [1, 2, 3, 4, 5, 6, 7, 8]});
        assert_eq!(
            OutputSchema::default().validate(&doc, 5),
            Err(ValidationError::BudgetExceeded { budget: 5 })
        );
    }

    #[test]
    fn test_validate_text_limits() {
        let limits = ValidationLimits {
            budget_per_byte: 4,
            max_output_bytes: 8,
        };
        assert!(matches!(
            OutputSchema::default().validate_text(r#"{"too": "long"}"#, &limits),
            Err(ValidationError::TooLarge { .. })
        ));
        assert!(matches!(
            OutputSchema::default().validate_text("{", &ValidationLimits::default()),
            Err(ValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_array_index_paths() {
        let schema = OutputSchema::new(vec![FieldRule::new("pattern/0", FieldKind::String).non_empty()]);
        assert!(schema.validate(&json!({"pattern": ["###"]}), 100).is_ok());
        assert!(matches!(
            schema.validate(&json!({"pattern": [""]}), 100),
            Err(ValidationError::Empty { .. })
        ));
    }

    #[test]
    fn test_schema_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            schema: OutputSchema,
        }
        let doc: Doc = toml::from_str(
            r#"
            [[schema]]
            path = "format_version"
            kind = "string"

            [[schema]]
            path = "minecraft:item/description/identifier"
            kind = "string"
            pattern = "^[a-z_]+:[a-z_]+$"
            "#,
        )
        .unwrap();
        assert_eq!(doc.schema.fields().len(), 2);
        assert!(doc.schema.fields()[0].required);
    }
}
