// src/predicate.rs

//! Property predicates
//!
//! Predicates are the matching half of every first-match table in the
//! pipeline: mapping entries, assumption rules and template variants. They
//! are a closed set of tagged variants so that definition files stay
//! declarative and evaluation stays deterministic.
//!
//! ```toml
//! when = [
//!     { op = "is_true", key = "inventory" },
//!     { op = "greater_than", key = "slots", value = 9 },
//! ]
//! ```
//!
//! Opaque property values never satisfy a predicate, and neither does a
//! negation over a missing or opaque key. Use `absent` to test for a
//! missing key.

use crate::feature::{PropertyBag, PropertyValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Glob over feature ids, compiled once at load time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdPattern(glob::Pattern);

impl IdPattern {
    pub fn new(pattern: &str) -> Result<Self, glob::PatternError> {
        glob::Pattern::new(pattern).map(Self)
    }

    pub fn matches(&self, id: &str) -> bool {
        self.0.matches(id)
    }
}

impl TryFrom<String> for IdPattern {
    type Error = glob::PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<IdPattern> for String {
    fn from(pattern: IdPattern) -> Self {
        pattern.0.as_str().to_string()
    }
}

/// What a predicate is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub id: &'a str,
    pub values: &'a PropertyBag,
}

impl<'a> MatchContext<'a> {
    pub fn new(id: &'a str, values: &'a PropertyBag) -> Self {
        Self { id, values }
    }
}

/// A single matching condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Key exists with a non-opaque value
    Present { key: String },
    /// Key does not exist
    Absent { key: String },
    /// Key is boolean `true`
    IsTrue { key: String },
    /// Key is boolean `false`
    IsFalse { key: String },
    /// Key equals the given value (same kind required)
    Equals { key: String, value: PropertyValue },
    /// String list contains the item, or string contains the substring
    Contains { key: String, item: String },
    /// String value is one of the listed values
    OneOf { key: String, values: Vec<String> },
    /// Number strictly greater than the threshold
    GreaterThan { key: String, value: f64 },
    /// Number strictly less than the threshold
    LessThan { key: String, value: f64 },
    /// Feature id matches a glob
    IdMatches { pattern: IdPattern },
    All { of: Vec<Predicate> },
    Any { of: Vec<Predicate> },
    Not { predicate: Box<Predicate> },
}

impl Predicate {
    pub fn present(key: impl Into<String>) -> Self {
        Self::Present { key: key.into() }
    }

    pub fn absent(key: impl Into<String>) -> Self {
        Self::Absent { key: key.into() }
    }

    pub fn is_true(key: impl Into<String>) -> Self {
        Self::IsTrue { key: key.into() }
    }

    pub fn equals(key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self::Equals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Evaluate against a context
    pub fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        self.evaluate(ctx) == Some(true)
    }

    /// Three-valued evaluation
    ///
    /// `None` means the predicate cannot be decided: its key is missing or
    /// holds an opaque value. Negation keeps `None`, so `not` never turns an
    /// unknown property into a match. `all`/`any` follow Kleene logic.
    pub fn evaluate(&self, ctx: &MatchContext<'_>) -> Option<bool> {
        let usable = |key: &str| ctx.values.get(key).filter(|v| !v.is_opaque());

        match self {
            Self::Present { key } => usable(key).map(|_| true),
            Self::Absent { key } => match ctx.values.get(key) {
                None => Some(true),
                Some(v) if v.is_opaque() => None,
                Some(_) => Some(false),
            },
            Self::IsTrue { key } => usable(key).map(|v| v.as_bool() == Some(true)),
            Self::IsFalse { key } => usable(key).map(|v| v.as_bool() == Some(false)),
            Self::Equals { key, value } => usable(key).map(|v| values_equal(v, value)),
            Self::Contains { key, item } => usable(key).map(|v| match v {
                PropertyValue::List(items) => items.iter().any(|i| i == item),
                PropertyValue::Text(s) => s.contains(item.as_str()),
                _ => false,
            }),
            Self::OneOf { key, values } => usable(key).map(|v| {
                v.as_str()
                    .is_some_and(|s| values.iter().any(|candidate| candidate == s))
            }),
            Self::GreaterThan { key, value } => {
                usable(key).map(|v| v.as_number().is_some_and(|n| n > *value))
            }
            Self::LessThan { key, value } => {
                usable(key).map(|v| v.as_number().is_some_and(|n| n < *value))
            }
            Self::IdMatches { pattern } => Some(pattern.matches(ctx.id)),
            Self::All { of } => {
                let mut undecided = false;
                for p in of {
                    match p.evaluate(ctx) {
                        Some(false) => return Some(false),
                        None => undecided = true,
                        Some(true) => {}
                    }
                }
                if undecided { None } else { Some(true) }
            }
            Self::Any { of } => {
                let mut undecided = false;
                for p in of {
                    match p.evaluate(ctx) {
                        Some(true) => return Some(true),
                        None => undecided = true,
                        Some(false) => {}
                    }
                }
                if undecided { None } else { Some(false) }
            }
            Self::Not { predicate } => predicate.evaluate(ctx).map(|b| !b),
        }
    }

    /// The first property key this predicate looks at, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Present { key }
            | Self::Absent { key }
            | Self::IsTrue { key }
            | Self::IsFalse { key }
            | Self::Equals { key, .. }
            | Self::Contains { key, .. }
            | Self::OneOf { key, .. }
            | Self::GreaterThan { key, .. }
            | Self::LessThan { key, .. } => Some(key),
            Self::IdMatches { .. } => None,
            Self::All { of } | Self::Any { of } => of.iter().find_map(Predicate::key),
            Self::Not { predicate } => predicate.key(),
        }
    }
}

fn values_equal(actual: &PropertyValue, expected: &PropertyValue) -> bool {
    match (actual, expected) {
        (PropertyValue::Bool(a), PropertyValue::Bool(b)) => a == b,
        (PropertyValue::Number(a), PropertyValue::Number(b)) => (a - b).abs() < f64::EPSILON,
        (PropertyValue::Text(a), PropertyValue::Text(b)) => a == b,
        (PropertyValue::List(a), PropertyValue::List(b)) => a == b,
        _ => false,
    }
}

/// Every predicate in the list matches (an empty list always matches)
pub fn all_match(predicates: &[Predicate], ctx: &MatchContext<'_>) -> bool {
    predicates.iter().all(|p| p.matches(ctx))
}

/// The key of the first predicate that names one
pub fn first_key(predicates: &[Predicate]) -> Option<&str> {
    predicates.iter().find_map(Predicate::key)
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present { key } => write!(f, "{}?", key),
            Self::Absent { key } => write!(f, "!{}?", key),
            Self::IsTrue { key } => write!(f, "{}", key),
            Self::IsFalse { key } => write!(f, "!{}", key),
            Self::Equals { key, value } => write!(f, "{} == {}", key, value),
            Self::Contains { key, item } => write!(f, "{} contains {}", key, item),
            Self::OneOf { key, values } => write!(f, "{} in [{}]", key, values.join(", ")),
            Self::GreaterThan { key, value } => write!(f, "{} > {}", key, value),
            Self::LessThan { key, value } => write!(f, "{} < {}", key, value),
            Self::IdMatches { pattern } => write!(f, "id ~ {}", pattern.0.as_str()),
            Self::All { of } => write!(f, "({})", join(of, " && ")),
            Self::Any { of } => write!(f, "({})", join(of, " || ")),
            Self::Not { predicate } => write!(f, "not {}", predicate),
        }
    }
}

fn join(predicates: &[Predicate], sep: &str) -> String {
    predicates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

/// Render a predicate list for listings (`*` when empty)
pub fn describe(predicates: &[Predicate]) -> String {
    if predicates.is_empty() {
        "*".to_string()
    } else {
        join(predicates, " && ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag() -> PropertyBag {
        PropertyBag::new()
            .with("inventory", true)
            .with("powered", false)
            .with("slots", 27.0)
            .with("material", "copper")
            .with("tags", vec!["storage".to_string(), "metal".to_string()])
            .with("extra", PropertyValue::Opaque(json!({"x": 1})))
    }

    #[test]
    fn test_basic_predicates() {
        let values = bag();
        let ctx = MatchContext::new("mod:chest", &values);

        assert!(Predicate::is_true("inventory").matches(&ctx));
        assert!(!Predicate::is_true("powered").matches(&ctx));
        assert!(Predicate::IsFalse { key: "powered".into() }.matches(&ctx));
        assert!(Predicate::present("material").matches(&ctx));
        assert!(Predicate::absent("fluid").matches(&ctx));
        assert!(Predicate::equals("material", "copper").matches(&ctx));
        assert!(!Predicate::equals("slots", "27").matches(&ctx));
        assert!(Predicate::equals("slots", 27.0).matches(&ctx));
        assert!(
            Predicate::GreaterThan { key: "slots".into(), value: 9.0 }.matches(&ctx)
        );
        assert!(
            Predicate::Contains { key: "tags".into(), item: "metal".into() }.matches(&ctx)
        );
    }

    #[test]
    fn test_opaque_never_matches() {
        let values = bag();
        let ctx = MatchContext::new("mod:chest", &values);
        assert!(!Predicate::present("extra").matches(&ctx));
        assert!(!Predicate::absent("extra").matches(&ctx));
        assert!(!Predicate::Not { predicate: Box::new(Predicate::present("slots")) }
            .matches(&ctx));

        let not_equal = Predicate::Not {
            predicate: Box::new(Predicate::equals("extra", "y")),
        };
        assert!(!not_equal.matches(&ctx));
        assert_eq!(not_equal.evaluate(&ctx), None);
        assert!(!Predicate::Not { predicate: Box::new(Predicate::absent("extra")) }
            .matches(&ctx));
    }

    #[test]
    fn test_negation_over_missing_key() {
        let values = bag();
        let ctx = MatchContext::new("mod:chest", &values);
        let not_present = Predicate::Not {
            predicate: Box::new(Predicate::present("fluid")),
        };
        assert!(!not_present.matches(&ctx));
        assert!(Predicate::absent("fluid").matches(&ctx));

        // A decided child still decides the combinator
        let any = Predicate::Any {
            of: vec![Predicate::is_true("fluid"), Predicate::is_true("inventory")],
        };
        assert_eq!(any.evaluate(&ctx), Some(true));
        let all = Predicate::All {
            of: vec![Predicate::is_true("fluid"), Predicate::is_true("powered")],
        };
        assert_eq!(all.evaluate(&ctx), Some(false));
        let undecided = Predicate::All {
            of: vec![Predicate::is_true("fluid"), Predicate::is_true("inventory")],
        };
        assert_eq!(undecided.evaluate(&ctx), None);
        assert!(!Predicate::Not { predicate: Box::new(undecided) }.matches(&ctx));
    }

    #[test]
    fn test_id_glob_and_combinators() {
        let values = bag();
        let ctx = MatchContext::new("examplemod:copper_chest", &values);
        let pred = Predicate::All {
            of: vec![
                Predicate::IdMatches { pattern: IdPattern::new("examplemod:*").unwrap() },
                Predicate::Any {
                    of: vec![Predicate::is_true("powered"), Predicate::is_true("inventory")],
                },
            ],
        };
        assert!(pred.matches(&ctx));
        assert_eq!(pred.key(), Some("powered"));
    }

    #[test]
    fn test_empty_list_matches() {
        let values = PropertyBag::new();
        assert!(all_match(&[], &MatchContext::new("x", &values)));
    }

    #[test]
    fn test_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            when: Vec<Predicate>,
        }
        let doc: Doc = toml::from_str(
            r#"
            when = [
                { op = "is_true", key = "inventory" },
                { op = "one_of", key = "material", values = ["copper", "iron"] },
                { op = "not", predicate = { op = "equals", key = "material", value = "iron" } },
            ]
            "#,
        )
        .unwrap();
        let values = bag();
        assert!(all_match(&doc.when, &MatchContext::new("x", &values)));
        assert_eq!(first_key(&doc.when), Some("inventory"));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let result: Result<Predicate, _> =
            serde_json::from_str(r#"{"op": "id_matches", "pattern": "[unclosed"}"#);
        assert!(result.is_err());
    }
}
