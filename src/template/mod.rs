// src/template/mod.rs

//! Output templates
//!
//! A template is a named, versioned stencil producing one target-format
//! artifact for one target capability. Templates are loaded once at start-up
//! and are immutable afterwards; several variants may exist per capability,
//! exactly one of which is the fallback.
//!
//! ```toml
//! [[template]]
//! name = "block_container"
//! version = "1.0.0"
//! capability = "minecraft:block"
//! variant = "container"
//! when = [{ op = "is_true", key = "inventory" }]
//! path = "blocks/{{name}}.json"
//! required = ["namespace", "name"]
//! optional = { slots = 27 }
//! body = '''{ "format_version": "1.20.0", ... }'''
//!
//! [[template.schema]]
//! path = "format_version"
//! kind = "string"
//! ```

pub mod ast;
mod render;
pub mod schema;
mod selector;

pub use ast::{Node, TemplateError};
pub use render::{render_template, RenderError, RenderedOutput, Renderer};
pub use schema::{FieldKind, FieldRule, OutputSchema, ValidationError, ValidationLimits};
pub use selector::{SelectionError, TemplateSelector};

use crate::feature::PropertyBag;
use crate::predicate::Predicate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Declarative template definition as written in definition files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDef {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    pub capability: String,

    #[serde(default = "default_variant")]
    pub variant: String,

    /// Predicates over the resolved bindings
    #[serde(default)]
    pub when: Vec<Predicate>,

    /// The capability's default variant
    #[serde(default)]
    pub fallback: bool,

    /// Destination path pattern
    pub path: String,

    #[serde(default)]
    pub required: Vec<String>,

    /// Optional parameters with their defaults
    #[serde(default)]
    pub optional: PropertyBag,

    pub body: String,

    #[serde(default)]
    pub schema: OutputSchema,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_variant() -> String {
    "basic".to_string()
}

/// A compiled template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    def: TemplateDef,
    body: Vec<Node>,
    path: Vec<Node>,
}

/// Template compilation and set errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateSetError {
    #[error("template '{name}' body: {source}")]
    Body {
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error("template '{name}' path: {source}")]
    Path {
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error("template '{name}' declares '{param}' as both required and optional")]
    ConflictingParameter { name: String, param: String },

    #[error("duplicate template '{name}' version {version}")]
    Duplicate { name: String, version: String },

    #[error("capability '{0}' has no fallback template")]
    NoFallback(String),

    #[error("template '{name}' declares '{param}' but never references it")]
    UnusedParameter { name: String, param: String },

    #[error("capability '{capability}' has several fallback templates: {names}")]
    MultipleFallbacks { capability: String, names: String },
}

impl Template {
    /// Parse the body and path of a definition
    pub fn compile(def: TemplateDef) -> Result<Self, TemplateSetError> {
        let body = ast::parse(&def.body).map_err(|source| TemplateSetError::Body {
            name: def.name.clone(),
            source,
        })?;
        let path = ast::parse(&def.path).map_err(|source| TemplateSetError::Path {
            name: def.name.clone(),
            source,
        })?;

        if let Some(param) = def.required.iter().find(|r| def.optional.contains_key(r)) {
            return Err(TemplateSetError::ConflictingParameter {
                name: def.name.clone(),
                param: param.clone(),
            });
        }

        let mut referenced = ast::referenced_names(&body);
        referenced.extend(ast::referenced_names(&path));
        let declared = def.required.iter().chain(def.optional.keys());
        if let Some(param) = declared.into_iter().find(|p| !referenced.contains(p.as_str())) {
            return Err(TemplateSetError::UnusedParameter {
                name: def.name.clone(),
                param: param.clone(),
            });
        }

        Ok(Self { def, body, path })
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn version(&self) -> &str {
        &self.def.version
    }

    pub fn capability(&self) -> &str {
        &self.def.capability
    }

    pub fn variant(&self) -> &str {
        &self.def.variant
    }

    pub fn is_fallback(&self) -> bool {
        self.def.fallback
    }

    pub fn when(&self) -> &[Predicate] {
        &self.def.when
    }

    pub fn required(&self) -> &[String] {
        &self.def.required
    }

    pub fn optional(&self) -> &PropertyBag {
        &self.def.optional
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.def.schema
    }

    pub fn body(&self) -> &[Node] {
        &self.body
    }

    pub fn path(&self) -> &[Node] {
        &self.path
    }

    pub fn definition(&self) -> &TemplateDef {
        &self.def
    }

    /// `name@version`
    pub fn label(&self) -> String {
        format!("{}@{}", self.def.name, self.def.version)
    }
}

/// Opaque reference to a template inside a [`TemplateSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateHandle(usize);

/// All templates, grouped by capability in declaration order
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: Vec<Template>,
    by_capability: BTreeMap<String, Vec<usize>>,
}

impl TemplateSet {
    /// Build a set, requiring exactly one fallback per capability
    pub fn new(templates: Vec<Template>) -> Result<Self, TemplateSetError> {
        let mut by_capability: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut seen = std::collections::HashSet::new();

        for (index, template) in templates.iter().enumerate() {
            if !seen.insert((template.name(), template.version())) {
                return Err(TemplateSetError::Duplicate {
                    name: template.name().to_string(),
                    version: template.version().to_string(),
                });
            }
            by_capability
                .entry(template.capability().to_string())
                .or_default()
                .push(index);
        }

        for (capability, indices) in &by_capability {
            let fallbacks: Vec<&str> = indices
                .iter()
                .map(|&i| &templates[i])
                .filter(|t| t.is_fallback())
                .map(Template::name)
                .collect();
            match fallbacks.len() {
                0 => return Err(TemplateSetError::NoFallback(capability.clone())),
                1 => {}
                _ => {
                    return Err(TemplateSetError::MultipleFallbacks {
                        capability: capability.clone(),
                        names: fallbacks.join(", "),
                    })
                }
            }
        }

        Ok(Self {
            templates,
            by_capability,
        })
    }

    /// Compile definitions and build a set
    pub fn from_defs(defs: Vec<TemplateDef>) -> Result<Self, TemplateSetError> {
        let templates = defs
            .into_iter()
            .map(Template::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(templates)
    }

    pub fn get(&self, handle: TemplateHandle) -> &Template {
        &self.templates[handle.0]
    }

    /// Handles for one capability in declaration order
    pub fn handles_for(&self, capability: &str) -> impl Iterator<Item = TemplateHandle> + '_ {
        self.by_capability
            .get(capability)
            .into_iter()
            .flatten()
            .map(|&i| TemplateHandle(i))
    }

    /// The capability's fallback variant
    pub fn fallback_for(&self, capability: &str) -> Option<TemplateHandle> {
        self.handles_for(capability)
            .find(|&h| self.get(h).is_fallback())
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.by_capability.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn def(name: &str, capability: &str, fallback: bool, body: &str) -> TemplateDef {
        TemplateDef {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            capability: capability.to_string(),
            variant: if fallback { "basic" } else { "special" }.to_string(),
            when: Vec::new(),
            fallback,
            path: format!("out/{}/{{{{name}}}}.json", name),
            required: vec!["name".to_string()],
            optional: PropertyBag::new(),
            body: body.to_string(),
            schema: OutputSchema::default(),
        }
    }

    #[test]
    fn test_set_requires_one_fallback() {
        let err = TemplateSet::from_defs(vec![def("a", "cap", false, "{}")]).unwrap_err();
        assert_eq!(err, TemplateSetError::NoFallback("cap".into()));

        let err = TemplateSet::from_defs(vec![def("a", "cap", true, "{}"), def("b", "cap", true, "{}")])
            .unwrap_err();
        assert!(matches!(err, TemplateSetError::MultipleFallbacks { .. }));
    }

    #[test]
    fn test_fallback_lookup() {
        let set = TemplateSet::from_defs(vec![
            def("special", "cap", false, "{}"),
            def("basic", "cap", true, "{}"),
        ])
        .unwrap();
        let handle = set.fallback_for("cap").unwrap();
        assert_eq!(set.get(handle).name(), "basic");
        assert_eq!(set.handles_for("cap").count(), 2);
        assert!(set.fallback_for("other").is_none());
    }

    #[test]
    fn test_compile_errors_name_template() {
        let err = Template::compile(def("broken", "cap", true, "{{#if x}}")).unwrap_err();
        assert!(matches!(err, TemplateSetError::Body { ref name, .. } if name == "broken"));

        let mut conflicting = def("c", "cap", true, "{}");
        conflicting.optional.insert("name", "x");
        assert!(matches!(
            Template::compile(conflicting),
            Err(TemplateSetError::ConflictingParameter { .. })
        ));
    }

    #[test]
    fn test_declared_parameters_must_be_referenced() {
        let mut unused = def("stale", "cap", true, r#"{"name": "{{name}}"}"#);
        unused.optional.insert("slots", 27i64);
        assert_eq!(
            Template::compile(unused).unwrap_err(),
            TemplateSetError::UnusedParameter {
                name: "stale".into(),
                param: "slots".into(),
            }
        );

        // Condition keys and the path both count as references
        let mut used = def("ok", "cap", true, r#"{{#if slots}}{"full": true}{{else}}{}{{/if}}"#);
        used.optional.insert("slots", 27i64);
        assert!(Template::compile(used).is_ok());
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = TemplateSet::from_defs(vec![def("a", "cap", true, "{}"), def("a", "cap2", true, "{}")])
            .unwrap_err();
        assert!(matches!(err, TemplateSetError::Duplicate { .. }));
    }
}
