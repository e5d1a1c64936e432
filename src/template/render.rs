// src/template/render.rs

//! Template rendering
//!
//! Rendering is a pure function of a template and its bindings: the same
//! handle with the same bindings always yields byte-identical output, which is
//! what makes a retry with the fallback variant deterministic.

use super::ast::Node;
use super::schema::{ValidationError, ValidationLimits};
use super::{Template, TemplateHandle, TemplateSet};
use crate::feature::{format_number, PropertyBag, PropertyValue};
use crate::package::RESERVED_FILES;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Rendering failures; each one makes the attempt count as failed validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("template '{template}' requires parameter '{name}'")]
    MissingParameter { template: String, name: String },

    #[error("template '{template}' references undefined variable '{name}'")]
    UndefinedVariable { template: String, name: String },

    #[error("template '{template}' produced invalid path '{path}'")]
    InvalidPath { template: String, path: String },

    #[error("template '{template}' output rejected: {source}")]
    Validation {
        template: String,
        #[source]
        source: ValidationError,
    },
}

/// A rendered, validated artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedOutput {
    /// `name@version` of the template that produced it
    pub template: String,
    pub variant: String,
    /// Destination path inside the package
    pub path: String,
    /// Parsed, schema-valid content
    pub content: Value,
    /// Exact rendered text
    #[serde(skip)]
    pub text: String,
}

impl RenderedOutput {
    /// Bytes written to the package
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec_pretty(&self.content)
            .unwrap_or_else(|_| self.text.clone().into_bytes());
        bytes.push(b'\n');
        bytes
    }
}

/// How substituted values are written
#[derive(Clone, Copy)]
enum Escape {
    /// Inside a JSON document: strings escaped without surrounding quotes
    Json,
    /// Destination paths: plain text
    Plain,
}

fn write_value(out: &mut String, value: &PropertyValue, escape: Escape) {
    match value {
        PropertyValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        PropertyValue::Number(n) => out.push_str(&format_number(*n)),
        PropertyValue::Text(s) => match escape {
            Escape::Json => {
                let quoted = Value::String(s.clone()).to_string();
                out.push_str(&quoted[1..quoted.len() - 1]);
            }
            Escape::Plain => out.push_str(s),
        },
        PropertyValue::List(items) => match escape {
            Escape::Json => out.push_str(&Value::from(items.clone()).to_string()),
            Escape::Plain => out.push_str(&items.join("_")),
        },
        PropertyValue::Opaque(v) => out.push_str(&v.to_string()),
    }
}

/// Renders templates from one set under fixed validation limits
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    templates: &'a TemplateSet,
    limits: ValidationLimits,
}

impl<'a> Renderer<'a> {
    pub fn new(templates: &'a TemplateSet, limits: ValidationLimits) -> Self {
        Self { templates, limits }
    }

    /// Render and validate one template against a binding map
    pub fn render(
        &self,
        handle: TemplateHandle,
        bindings: &PropertyBag,
    ) -> Result<RenderedOutput, RenderError> {
        render_template(self.templates.get(handle), bindings, &self.limits)
    }
}

/// Render a single template
pub fn render_template(
    template: &Template,
    bindings: &PropertyBag,
    limits: &ValidationLimits,
) -> Result<RenderedOutput, RenderError> {
    let label = template.label();

    if let Some(name) = template.required().iter().find(|r| !bindings.contains_key(r)) {
        return Err(RenderError::MissingParameter {
            template: label,
            name: name.clone(),
        });
    }

    let mut scope = template.optional().clone();
    scope.extend_from(bindings);

    let mut text = String::new();
    evaluate(template.body(), &scope, Escape::Json, &label, &mut text)?;

    let mut path = String::new();
    evaluate(template.path(), &scope, Escape::Plain, &label, &mut path)?;
    let path = path.trim().to_string();
    if !is_safe_path(&path) {
        return Err(RenderError::InvalidPath {
            template: label,
            path,
        });
    }

    let content = template
        .schema()
        .validate_text(&text, limits)
        .map_err(|source| RenderError::Validation {
            template: label.clone(),
            source,
        })?;

    Ok(RenderedOutput {
        template: label,
        variant: template.variant().to_string(),
        path,
        content,
        text,
    })
}

fn evaluate(
    nodes: &[Node],
    scope: &PropertyBag,
    escape: Escape,
    label: &str,
    out: &mut String,
) -> Result<(), RenderError> {
    for node in nodes {
        match node {
            Node::Literal(text) => out.push_str(text),
            Node::Variable { name, default } => match (scope.get(name), default) {
                (Some(value), _) => write_value(out, value, escape),
                (None, Some(inline)) => out.push_str(inline),
                (None, None) => {
                    return Err(RenderError::UndefinedVariable {
                        template: label.to_string(),
                        name: name.clone(),
                    })
                }
            },
            Node::Conditional {
                key,
                negate,
                then,
                otherwise,
            } => {
                let branch = if scope.is_truthy(key) != *negate {
                    then
                } else {
                    otherwise
                };
                evaluate(branch, scope, escape, label, out)?;
            }
        }
    }
    Ok(())
}

/// Relative, non-empty, no parent traversal, not a package metadata file
fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
        && !RESERVED_FILES.contains(&path)
        && !path.starts_with('/')
        && !path.contains('\\')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::schema::{FieldKind, FieldRule, OutputSchema};
    use crate::template::tests::def;

    fn container_set() -> TemplateSet {
        let mut container = def(
            "block_container",
            "minecraft:block",
            true,
            r#"{"id": "{{namespace}}:{{name}}", "slots": {{slots}}, "label": "{{label|Chest}}"{{#if locked}}, "locked": true{{/if}}}"#,
        );
        container.required = vec!["namespace".into(), "name".into()];
        container.optional.insert("slots", 27i64);
        container.path = "blocks/{{name}}.json".into();
        container.schema = OutputSchema::new(vec![
            FieldRule::new("id", FieldKind::String).non_empty(),
            FieldRule::new("slots", FieldKind::Integer).range(Some(1.0), Some(54.0)),
        ]);
        TemplateSet::from_defs(vec![container]).unwrap()
    }

    fn bindings() -> PropertyBag {
        PropertyBag::new()
            .with("namespace", "ironchests")
            .with("name", "gold_chest")
    }

    #[test]
    fn test_render_applies_defaults_and_conditionals() {
        let set = container_set();
        let handle = set.fallback_for("minecraft:block").unwrap();
        let renderer = Renderer::new(&set, ValidationLimits::default());

        let output = renderer.render(handle, &bindings()).unwrap();
        assert_eq!(output.path, "blocks/gold_chest.json");
        assert_eq!(output.content["id"], "ironchests:gold_chest");
        assert_eq!(output.content["slots"], 27);
        assert_eq!(output.content["label"], "Chest");
        assert!(output.content.get("locked").is_none());

        let output = renderer
            .render(handle, &bindings().with("slots", 54i64).with("locked", true))
            .unwrap();
        assert_eq!(output.content["slots"], 54);
        assert_eq!(output.content["locked"], true);
    }

    #[test]
    fn test_missing_required_fails_fast() {
        let set = container_set();
        let handle = set.fallback_for("minecraft:block").unwrap();
        let err = Renderer::new(&set, ValidationLimits::default())
            .render(handle, &PropertyBag::new().with("name", "x"))
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::MissingParameter {
                template: "block_container@1.0.0".into(),
                name: "namespace".into()
            }
        );
    }

    #[test]
    fn test_strings_are_escaped() {
        let set = container_set();
        let handle = set.fallback_for("minecraft:block").unwrap();
        let output = Renderer::new(&set, ValidationLimits::default())
            .render(handle, &bindings().with("label", "Say \"hi\"\n"))
            .unwrap();
        assert_eq!(output.content["label"], "Say \"hi\"\n");
    }

    #[test]
    fn test_schema_violation_is_structured() {
        let set = container_set();
        let handle = set.fallback_for("minecraft:block").unwrap();
        let err = Renderer::new(&set, ValidationLimits::default())
            .render(handle, &bindings().with("slots", 99i64))
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Validation {
                source: ValidationError::OutOfRange { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_render_is_idempotent() {
        let set = container_set();
        let handle = set.fallback_for("minecraft:block").unwrap();
        let renderer = Renderer::new(&set, ValidationLimits::default());
        let first = renderer.render(handle, &bindings()).unwrap();
        let second = renderer.render(handle, &bindings()).unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn test_unsafe_paths_rejected() {
        assert!(is_safe_path("blocks/a.json"));
        assert!(!is_safe_path("../a.json"));
        assert!(!is_safe_path("/etc/passwd"));
        assert!(!is_safe_path("blocks//a.json"));
        assert!(!is_safe_path(""));
        assert!(!is_safe_path("manifest.json"));
        assert!(!is_safe_path("conversion-report.json"));
        assert!(is_safe_path("resource_pack/manifest.json"));
    }
}
