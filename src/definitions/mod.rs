// src/definitions/mod.rs

//! Declarative definition sets
//!
//! Mapping entries, assumption rules and templates are loaded once at start-up
//! from versioned TOML files and are read-only afterwards. A directory of
//! definition files is read in lexical file-name order and concatenated, so
//! declaration order (the only tie-break in every first-match table) is file
//! order, then in-file order.
//!
//! # Example
//!
//! ```toml
//! version = 1
//!
//! [[mapping]]
//! category = "block"
//! when = [{ op = "is_true", key = "inventory" }]
//! capability = "minecraft:block"
//! kind = "direct"
//! confidence = 0.95
//!
//! [[rule]]
//! name = "custom_screen_to_form"
//! category = "gui"
//! when = [{ op = "is_true", key = "custom_screen" }]
//! capability = "modport:form_ui"
//! certainty = 0.6
//! impact = "high"
//! description = "Custom screens become text-based forms"
//! ```
//!
//! Load-time validation guarantees that template selection is total: every
//! capability a mapping or rule can produce has exactly one fallback template.

use crate::assumption::{AssumptionEngine, AssumptionRule, RuleError};
use crate::mapping::{MappingEntry, MappingKind, MappingRegistry, RegistryError};
use crate::template::{TemplateDef, TemplateSet, TemplateSetError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Current definition file version
pub const DEFINITION_VERSION: u32 = 1;

const BUILTIN_MAPPINGS: &str = include_str!("../../definitions/mappings.toml");
const BUILTIN_RULES: &str = include_str!("../../definitions/rules.toml");
const BUILTIN_TEMPLATES: &str = include_str!("../../definitions/templates.toml");

/// Errors raised while loading or validating definitions
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Failed to read definition file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse definition file {origin}: {source}")]
    Parse {
        origin: String,
        source: toml::de::Error,
    },

    #[error("Invalid definition version in {origin}: expected {expected}, found {found}")]
    VersionMismatch {
        origin: String,
        expected: u32,
        found: u32,
    },

    #[error("Invalid definition file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("No definition files found in {0}")]
    NoFiles(PathBuf),

    #[error("Mapping registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("Assumption rules: {0}")]
    Rules(#[from] RuleError),

    #[error("Templates: {0}")]
    Templates(#[from] TemplateSetError),

    #[error("Capability '{capability}' used by {referrer} has no fallback template")]
    MissingTemplate {
        capability: String,
        referrer: String,
    },
}

/// Result type for definition loading
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// One definition file on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionFile {
    pub version: u32,

    #[serde(default)]
    pub mapping: Vec<MappingEntry>,

    #[serde(default)]
    pub rule: Vec<AssumptionRule>,

    #[serde(default)]
    pub template: Vec<TemplateDef>,
}

impl DefinitionFile {
    /// Parse one file's content; `origin` names it in errors
    pub fn parse(content: &str, origin: &str) -> DefinitionResult<Self> {
        let file: DefinitionFile =
            toml::from_str(content).map_err(|source| DefinitionError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        if file.version != DEFINITION_VERSION {
            return Err(DefinitionError::VersionMismatch {
                origin: origin.to_string(),
                expected: DEFINITION_VERSION,
                found: file.version,
            });
        }
        Ok(file)
    }

    pub fn load(path: &Path) -> DefinitionResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Append another file's declarations after this one's
    pub fn merge(&mut self, other: DefinitionFile) {
        self.mapping.extend(other.mapping);
        self.rule.extend(other.rule);
        self.template.extend(other.template);
    }
}

/// The read-only tables shared by every pipeline worker
#[derive(Debug, Clone)]
pub struct Definitions {
    pub registry: MappingRegistry,
    pub engine: AssumptionEngine,
    pub templates: TemplateSet,
}

/// Counts shown by `modport check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DefinitionStats {
    pub mappings: usize,
    pub rules: usize,
    pub templates: usize,
    pub capabilities: usize,
}

impl Definitions {
    /// Build validated definitions from a merged definition file
    pub fn from_file(file: DefinitionFile) -> DefinitionResult<Self> {
        let registry = MappingRegistry::new(file.mapping)?;
        let engine = AssumptionEngine::new(file.rule)?;
        let templates = TemplateSet::from_defs(file.template)?;
        let definitions = Self::from_parts(registry, engine, templates);
        definitions.check_totality()?;
        Ok(definitions)
    }

    /// Assemble definitions without the selection totality check
    pub fn from_parts(
        registry: MappingRegistry,
        engine: AssumptionEngine,
        templates: TemplateSet,
    ) -> Self {
        Self {
            registry,
            engine,
            templates,
        }
    }

    /// The definition set shipped with modport
    pub fn builtin() -> DefinitionResult<Self> {
        Self::from_file(builtin_file()?)
    }

    /// Load every `*.toml` in `dir`, in lexical order
    pub fn load_dir(dir: &Path) -> DefinitionResult<Self> {
        Self::from_file(load_dir_file(dir)?)
    }

    /// Load several sources in order, optionally starting from the built-in set
    pub fn load(dirs: &[PathBuf], include_builtin: bool) -> DefinitionResult<Self> {
        let mut merged = if include_builtin {
            builtin_file()?
        } else {
            DefinitionFile {
                version: DEFINITION_VERSION,
                ..Default::default()
            }
        };
        for dir in dirs {
            merged.merge(load_dir_file(dir)?);
        }

        let definitions = Self::from_file(merged)?;
        info!(
            "Loaded {} mappings, {} rules, {} templates",
            definitions.registry.len(),
            definitions.engine.len(),
            definitions.templates.len()
        );
        Ok(definitions)
    }

    /// Every capability a mapping or rule can produce must have a fallback
    fn check_totality(&self) -> DefinitionResult<()> {
        for entry in self.registry.entries() {
            if entry.kind == MappingKind::Unsupported || entry.kind == MappingKind::SmartAssumption
            {
                continue;
            }
            if self.templates.fallback_for(&entry.capability).is_none() {
                return Err(DefinitionError::MissingTemplate {
                    capability: entry.capability.clone(),
                    referrer: format!("{} mapping", entry.category),
                });
            }
        }
        for rule in self.engine.rules() {
            if self.templates.fallback_for(&rule.capability).is_none() {
                return Err(DefinitionError::MissingTemplate {
                    capability: rule.capability.clone(),
                    referrer: format!("rule '{}'", rule.name),
                });
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> DefinitionStats {
        DefinitionStats {
            mappings: self.registry.len(),
            rules: self.engine.len(),
            templates: self.templates.len(),
            capabilities: self.templates.capabilities().count(),
        }
    }
}

fn builtin_file() -> DefinitionResult<DefinitionFile> {
    let mut merged = DefinitionFile::parse(BUILTIN_MAPPINGS, "builtin:mappings.toml")?;
    merged.merge(DefinitionFile::parse(BUILTIN_RULES, "builtin:rules.toml")?);
    merged.merge(DefinitionFile::parse(BUILTIN_TEMPLATES, "builtin:templates.toml")?);
    Ok(merged)
}

fn load_dir_file(dir: &Path) -> DefinitionResult<DefinitionFile> {
    let pattern = dir.join("*.toml");
    let mut paths = Vec::new();
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry.map_err(|e| DefinitionError::Io {
            path: e.path().to_path_buf(),
            source: e.into(),
        })?;
        paths.push(path);
    }
    paths.sort();

    if paths.is_empty() {
        return Err(DefinitionError::NoFiles(dir.to_path_buf()));
    }

    let mut merged = DefinitionFile {
        version: DEFINITION_VERSION,
        ..Default::default()
    };
    for path in &paths {
        debug!("Loading definitions from {}", path.display());
        merged.merge(DefinitionFile::load(path)?);
    }
    Ok(merged)
}
