// src/config.rs

//! `modport.toml` configuration
//!
//! Every field has a default, so an empty or missing file is valid.
//! Command-line flags override file values.
//!
//! ```toml
//! [pipeline]
//! workers = 8
//! namespace = "mymod"
//! fallback_penalty = 0.8
//!
//! [definitions]
//! paths = ["./definitions"]
//! include_builtin = true
//!
//! [output]
//! pack_name = "My converted mod"
//! ```

use crate::package::PackageOptions;
use crate::pipeline::{PipelineOptions, DEFAULT_FALLBACK_PENALTY};
use crate::template::ValidationLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "modport.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModportConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub definitions: DefinitionsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker threads (0 = one per CPU)
    #[serde(default)]
    pub workers: usize,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_fallback_penalty")]
    pub fallback_penalty: f64,

    #[serde(default = "default_budget_per_byte")]
    pub budget_per_byte: usize,

    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_namespace() -> String {
    "converted".to_string()
}

fn default_fallback_penalty() -> f64 {
    DEFAULT_FALLBACK_PENALTY
}

fn default_budget_per_byte() -> usize {
    ValidationLimits::default().budget_per_byte
}

fn default_max_output_bytes() -> usize {
    ValidationLimits::default().max_output_bytes
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            namespace: default_namespace(),
            fallback_penalty: default_fallback_penalty(),
            budget_per_byte: default_budget_per_byte(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionsConfig {
    /// Extra definition directories, loaded after the built-in set
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    #[serde(default = "default_true")]
    pub include_builtin: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            include_builtin: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_pack_name")]
    pub pack_name: String,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default)]
    pub overwrite: bool,

    /// Record referenced textures, sounds and models
    #[serde(default = "default_true")]
    pub assets: bool,
}

fn default_pack_name() -> String {
    PackageOptions::default().name
}

fn default_description() -> String {
    PackageOptions::default().description
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pack_name: default_pack_name(),
            description: default_description(),
            overwrite: false,
            assets: true,
        }
    }
}

impl ModportConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        let p = &self.pipeline;
        if !(0.0..=1.0).contains(&p.fallback_penalty) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.fallback_penalty must be within [0, 1], got {}",
                p.fallback_penalty
            )));
        }
        if p.workers > 1024 {
            return Err(ConfigError::Invalid(format!(
                "pipeline.workers must be at most 1024, got {}",
                p.workers
            )));
        }
        if p.budget_per_byte == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.budget_per_byte must be positive".to_string(),
            ));
        }
        if p.max_output_bytes == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_output_bytes must be positive".to_string(),
            ));
        }
        if p.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "pipeline.namespace must not be empty".to_string(),
            ));
        }
        if !self.definitions.include_builtin && self.definitions.paths.is_empty() {
            return Err(ConfigError::Invalid(
                "definitions.include_builtin is false and no definition paths are set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn limits(&self) -> ValidationLimits {
        ValidationLimits {
            budget_per_byte: self.pipeline.budget_per_byte,
            max_output_bytes: self.pipeline.max_output_bytes,
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::default()
            .workers(self.pipeline.workers)
            .namespace(self.pipeline.namespace.clone())
            .fallback_penalty(self.pipeline.fallback_penalty)
            .limits(self.limits())
    }

    pub fn package_options(&self) -> PackageOptions {
        PackageOptions {
            name: self.output.pack_name.clone(),
            description: self.output.description.clone(),
            overwrite: self.output.overwrite,
        }
    }
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> ConfigResult<ModportConfig> {
    let config: ModportConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load a config file, or `modport.toml` in the working directory if present
///
/// An explicit path must exist; the implicit default file may be absent.
pub fn load_config(path: Option<&Path>) -> ConfigResult<ModportConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(ModportConfig::default());
            }
            default
        }
    };
    debug!("Loading config from {}", path.display());
    let content = std::fs::read_to_string(&path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, ModportConfig::default());
        assert_eq!(config.pipeline.fallback_penalty, 0.8);
        assert!(config.definitions.include_builtin);
    }

    #[test]
    fn test_parse_sections() {
        let config = parse_config(
            r#"
            [pipeline]
            workers = 4
            namespace = "ironchests"

            [definitions]
            paths = ["defs"]

            [output]
            pack_name = "Iron Chests"
            overwrite = true
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.workers, 4);
        assert_eq!(config.pipeline_options().namespace, "ironchests");
        assert_eq!(config.definitions.paths, vec![PathBuf::from("defs")]);
        assert!(config.package_options().overwrite);
        assert_eq!(config.package_options().name, "Iron Chests");
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            parse_config("[pipeline]\nfallback_penalty = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("[definitions]\ninclude_builtin = false"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            parse_config("[pipeline\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("modport.toml");
        std::fs::write(&path, "[pipeline]\nworkers = 2\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().pipeline.workers, 2);
        assert!(matches!(
            load_config(Some(&temp.path().join("missing.toml"))),
            Err(ConfigError::ReadError(_))
        ));
    }
}
