// src/package/mod.rs

//! Package writer
//!
//! Lays a finished job out on disk:
//!
//! ```text
//! <output>/
//! ├── manifest.json            pack header (name, uuid, timestamp)
//! ├── modport-manifest.json    package path -> SHA-256, asset destinations
//! ├── conversion-report.json   the full report
//! └── behavior_pack/...        one file per converted or partial feature
//! ```

mod assets;

pub use assets::{
    collect_assets, transcode_all, AssetError, AssetKind, AssetRecord, AssetRef,
    AssetTranscoder, PassthroughTranscoder,
};

use crate::report::ConversionReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Pack header format version
pub const PACK_FORMAT_VERSION: u32 = 2;

pub const HEADER_FILE: &str = "manifest.json";
pub const CHECKSUM_FILE: &str = "modport-manifest.json";
pub const REPORT_FILE: &str = "conversion-report.json";

/// Package-level files no rendered output may replace
pub const RESERVED_FILES: &[&str] = &[HEADER_FILE, CHECKSUM_FILE, REPORT_FILE];

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize {0}: {1}")]
    Serialize(&'static str, serde_json::Error),

    #[error("Output directory {0} is not empty (use --force to overwrite)")]
    NotEmpty(PathBuf),

    #[error("Refusing to write outside the package: {0}")]
    UnsafePath(String),

    #[error("Output path {0} is reserved for package metadata")]
    ReservedPath(String),
}

/// Pack identity written to `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackHeader {
    pub format_version: u32,
    pub name: String,
    pub description: String,
    pub uuid: String,
    pub version: [u32; 3],
    pub generator: String,
    pub generated_at: DateTime<Utc>,
}

impl PackHeader {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            format_version: PACK_FORMAT_VERSION,
            name: name.into(),
            description: description.into(),
            uuid: uuid::Uuid::new_v4().to_string(),
            version: [1, 0, 0],
            generator: format!("modport {}", env!("CARGO_PKG_VERSION")),
            generated_at: Utc::now(),
        }
    }
}

/// Checksum manifest written to `modport-manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksumManifest {
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub assets: Vec<AssetDestination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDestination {
    pub source: String,
    pub destination: String,
}

/// Options for writing a package
#[derive(Debug, Clone)]
pub struct PackageOptions {
    pub name: String,
    pub description: String,
    /// Write into a non-empty directory
    pub overwrite: bool,
}

impl Default for PackageOptions {
    fn default() -> Self {
        Self {
            name: "Converted pack".to_string(),
            description: "Generated by modport".to_string(),
            overwrite: false,
        }
    }
}

/// What was written
#[derive(Debug, Clone)]
pub struct WrittenPackage {
    pub root: PathBuf,
    pub header: PackHeader,
    pub files: usize,
}

/// Writes reports and rendered outputs into a package directory
pub struct PackageWriter {
    root: PathBuf,
    options: PackageOptions,
}

impl PackageWriter {
    pub fn new(root: impl Into<PathBuf>, options: PackageOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn write(
        &self,
        report: &ConversionReport,
        assets: &[AssetRecord],
    ) -> Result<WrittenPackage, PackageError> {
        let targets = report
            .manifest
            .iter()
            .map(|entry| self.resolve(&entry.path).map(|target| (target, entry)))
            .collect::<Result<Vec<_>, PackageError>>()?;
        self.prepare_root()?;

        for (target, entry) in targets {
            debug!("Writing {}", target.display());
            write_file(&target, &entry.bytes)?;
        }

        let header = PackHeader::new(&self.options.name, &self.options.description);
        write_json(&self.root.join(HEADER_FILE), HEADER_FILE, &header)?;

        let checksums = ChecksumManifest {
            files: report
                .checksums()
                .into_iter()
                .map(|(path, sum)| (path.to_string(), sum.to_string()))
                .collect(),
            assets: assets
                .iter()
                .map(|a| AssetDestination {
                    source: a.source.clone(),
                    destination: a.destination.clone(),
                })
                .collect(),
        };
        write_json(&self.root.join(CHECKSUM_FILE), CHECKSUM_FILE, &checksums)?;

        let report_json = report
            .to_json()
            .map_err(|e| PackageError::Serialize(REPORT_FILE, e))?;
        write_file(&self.root.join(REPORT_FILE), report_json.as_bytes())?;

        info!(
            "Wrote {} files to {}",
            report.manifest.len(),
            self.root.display()
        );
        Ok(WrittenPackage {
            root: self.root.clone(),
            header,
            files: report.manifest.len(),
        })
    }

    fn prepare_root(&self) -> Result<(), PackageError> {
        let io_err = |source| PackageError::Io {
            path: self.root.clone(),
            source,
        };
        if self.root.exists() {
            let mut entries = std::fs::read_dir(&self.root).map_err(io_err)?;
            if entries.next().is_some() && !self.options.overwrite {
                return Err(PackageError::NotEmpty(self.root.clone()));
            }
        } else {
            std::fs::create_dir_all(&self.root).map_err(io_err)?;
        }
        Ok(())
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, PackageError> {
        let path = Path::new(relative);
        let safe = path
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
        if !safe || relative.is_empty() {
            return Err(PackageError::UnsafePath(relative.to_string()));
        }
        if RESERVED_FILES.contains(&relative) {
            return Err(PackageError::ReservedPath(relative.to_string()));
        }
        Ok(self.root.join(path))
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), PackageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PackageError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, bytes).map_err(|source| PackageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, what: &'static str, value: &T) -> Result<(), PackageError> {
    let mut json =
        serde_json::to_string_pretty(value).map_err(|e| PackageError::Serialize(what, e))?;
    json.push('\n');
    write_file(path, json.as_bytes())
}
