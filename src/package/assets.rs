// src/package/assets.rs

//! Asset transcoding boundary
//!
//! Binary assets (textures, sounds, models) are converted by an external
//! collaborator. The pipeline only collects the references that converted
//! features carry and asks an [`AssetTranscoder`] where each one ends up.
//! References are read from the resolved bindings, so a property that an
//! assumption rule dropped never reaches the package.

use crate::pipeline::ConversionResult;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Kinds of referenced binary assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Texture,
    Sound,
    Model,
}

impl AssetKind {
    pub fn all() -> &'static [AssetKind] {
        &[Self::Texture, Self::Sound, Self::Model]
    }

    /// Feature property holding the asset reference
    pub fn property(&self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::Sound => "sound",
            Self::Model => "model",
        }
    }

    /// File extensions the target platform loads without conversion
    pub fn native_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Texture => &["png", "tga"],
            Self::Sound => &["ogg", "wav"],
            Self::Model => &["json"],
        }
    }

    /// Directory inside the resource pack
    pub fn directory(&self) -> &'static str {
        match self {
            Self::Texture => "resource_pack/textures",
            Self::Sound => "resource_pack/sounds",
            Self::Model => "resource_pack/models",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.property())
    }
}

/// A reference found on a converted feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRef {
    pub feature_id: String,
    pub kind: AssetKind,
    /// Source reference, e.g. `ironchests:textures/block/gold_chest.png`
    pub source: String,
}

/// Where an asset was placed in the package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    pub feature_id: String,
    pub kind: AssetKind,
    pub source: String,
    pub destination: String,
    /// Whether codec work was performed
    pub transcoded: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("asset reference '{0}' has no file name")]
    NoFileName(String),

    #[error("{transcoder} cannot handle {kind} asset '{source_ref}'")]
    Unsupported {
        transcoder: String,
        kind: AssetKind,
        source_ref: String,
    },
}

/// External asset conversion collaborator
pub trait AssetTranscoder: Send + Sync {
    fn name(&self) -> &str;

    fn transcode(&self, asset: &AssetRef) -> Result<AssetRecord, AssetError>;
}

/// Records asset destinations without any codec work
///
/// Only formats the target loads as-is are accepted; anything else needs a
/// real transcoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTranscoder;

impl AssetTranscoder for PassthroughTranscoder {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn transcode(&self, asset: &AssetRef) -> Result<AssetRecord, AssetError> {
        let path = asset
            .source
            .split_once(':')
            .map(|(_, path)| path)
            .unwrap_or(&asset.source);
        let file = path
            .rsplit('/')
            .next()
            .filter(|f| !f.is_empty() && *f != "." && *f != "..")
            .ok_or_else(|| AssetError::NoFileName(asset.source.clone()))?;

        let native = file
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .is_some_and(|ext| asset.kind.native_extensions().contains(&ext.as_str()));
        if !native {
            return Err(AssetError::Unsupported {
                transcoder: self.name().to_string(),
                kind: asset.kind,
                source_ref: asset.source.clone(),
            });
        }

        Ok(AssetRecord {
            feature_id: asset.feature_id.clone(),
            kind: asset.kind,
            source: asset.source.clone(),
            destination: format!("{}/{}", asset.kind.directory(), file),
            transcoded: false,
        })
    }
}

/// Asset references of every feature that produced output, in input order
pub fn collect_assets(results: &[ConversionResult]) -> Vec<AssetRef> {
    let mut refs = Vec::new();
    for result in results.iter().filter(|r| r.status.has_output()) {
        let Some(resolved) = &result.resolved else {
            continue;
        };
        for kind in AssetKind::all() {
            if let Some(source) = resolved.bindings.get_str(kind.property())
                && !source.trim().is_empty()
            {
                refs.push(AssetRef {
                    feature_id: result.feature_id.clone(),
                    kind: *kind,
                    source: source.to_string(),
                });
            }
        }
    }
    refs.sort_by(|a, b| a.feature_id.cmp(&b.feature_id).then(a.kind.cmp(&b.kind)));
    refs.dedup();
    refs
}

/// Run a transcoder over references; failures become warnings
pub fn transcode_all(
    transcoder: &dyn AssetTranscoder,
    refs: &[AssetRef],
) -> (Vec<AssetRecord>, Vec<String>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    for asset in refs {
        match transcoder.transcode(asset) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Asset for {} not converted: {}", asset.feature_id, e);
                warnings.push(format!("{}: {}", asset.feature_id, e));
            }
        }
    }
    (records, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_destination() {
        let asset = AssetRef {
            feature_id: "ironchests:gold_chest".into(),
            kind: AssetKind::Texture,
            source: "ironchests:textures/block/gold_chest.png".into(),
        };
        let record = PassthroughTranscoder.transcode(&asset).unwrap();
        assert_eq!(record.destination, "resource_pack/textures/gold_chest.png");
        assert!(!record.transcoded);
    }

    #[test]
    fn test_passthrough_rejects_directory_refs() {
        let asset = AssetRef {
            feature_id: "mod:x".into(),
            kind: AssetKind::Sound,
            source: "mod:sounds/".into(),
        };
        assert!(matches!(
            PassthroughTranscoder.transcode(&asset),
            Err(AssetError::NoFileName(_))
        ));

        let (records, warnings) = transcode_all(&PassthroughTranscoder, &[asset]);
        assert!(records.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_passthrough_rejects_foreign_formats() {
        let asset = AssetRef {
            feature_id: "mod:engine".into(),
            kind: AssetKind::Model,
            source: "mod:models/engine.obj".into(),
        };
        assert_eq!(
            PassthroughTranscoder.transcode(&asset),
            Err(AssetError::Unsupported {
                transcoder: "passthrough".into(),
                kind: AssetKind::Model,
                source_ref: "mod:models/engine.obj".into(),
            })
        );

        let sound = AssetRef {
            feature_id: "mod:bell".into(),
            kind: AssetKind::Sound,
            source: "mod:sounds/bell.OGG".into(),
        };
        assert!(PassthroughTranscoder.transcode(&sound).is_ok());
    }
}
