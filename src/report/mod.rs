// src/report/mod.rs

//! Conversion report aggregation
//!
//! The aggregator is a deterministic fold over conversion results: it makes
//! no decisions of its own, orders everything by input position, and given
//! the same results always produces a byte-identical report. Timestamps and
//! pack identifiers belong to the package writer, not here.

mod display;

use crate::assumption::ImpactLevel;
use crate::feature::FeatureCategory;
use crate::mapping::MappingKind;
use crate::pipeline::{ConversionResult, ConversionStatus, Stage};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::warn;

/// One row of the per-feature mapping table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingRow {
    pub index: usize,
    pub feature_id: String,
    pub category: FeatureCategory,
    pub status: ConversionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<MappingKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Display explanation for anything other than a plain conversion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// A stage error of a failed feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportedError {
    pub feature_id: String,
    pub stage: Stage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// An approximation or limitation surfaced to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rationale {
    pub feature_id: String,
    pub status: ConversionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactLevel>,
    pub text: String,
}

/// One rendered file in the package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestEntry {
    /// Destination path, unique within the package
    pub path: String,
    pub feature_id: String,
    pub template: String,
    /// SHA-256 of the written bytes
    pub checksum: String,
    pub size: usize,
    /// Structured content
    #[serde(skip)]
    pub content: serde_json::Value,
    /// Exact bytes written to `path`
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Final job report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub total: usize,
    pub converted: usize,
    pub partial: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `converted / total`
    pub success_rate: f64,
    /// `converted with kind == direct / total`
    pub full_fidelity_rate: f64,
    /// Mean confidence over features with output
    pub average_confidence: f64,
    pub mappings: Vec<MappingRow>,
    pub errors: Vec<ReportedError>,
    pub rationales: Vec<Rationale>,
    pub warnings: Vec<String>,
    pub manifest: Vec<ManifestEntry>,
}

impl ConversionReport {
    pub fn count(&self, status: ConversionStatus) -> usize {
        match status {
            ConversionStatus::Converted => self.converted,
            ConversionStatus::Partial => self.partial,
            ConversionStatus::Failed => self.failed,
            ConversionStatus::Skipped => self.skipped,
        }
    }

    /// Checksums keyed by package path
    pub fn checksums(&self) -> std::collections::BTreeMap<&str, &str> {
        self.manifest
            .iter()
            .map(|e| (e.path.as_str(), e.checksum.as_str()))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Hex SHA-256 of a byte slice
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Insert `.N` before the extension: `blocks/a.json` -> `blocks/a.2.json`
fn suffixed(path: &str, n: usize) -> String {
    let (dir, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}.{}.{}", stem, n, ext),
        _ => format!("{}.{}", file, n),
    };
    match dir {
        Some(dir) => format!("{}/{}", dir, file),
        None => file,
    }
}

/// Folds conversion results into a report
pub struct ReportAggregator;

impl ReportAggregator {
    pub fn aggregate(results: &[ConversionResult]) -> ConversionReport {
        let mut ordered: Vec<&ConversionResult> = results.iter().collect();
        ordered.sort_by_key(|r| r.index);

        let mut report = ConversionReport {
            total: ordered.len(),
            converted: 0,
            partial: 0,
            failed: 0,
            skipped: 0,
            success_rate: 0.0,
            full_fidelity_rate: 0.0,
            average_confidence: 0.0,
            mappings: Vec::with_capacity(ordered.len()),
            errors: Vec::new(),
            rationales: Vec::new(),
            warnings: Vec::new(),
            manifest: Vec::new(),
        };

        let mut full_fidelity = 0;
        let mut confidence_sum = 0.0;
        let mut paths: HashSet<String> = HashSet::new();

        for result in ordered {
            match result.status {
                ConversionStatus::Converted => report.converted += 1,
                ConversionStatus::Partial => report.partial += 1,
                ConversionStatus::Failed => report.failed += 1,
                ConversionStatus::Skipped => report.skipped += 1,
            }
            if result.is_full_fidelity() {
                full_fidelity += 1;
            }

            let rationale = result.rationale();
            report.mappings.push(MappingRow {
                index: result.index,
                feature_id: result.feature_id.clone(),
                category: result.category,
                status: result.status,
                capability: result.capability().map(str::to_string),
                kind: result.kind(),
                confidence: result.confidence(),
                impact: result.impact(),
                template: result.output.as_ref().map(|o| o.template.clone()),
                rationale: rationale.clone(),
            });

            match result.status {
                ConversionStatus::Failed => {
                    report.errors.extend(result.errors.iter().map(|e| ReportedError {
                        feature_id: result.feature_id.clone(),
                        stage: e.stage,
                        message: e.message.clone(),
                        template: e.template.clone(),
                    }));
                }
                _ => {
                    if let Some(text) = rationale {
                        report.rationales.push(Rationale {
                            feature_id: result.feature_id.clone(),
                            status: result.status,
                            impact: result.impact(),
                            text,
                        });
                    }
                }
            }

            if result.used_fallback {
                let cause = result
                    .errors
                    .first()
                    .map(|e| e.message.as_str())
                    .unwrap_or("render failed");
                report.warnings.push(format!(
                    "{}: rendered with fallback template after: {}",
                    result.feature_id, cause
                ));
            }

            let Some(output) = result.output.as_ref().filter(|_| result.status.has_output())
            else {
                continue;
            };
            confidence_sum += result.confidence().unwrap_or(0.0);

            let mut path = output.path.clone();
            if paths.contains(&path) {
                let mut n = 2;
                while paths.contains(&suffixed(&output.path, n)) {
                    n += 1;
                }
                path = suffixed(&output.path, n);
                let warning = format!(
                    "{}: output path '{}' already used, written as '{}'",
                    result.feature_id, output.path, path
                );
                warn!("{}", warning);
                report.warnings.push(warning);
            }
            paths.insert(path.clone());

            let bytes = output.to_bytes();
            report.manifest.push(ManifestEntry {
                path,
                feature_id: result.feature_id.clone(),
                template: output.template.clone(),
                checksum: checksum(&bytes),
                size: bytes.len(),
                content: output.content.clone(),
                bytes,
            });
        }

        let with_output = report.converted + report.partial;
        report.success_rate = rate(report.converted, report.total);
        report.full_fidelity_rate = rate(full_fidelity, report.total);
        report.average_confidence = if with_output == 0 {
            0.0
        } else {
            confidence_sum / with_output as f64
        };
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageError;
    use crate::resolve::ResolvedFeature;
    use crate::template::RenderedOutput;

    fn result(index: usize, id: &str, status: ConversionStatus) -> ConversionResult {
        ConversionResult {
            index,
            feature_id: id.to_string(),
            category: FeatureCategory::Block,
            source: None,
            resolved: None,
            output: None,
            errors: Vec::new(),
            status,
            reason: None,
            used_fallback: false,
        }
    }

    fn converted(index: usize, id: &str, kind: MappingKind, path: &str) -> ConversionResult {
        let mut r = result(index, id, ConversionStatus::Converted);
        r.resolved = Some(ResolvedFeature {
            feature_id: id.to_string(),
            kind,
            confidence: 0.9,
            capability: "minecraft:block".into(),
            bindings: Default::default(),
            assumption: None,
        });
        r.output = Some(RenderedOutput {
            template: "block_basic@1.0.0".into(),
            variant: "basic".into(),
            path: path.to_string(),
            content: serde_json::json!({"id": id}),
            text: String::new(),
        });
        r
    }

    #[test]
    fn test_empty_input_rates_are_zero() {
        let report = ReportAggregator::aggregate(&[]);
        assert_eq!(report.total, 0);
        assert_eq!(report.success_rate, 0.0);
        assert_eq!(report.full_fidelity_rate, 0.0);
        assert_eq!(report.average_confidence, 0.0);
    }

    #[test]
    fn test_rates_and_order() {
        let mut failed = result(2, "mod:c", ConversionStatus::Failed);
        failed.errors.push(StageError::new(Stage::Render, "first"));
        failed.errors.push(StageError::new(Stage::Fallback, "second"));
        let mut skipped = result(3, "mod:d", ConversionStatus::Skipped);
        skipped.reason = Some("unsupported: dimension".into());

        let results = vec![
            skipped,
            converted(1, "mod:b", MappingKind::ApiAdaptation, "blocks/b.json"),
            failed,
            converted(0, "mod:a", MappingKind::Direct, "blocks/a.json"),
        ];
        let report = ReportAggregator::aggregate(&results);

        assert_eq!(report.total, 4);
        assert_eq!(report.success_rate, 0.5);
        assert_eq!(report.full_fidelity_rate, 0.25);
        let ids: Vec<_> = report.mappings.iter().map(|m| m.feature_id.as_str()).collect();
        assert_eq!(ids, vec!["mod:a", "mod:b", "mod:c", "mod:d"]);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.rationales.len(), 1);
        assert_eq!(report.rationales[0].text, "unsupported: dimension");
        assert_eq!(report.manifest.len(), 2);
    }

    #[test]
    fn test_duplicate_paths_are_disambiguated() {
        let results = vec![
            converted(0, "a:door", MappingKind::Direct, "blocks/door.json"),
            converted(1, "b:door", MappingKind::Direct, "blocks/door.json"),
            converted(2, "c:door", MappingKind::Direct, "blocks/door.json"),
        ];
        let report = ReportAggregator::aggregate(&results);
        let paths: Vec<_> = report.manifest.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["blocks/door.json", "blocks/door.2.json", "blocks/door.3.json"]
        );
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_report_is_reproducible() {
        let results = vec![
            converted(0, "mod:a", MappingKind::Direct, "blocks/a.json"),
            result(1, "mod:b", ConversionStatus::Skipped),
        ];
        let first = ReportAggregator::aggregate(&results).to_json().unwrap();
        let second = ReportAggregator::aggregate(&results).to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_suffixed() {
        assert_eq!(suffixed("a.json", 2), "a.2.json");
        assert_eq!(suffixed("x/y/a", 3), "x/y/a.3");
        assert_eq!(suffixed("x/.hidden", 2), "x/.hidden.2");
    }
}
