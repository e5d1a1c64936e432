// src/report/display.rs

//! Plain-text rendering of a report for the terminal

use super::ConversionReport;
use std::fmt::Write;

impl ConversionReport {
    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} features: {} converted, {} partial, {} failed, {} skipped (success {:.1}%, full fidelity {:.1}%)",
            self.total,
            self.converted,
            self.partial,
            self.failed,
            self.skipped,
            self.success_rate * 100.0,
            self.full_fidelity_rate * 100.0
        )
    }

    /// Mapping table plus errors, rationales and warnings
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let id_width = self
            .mappings
            .iter()
            .map(|m| m.feature_id.len())
            .max()
            .unwrap_or(7)
            .max(7);

        let _ = writeln!(
            out,
            "{:<id_width$}  {:<9}  {:<20}  {:<16}  {:>5}  {:<6}",
            "FEATURE", "STATUS", "CAPABILITY", "KIND", "CONF", "IMPACT"
        );
        for row in &self.mappings {
            let _ = writeln!(
                out,
                "{:<id_width$}  {:<9}  {:<20}  {:<16}  {:>5}  {:<6}",
                row.feature_id,
                row.status.as_str(),
                row.capability.as_deref().unwrap_or("-"),
                row.kind.map(|k| k.as_str()).unwrap_or("-"),
                row.confidence
                    .map(|c| format!("{:.2}", c))
                    .unwrap_or_else(|| "-".to_string()),
                row.impact.map(|i| i.as_str()).unwrap_or("-"),
            );
        }

        if !self.rationales.is_empty() {
            let _ = writeln!(out, "\nAssumptions and limitations:");
            for r in &self.rationales {
                let _ = writeln!(out, "  {} [{}]: {}", r.feature_id, r.status, r.text);
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nErrors:");
            for e in &self.errors {
                let _ = writeln!(out, "  {} [{}]: {}", e.feature_id, e.stage, e.message);
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for w in &self.warnings {
                let _ = writeln!(out, "  {}", w);
            }
        }

        let _ = writeln!(out, "\n{}", self.summary());
        let _ = writeln!(
            out,
            "Average confidence: {:.2}, {} files in package",
            self.average_confidence,
            self.manifest.len()
        );
        out
    }
}
