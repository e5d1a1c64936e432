// src/commands/progress.rs
//! Terminal progress bar for conversion jobs

use indicatif::{ProgressBar, ProgressStyle};
use modport::{ConversionStatus, ProgressTracker};
use std::sync::atomic::{AtomicBool, Ordering};

/// indicatif-backed tracker: one tick per feature, failures printed above the bar
pub struct ConversionProgress {
    bar: ProgressBar,
    finished: AtomicBool,
}

impl ConversionProgress {
    pub fn new(total_features: u64) -> Self {
        let bar = ProgressBar::new(total_features);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:30!} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message("Converting");
        Self {
            bar,
            finished: AtomicBool::new(false),
        }
    }
}

impl ProgressTracker for ConversionProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn set_length(&self, length: u64) {
        self.bar.set_length(length);
    }

    fn position(&self) -> u64 {
        self.bar.position()
    }

    fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        self.bar.abandon_with_message(message.to_string());
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn feature_done(&self, feature_id: &str, status: ConversionStatus) {
        if status == ConversionStatus::Failed {
            self.bar.println(format!("  failed: {}", feature_id));
        }
        self.bar.set_message(feature_id.to_string());
        self.bar.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_position() {
        let progress = ConversionProgress::new(3);
        progress.feature_done("mod:a", ConversionStatus::Converted);
        progress.feature_done("mod:b", ConversionStatus::Skipped);
        assert_eq!(progress.position(), 2);
        assert_eq!(progress.length(), 3);
        progress.finish_with_message("done");
        assert!(progress.is_finished());
    }
}
