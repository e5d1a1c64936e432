// src/pipeline/state.rs

//! Per-feature state machine
//!
//! ```text
//! Pending -> Mapped | Unmapped
//! Mapped | Unmapped -> Resolved | Unsupported
//! Resolved -> Selected
//! Unsupported -> Skipped
//! Selected -> Rendered | ValidationFailed
//! ValidationFailed -> Rendered | Failed     (one retry with the fallback variant)
//! Rendered -> Converted | Partial
//! ```
//!
//! Any non-terminal state may also go to `Failed` (stage error) or `Skipped`
//! (cancellation).

use super::ConversionStatus;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureState {
    Pending,
    Mapped,
    Unmapped,
    Resolved,
    Unsupported,
    Selected,
    Rendered,
    ValidationFailed,
    Converted,
    Partial,
    Failed,
    Skipped,
}

impl FeatureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Mapped => "mapped",
            Self::Unmapped => "unmapped",
            Self::Resolved => "resolved",
            Self::Unsupported => "unsupported",
            Self::Selected => "selected",
            Self::Rendered => "rendered",
            Self::ValidationFailed => "validation_failed",
            Self::Converted => "converted",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Converted | Self::Partial | Self::Failed | Self::Skipped
        )
    }

    /// The terminal status this state corresponds to, if any
    pub fn status(&self) -> Option<ConversionStatus> {
        match self {
            Self::Converted => Some(ConversionStatus::Converted),
            Self::Partial => Some(ConversionStatus::Partial),
            Self::Failed => Some(ConversionStatus::Failed),
            Self::Skipped => Some(ConversionStatus::Skipped),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: FeatureState) -> bool {
        use FeatureState::*;

        if self.is_terminal() {
            return false;
        }
        // Rendered output is kept even if cancellation arrives afterwards
        if matches!(next, Failed | Skipped) {
            return *self != Rendered;
        }

        matches!(
            (self, next),
            (Pending, Mapped)
                | (Pending, Unmapped)
                | (Mapped, Resolved)
                | (Mapped, Unsupported)
                | (Unmapped, Resolved)
                | (Unmapped, Unsupported)
                | (Resolved, Selected)
                | (Selected, Rendered)
                | (Selected, ValidationFailed)
                | (ValidationFailed, Rendered)
                | (Rendered, Converted)
                | (Rendered, Partial)
        )
    }
}

impl fmt::Display for FeatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
