// src/template/selector.rs

//! Template variant selection
//!
//! Selection is keyed first on the target capability, then on predicates
//! over the resolved bindings. Non-fallback variants are tried in declared
//! order (most specific first) and the first whose predicates all hold wins;
//! otherwise the capability's fallback variant is used. Because every
//! capability has exactly one fallback, selection only fails for a capability
//! with no templates at all.

use super::{TemplateHandle, TemplateSet};
use crate::predicate::{all_match, MatchContext};
use crate::resolve::ResolvedFeature;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no template is declared for capability '{0}'")]
    UnknownCapability(String),
}

/// Chooses a template variant for a resolved feature
#[derive(Debug, Clone, Copy)]
pub struct TemplateSelector<'a> {
    templates: &'a TemplateSet,
}

impl<'a> TemplateSelector<'a> {
    pub fn new(templates: &'a TemplateSet) -> Self {
        Self { templates }
    }

    pub fn select(&self, resolved: &ResolvedFeature) -> Result<TemplateHandle, SelectionError> {
        let ctx = MatchContext::new(&resolved.feature_id, &resolved.bindings);

        let chosen = self
            .templates
            .handles_for(&resolved.capability)
            .filter(|&h| !self.templates.get(h).is_fallback())
            .find(|&h| all_match(self.templates.get(h).when(), &ctx))
            .or_else(|| self.templates.fallback_for(&resolved.capability))
            .ok_or_else(|| SelectionError::UnknownCapability(resolved.capability.clone()))?;

        trace!(
            "Selected template '{}' for {}",
            self.templates.get(chosen).label(),
            resolved.feature_id
        );
        Ok(chosen)
    }

    /// The capability's default variant
    pub fn fallback(&self, capability: &str) -> Result<TemplateHandle, SelectionError> {
        self.templates
            .fallback_for(capability)
            .ok_or_else(|| SelectionError::UnknownCapability(capability.to_string()))
    }
}
