// src/commands/rules.rs
//! Listing of mappings, assumption rules and template variants

use super::{load_definitions, load_settings};
use anyhow::{anyhow, Result};
use modport::predicate::describe;
use modport::FeatureCategory;
use std::path::{Path, PathBuf};

pub fn cmd_rules(
    config: Option<&Path>,
    definitions: &[PathBuf],
    no_builtin: bool,
    category: Option<&str>,
    show_templates: bool,
) -> Result<()> {
    let category: Option<FeatureCategory> = category
        .map(|c| c.parse::<FeatureCategory>())
        .transpose()
        .map_err(|e| anyhow!(e))?;
    let config = load_settings(config, definitions, no_builtin)?;
    let defs = load_definitions(&config)?;

    println!("Mappings (first match wins):");
    let entries: Vec<_> = match category {
        Some(c) => defs.registry.entries_for(c).collect(),
        None => defs.registry.entries().iter().collect(),
    };
    for entry in entries {
        println!(
            "  {:<10} {:<40} -> {:<20} {:<16} {:.2}",
            entry.category.as_str(),
            describe(&entry.when),
            entry.capability,
            entry.kind.as_str(),
            entry.confidence
        );
        if let Some(note) = &entry.note {
            println!("  {:<10} note: {}", "", note);
        }
    }

    println!();
    println!("Assumption rules (first match wins):");
    for rule in defs.engine.rules() {
        if let (Some(c), Some(rc)) = (category, rule.category)
            && c != rc
        {
            continue;
        }
        println!(
            "  {:<28} {:<10} {:<30} -> {:<20} {:.2} {}",
            rule.name,
            rule.category.map(|c| c.as_str()).unwrap_or("*"),
            describe(&rule.when),
            rule.capability,
            rule.certainty,
            rule.impact
        );
    }

    if show_templates {
        println!();
        println!("Templates:");
        for capability in defs.templates.capabilities() {
            println!("  {}", capability);
            for handle in defs.templates.handles_for(capability) {
                let template = defs.templates.get(handle);
                let marker = if template.is_fallback() { " (fallback)" } else { "" };
                println!(
                    "    {:<24} {}{}",
                    template.label(),
                    describe(template.when()),
                    marker
                );
            }
        }
    }
    Ok(())
}
