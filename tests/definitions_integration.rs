// tests/definitions_integration.rs
//! Integration tests for definition loading
//!
//! Definition directories extend the built-in set. These tests cover:
//! - Layering user directories over the built-in definitions
//! - Totality and version checks across merged sources
//! - Assumption rules that drop bindings
//! - Configuration-driven loading

use modport::definitions::DefinitionError;
use modport::package::{collect_assets, AssetKind};
use modport::{
    parse_config, ConversionStatus, Definitions, FeatureCategory, FeatureRecord, Orchestrator,
    PipelineOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

// =============================================================================
// TEST HELPERS
// =============================================================================

const DIMENSION_DEFS: &str = r#"
version = 1

[[mapping]]
category = "dimension"
capability = "custom:dimension"
kind = "api_adaptation"
confidence = 0.6
note = "Dimensions become structure-based areas"

[[template]]
name = "dimension_area"
capability = "custom:dimension"
fallback = true
path = "behavior_pack/structures/{{name}}.json"
required = ["namespace", "name"]
body = '''
{ "area": "{{namespace}}:{{name}}", "sky": {{#if has_sky}}true{{else}}false{{/if}} }
'''

[[template.schema]]
path = "area"
kind = "string"
"#;

fn write_defs(dir: &Path, file: &str, content: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file), content).unwrap();
    dir.to_path_buf()
}

// =============================================================================
// LAYERING
// =============================================================================

#[test]
fn test_user_directory_extends_builtin() {
    let temp = TempDir::new().unwrap();
    let dir = write_defs(temp.path(), "dimension.toml", DIMENSION_DEFS);

    let builtin = Definitions::builtin().unwrap().stats();
    let defs = Definitions::load(&[dir], true).unwrap();
    let stats = defs.stats();
    assert_eq!(stats.mappings, builtin.mappings + 1);
    assert_eq!(stats.templates, builtin.templates + 1);
    assert_eq!(stats.capabilities, builtin.capabilities + 1);

    let feature = FeatureRecord::new("twilight:forest", FeatureCategory::Dimension)
        .with_property("has_sky", true);
    let result = Orchestrator::new(Arc::new(defs), PipelineOptions::default())
        .convert_feature(0, &feature);
    assert_eq!(result.status, ConversionStatus::Converted);
    assert_eq!(result.confidence(), Some(0.6));
    let output = result.output.unwrap();
    assert_eq!(output.path, "behavior_pack/structures/forest.json");
    assert_eq!(output.content["sky"], true);
}

#[test]
fn test_directory_without_builtin() {
    let temp = TempDir::new().unwrap();
    let dir = write_defs(temp.path(), "dimension.toml", DIMENSION_DEFS);

    let defs = Definitions::load(&[dir], false).unwrap();
    assert_eq!(defs.stats().mappings, 1);
    assert_eq!(defs.stats().rules, 0);

    // Blocks have no mapping and no rule in this set
    let feature = FeatureRecord::new("mod:stone", FeatureCategory::Block);
    let result = Orchestrator::new(Arc::new(defs), PipelineOptions::default())
        .convert_feature(0, &feature);
    assert_eq!(result.status, ConversionStatus::Skipped);
    assert_eq!(result.reason.as_deref(), Some("unsupported: block"));
}

#[test]
fn test_dropped_asset_binding_is_not_exported() {
    let temp = TempDir::new().unwrap();
    let dir = write_defs(
        temp.path(),
        "machines.toml",
        r#"
        version = 1

        [[mapping]]
        category = "machinery"
        capability = "custom:machine"
        kind = "smart_assumption"
        confidence = 0.7

        [[rule]]
        name = "mute_machines"
        category = "machinery"
        when = [{ op = "present", key = "sound" }]
        capability = "custom:machine"
        certainty = 0.9
        impact = "low"
        description = "Machine sounds are not ported"
        drop = ["sound"]

        [[template]]
        name = "machine"
        capability = "custom:machine"
        fallback = true
        path = "behavior_pack/blocks/{{name}}.json"
        required = ["namespace", "name"]
        body = '{ "id": "{{namespace}}:{{name}}" }'
        "#,
    );
    let defs = Definitions::load(&[dir], false).unwrap();

    let features = vec![
        FeatureRecord::new("techmod:press", FeatureCategory::Machinery)
            .with_property("sound", "techmod:sounds/press.ogg")
            .with_property("texture", "techmod:textures/block/press.png"),
    ];
    let outcome = Orchestrator::new(Arc::new(defs), PipelineOptions::default())
        .run(&features)
        .unwrap();
    assert!(outcome.results[0].status.has_output());

    let refs = collect_assets(&outcome.results);
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].kind, AssetKind::Texture);
    assert_eq!(refs[0].source, "techmod:textures/block/press.png");
}

#[test]
fn test_mapping_without_template_is_rejected() {
    let temp = TempDir::new().unwrap();
    let dir = write_defs(
        temp.path(),
        "broken.toml",
        r#"
        version = 1

        [[mapping]]
        category = "dimension"
        capability = "custom:nowhere"
        kind = "direct"
        confidence = 0.5
        "#,
    );

    let err = Definitions::load(&[dir], true).unwrap_err();
    match err {
        DefinitionError::MissingTemplate { capability, .. } => {
            assert_eq!(capability, "custom:nowhere")
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_version_mismatch_names_file() {
    let temp = TempDir::new().unwrap();
    let dir = write_defs(temp.path(), "future.toml", "version = 99\n");

    let err = Definitions::load(&[dir], true).unwrap_err();
    assert!(matches!(err, DefinitionError::VersionMismatch { .. }));
    assert!(err.to_string().contains("future.toml"));
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[test]
fn test_config_drives_loading() {
    let temp = TempDir::new().unwrap();
    let dir = write_defs(&temp.path().join("defs"), "dimension.toml", DIMENSION_DEFS);

    let config = parse_config(&format!(
        "[pipeline]\nnamespace = \"twilight\"\nfallback_penalty = 0.5\n\n[definitions]\npaths = [{:?}]\n",
        dir.display().to_string()
    ))
    .unwrap();
    let defs =
        Definitions::load(&config.definitions.paths, config.definitions.include_builtin).unwrap();
    let orchestrator = Orchestrator::new(Arc::new(defs), config.pipeline_options());
    assert_eq!(orchestrator.options().fallback_penalty, 0.5);

    // No namespace in the id, so the configured one is used
    let feature = FeatureRecord::new("forest", FeatureCategory::Dimension);
    let result = orchestrator.convert_feature(0, &feature);
    assert_eq!(result.status, ConversionStatus::Converted);
    assert_eq!(
        result.output.unwrap().content["area"],
        "twilight:forest"
    );
}
