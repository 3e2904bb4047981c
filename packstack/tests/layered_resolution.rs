//! Integration tests for layered resolution across pack stacks.
//!
//! Covers priority override, absolute blocks, retroactive listing filters,
//! independent metadata resolution and directory-backed packs.
//!
//! Run with: `cargo test --test layered_resolution`

use std::fs;
use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use packstack::resolver::{AggregateResolver, ResourceManager};
use packstack::resource::ResourceId;
use packstack::source::{ContentSource, MemorySource, PackKind, PathSource};

const KIND: PackKind = PackKind::ClientResources;

// ============================================================================
// Helper Functions
// ============================================================================

fn id(text: &str) -> ResourceId {
    ResourceId::parse(text).unwrap()
}

fn all(_: &ResourceId) -> bool {
    true
}

fn resolver(sources: Vec<Arc<dyn ContentSource>>) -> AggregateResolver {
    AggregateResolver::new(KIND, sources)
}

fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

// ============================================================================
// Recorded scenario
// ============================================================================

#[test]
fn test_addon_overrides_and_blocks_base() {
    let base = MemorySource::builder("base")
        .text(KIND, "a:x", "1")
        .text(KIND, "a:y", "2")
        .build()
        .unwrap();
    let addon = MemorySource::builder("addon")
        .text(KIND, "a:x", "override")
        .block(Some("^a$"), Some("^y$"))
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared(), addon.into_shared()]);

    assert_eq!(resolver.read_to_string(&id("a:x")).unwrap(), "override");
    assert!(resolver.resource(&id("a:y")).is_none());
    assert!(resolver.read_to_string(&id("a:y")).unwrap_err().is_not_found());
}

// ============================================================================
// Priority and blocking
// ============================================================================

#[test]
fn test_block_is_absolute_below_blocking_source() {
    let base = MemorySource::builder("base")
        .text(KIND, "a:hidden", "base")
        .build()
        .unwrap();
    let blocker = MemorySource::builder("blocker")
        .text(KIND, "a:other", "blocker")
        .block(None, Some("hidden"))
        .build()
        .unwrap();
    let top = MemorySource::builder("top")
        .text(KIND, "a:unrelated", "top")
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared(), blocker.into_shared(), top.into_shared()]);

    assert!(resolver.resource(&id("a:hidden")).is_none());
    assert!(resolver.resource_stack(&id("a:hidden")).is_empty());
    assert_eq!(resolver.read_to_string(&id("a:other")).unwrap(), "blocker");
}

#[test]
fn test_source_above_block_still_serves() {
    let base = MemorySource::builder("base")
        .text(KIND, "a:x", "base")
        .build()
        .unwrap();
    let blocker = MemorySource::builder("blocker")
        .text(KIND, "a:filler", "")
        .block(Some("a"), None)
        .build()
        .unwrap();
    let top = MemorySource::builder("top")
        .text(KIND, "a:x", "top")
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared(), blocker.into_shared(), top.into_shared()]);

    let stack = resolver.resource_stack(&id("a:x"));
    assert_eq!(stack.len(), 1);
    assert_eq!(stack[0].source_id(), "top");
}

#[test]
fn test_filter_only_source_hides_namespace_it_does_not_expose() {
    let base = MemorySource::builder("base")
        .text(KIND, "ui:button", "base")
        .build()
        .unwrap();
    let eraser = MemorySource::builder("eraser")
        .text(KIND, "other:file", "x")
        .block(Some("^ui$"), None)
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared(), eraser.into_shared()]);

    assert!(resolver.resource(&id("ui:button")).is_none());
    assert!(resolver.namespaces().contains("ui"));
}

// ============================================================================
// Listing
// ============================================================================

#[test]
fn test_listing_reflects_highest_priority_contribution() {
    let base = MemorySource::builder("base")
        .text(KIND, "a:lang/en.json", "base-en")
        .text(KIND, "a:lang/de.json", "base-de")
        .text(KIND, "a:lang/fr.json", "base-fr")
        .build()
        .unwrap();
    let addon = MemorySource::builder("addon")
        .text(KIND, "a:lang/en.json", "addon-en")
        .block(None, Some("^lang/fr"))
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared(), addon.into_shared()]);
    let listed = resolver.list_resources("lang", &all).unwrap();

    let ids: Vec<String> = listed.keys().map(|id| id.to_string()).collect();
    assert_eq!(ids, vec!["a:lang/de.json", "a:lang/en.json"]);
    assert_eq!(
        listed[&id("a:lang/en.json")].read_to_string().unwrap(),
        "addon-en"
    );
    assert_eq!(listed[&id("a:lang/de.json")].source_id(), "base");
}

#[test]
fn test_listing_stacks_keeps_every_layer() {
    let base = MemorySource::builder("base")
        .text(KIND, "a:lang/en.json", "base")
        .build()
        .unwrap();
    let addon = MemorySource::builder("addon")
        .text(KIND, "a:lang/en.json", "addon")
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared(), addon.into_shared()]);
    let stacks = resolver.list_resource_stacks("lang", &all).unwrap();

    let layers: Vec<&str> = stacks[&id("a:lang/en.json")]
        .iter()
        .map(|r| r.source_id())
        .collect();
    assert_eq!(layers, vec!["base", "addon"]);
}

#[test]
fn test_listing_applies_caller_predicate() {
    let base = MemorySource::builder("base")
        .text(KIND, "a:models/block.json", "{}")
        .text(KIND, "a:models/item.png", "")
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared()]);
    let json_only = |id: &ResourceId| id.path().ends_with(".json");
    let listed = resolver.list_resources("models", &json_only).unwrap();

    assert_eq!(listed.len(), 1);
    assert!(listed.contains_key(&id("a:models/block.json")));
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_metadata_comes_from_higher_source_than_content() {
    let base = MemorySource::builder("base")
        .text(KIND, "a:textures/stone.png", "pixels")
        .build()
        .unwrap();
    let addon = MemorySource::builder("addon")
        .metadata(KIND, "a:textures/stone.png", json!({ "animation": { "frametime": 4 } }))
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared(), addon.into_shared()]);

    let stack = resolver.resource_stack(&id("a:textures/stone.png"));
    assert_eq!(stack.len(), 1);
    assert_eq!(stack[0].source_id(), "base");

    let metadata = stack[0].metadata().unwrap();
    let animation: serde_json::Value = metadata.section("animation").unwrap().unwrap();
    assert_eq!(animation["frametime"], 4);

    let resolved = resolver.resource(&id("a:textures/stone.png")).unwrap();
    assert!(!resolved.metadata().unwrap().is_empty());
}

#[test]
fn test_resource_without_sidecar_has_empty_metadata() {
    let base = MemorySource::builder("base")
        .text(KIND, "a:x", "1")
        .build()
        .unwrap();

    let resolver = resolver(vec![base.into_shared()]);
    let resource = resolver.resource(&id("a:x")).unwrap();
    assert!(resource.metadata().unwrap().is_empty());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_close_twice_releases_sources_once() {
    let base = Arc::new(MemorySource::builder("base").text(KIND, "a:x", "1").build().unwrap());
    let addon = Arc::new(MemorySource::builder("addon").text(KIND, "a:y", "2").build().unwrap());

    let resolver = resolver(vec![
        base.clone() as Arc<dyn ContentSource>,
        addon.clone() as Arc<dyn ContentSource>,
    ]);
    resolver.close();
    resolver.close();

    assert!(resolver.is_closed());
    assert_eq!(base.close_count(), 1);
    assert_eq!(addon.close_count(), 1);
}

// ============================================================================
// Directory-backed packs
// ============================================================================

#[test]
fn test_path_sources_layer_like_memory_sources() {
    let temp = TempDir::new().unwrap();
    let base_root = temp.path().join("base");
    let addon_root = temp.path().join("addon");

    write_file(&base_root, "assets/ui/lang/en.json", "base-en");
    write_file(&base_root, "assets/ui/lang/de.json", "base-de");
    write_file(&addon_root, "assets/ui/lang/en.json", "addon-en");
    write_file(
        &addon_root,
        "pack.json",
        r#"{"filter": {"block": [{"namespace": "^ui$", "path": "de\\.json$"}]}}"#,
    );

    let resolver = resolver(vec![
        Arc::new(PathSource::new(&base_root)) as Arc<dyn ContentSource>,
        Arc::new(PathSource::new(&addon_root)) as Arc<dyn ContentSource>,
    ]);

    assert_eq!(resolver.read_to_string(&id("ui:lang/en.json")).unwrap(), "addon-en");
    assert!(resolver.resource(&id("ui:lang/de.json")).is_none());

    let listed = resolver.list_resources("lang", &all).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[&id("ui:lang/en.json")].source_id(), "addon");
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_last_pushed_source_wins(values in prop::collection::vec("[a-z0-9]{1,8}", 1..6)) {
        let sources: Vec<Arc<dyn ContentSource>> = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                MemorySource::builder(format!("pack{}", i))
                    .text(KIND, "a:x", value)
                    .build()
                    .unwrap()
                    .into_shared()
            })
            .collect();

        let resolver = resolver(sources);
        let expected = values.last().unwrap();
        prop_assert_eq!(&resolver.read_to_string(&id("a:x")).unwrap(), expected);
        prop_assert_eq!(resolver.resource_stack(&id("a:x")).len(), values.len());
    }
}
