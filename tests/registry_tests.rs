//! Integration tests for the mod registry file
//!
//! These tests verify:
//! - Any set of records survives a save and load unchanged
//! - The on-disk field names other tools read
//! - Unreadable storage yields an empty registry plus a warning

use camino::Utf8PathBuf;
use proptest::prelude::*;
use reliquary::services::{ModRegistry, RegistryError};
use reliquary::{ModKind, ModRecord, Workspace};
use std::fs;
use tempfile::TempDir;

fn temp_workspace() -> (TempDir, Workspace) {
    let dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let workspace = Workspace::new(root).unwrap();
    (dir, workspace)
}

fn kind_strategy() -> impl Strategy<Value = ModKind> {
    prop_oneof![
        Just(ModKind::Content),
        (proptest::option::of("[A-Za-z]:/Tools/[a-z_]{1,8}/skse64_loader\\.exe"), "[ -~]{0,16}").prop_map(
            |(launcher, args)| ModKind::Tool {
                launcher_path: launcher.map(Utf8PathBuf::from),
                launcher_args: args,
            }
        ),
    ]
}

fn record_strategy() -> impl Strategy<Value = ModRecord> {
    (
        "[A-Za-z0-9_]{1,12}",
        "[A-Za-z0-9 ]{0,20}",
        proptest::collection::btree_set("[A-Za-z]{1,8}\\.(esp|esm|esl)", 0..5)
            .prop_map(|plugins| plugins.into_iter().collect::<Vec<_>>())
            .prop_shuffle(),
        any::<bool>(),
        kind_strategy(),
    )
        .prop_map(|(id, name, plugins, enabled, kind)| ModRecord {
            archive_name: format!("{}.7z", name),
            mod_path: Utf8PathBuf::from(format!("/ws/Mods/{}", id)),
            data_path: Utf8PathBuf::from(format!("/ws/Mods/{}/Data", id)),
            plugin_files: plugins,
            id,
            name,
            enabled,
            kind,
        })
}

fn records_strategy() -> impl Strategy<Value = Vec<ModRecord>> {
    proptest::collection::vec(record_strategy(), 0..6).prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(i, mut record)| {
                // Ids are unique within a registry
                record.id = format!("{}_{}", record.id, i);
                record
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_save_then_load_is_identity(records in records_strategy()) {
        let (_dir, workspace) = temp_workspace();
        let registry = ModRegistry::new(&workspace);

        registry.save(&records).unwrap();
        let loaded = registry.load().unwrap();

        prop_assert!(loaded.warning.is_none());
        prop_assert_eq!(loaded.records, records);
    }
}

#[test]
fn test_stored_field_names() {
    let (_dir, workspace) = temp_workspace();
    let registry = ModRegistry::new(&workspace);
    let record = ModRecord {
        id: "skse64".to_string(),
        name: "skse64".to_string(),
        archive_name: "skse64.7z".to_string(),
        mod_path: Utf8PathBuf::from("/ws/Mods/skse64"),
        data_path: Utf8PathBuf::from("/ws/Mods/skse64/Data"),
        plugin_files: Vec::new(),
        enabled: false,
        kind: ModKind::Tool {
            launcher_path: Some(Utf8PathBuf::from("/ws/Tools/skse64/skse64_loader.exe")),
            launcher_args: "-forcesteamloader".to_string(),
        },
    };

    registry.save(&[record]).unwrap();

    let json: serde_json::Value = serde_json::from_slice(&fs::read(registry.path()).unwrap()).unwrap();
    let stored = &json[0];
    assert_eq!(stored["id"], "skse64");
    assert_eq!(stored["archive"], "skse64.7z");
    assert_eq!(stored["modPath"], "/ws/Mods/skse64");
    assert_eq!(stored["dataPath"], "/ws/Mods/skse64/Data");
    assert_eq!(stored["enabled"], false);
    assert_eq!(stored["type"], "tool");
    assert_eq!(stored["launcherPath"], "/ws/Tools/skse64/skse64_loader.exe");
    assert_eq!(stored["launcherArgs"], "-forcesteamloader");
    assert_eq!(stored["plugins"], serde_json::json!([]));
}

#[test]
fn test_wrong_shape_is_reported() {
    let (_dir, workspace) = temp_workspace();
    fs::write(&workspace.registry_path, r#"{"mods": []}"#).unwrap();

    let loaded = ModRegistry::new(&workspace).load().unwrap();

    assert!(loaded.records.is_empty());
    assert!(matches!(loaded.warning, Some(RegistryError::Corrupt { .. })));
}
