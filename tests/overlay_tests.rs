//! Integration tests for the overlay projector
//!
//! These tests verify:
//! - Enabling and reconciling are idempotent
//! - The virtual directory converges on the enabled mods' files
//! - Overlapping files follow the last writer

use camino::{Utf8Path, Utf8PathBuf};
use proptest::prelude::*;
use reliquary::metrics::Metrics;
use reliquary::services::OverlayProjector;
use reliquary::{ModKind, ModRecord};
use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    root: Utf8PathBuf,
    projector: OverlayProjector,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
    let virtual_dir = root.join("VirtualData");
    fs::create_dir_all(&virtual_dir).unwrap();
    Fixture {
        _dir: dir,
        projector: OverlayProjector::new(virtual_dir, Arc::new(Metrics::new())),
        root,
    }
}

fn installed(root: &Utf8Path, id: &str, files: &[(&str, &str)], enabled: bool) -> ModRecord {
    let mod_path = root.join("Mods").join(id);
    let data_path = mod_path.join("Data");
    fs::create_dir_all(&data_path).unwrap();
    for (name, body) in files {
        fs::write(data_path.join(name), body).unwrap();
    }
    ModRecord {
        id: id.to_string(),
        name: id.to_string(),
        archive_name: format!("{}.7z", id),
        mod_path,
        data_path,
        plugin_files: files.iter().map(|(name, _)| name.to_string()).collect(),
        enabled,
        kind: ModKind::Content,
    }
}

fn listing(dir: &Utf8Path) -> BTreeSet<String> {
    dir.read_dir_utf8()
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string())
        .collect()
}

#[test]
fn test_enable_is_idempotent() {
    let fx = fixture();
    let record = installed(&fx.root, "a", &[("A.esp", "a"), ("A.esm", "m")], true);

    fx.projector.enable(&record).unwrap();
    let once = listing(fx.projector.virtual_dir());
    fx.projector.enable(&record).unwrap();

    assert_eq!(listing(fx.projector.virtual_dir()), once);
    assert_eq!(once, BTreeSet::from(["A.esm".to_string(), "A.esp".to_string()]));
}

#[test]
fn test_disable_skips_absent_files() {
    let fx = fixture();
    let record = installed(&fx.root, "a", &[("A.esp", "a"), ("B.esp", "b")], true);
    fx.projector.enable(&record).unwrap();
    fs::remove_file(fx.projector.virtual_dir().join("B.esp")).unwrap();

    assert_eq!(fx.projector.disable(&record).unwrap(), 1);
    assert_eq!(fx.projector.disable(&record).unwrap(), 0);
    assert!(listing(fx.projector.virtual_dir()).is_empty());
}

#[test]
fn test_disabling_one_mod_keeps_disjoint_files() {
    let fx = fixture();
    let a = installed(&fx.root, "a", &[("A.esp", "from a")], true);
    let b = installed(&fx.root, "b", &[("B.esp", "from b")], true);
    fx.projector.reconcile(&[a.clone(), b]).unwrap();

    fx.projector.disable(&a).unwrap();

    let virtual_dir = fx.projector.virtual_dir();
    assert!(!virtual_dir.join("A.esp").exists());
    assert_eq!(fs::read_to_string(virtual_dir.join("B.esp")).unwrap(), "from b");
    assert_eq!(listing(virtual_dir), BTreeSet::from(["B.esp".to_string()]));
}

#[test]
fn test_overlap_last_writer_wins() {
    let fx = fixture();
    let first = installed(&fx.root, "first", &[("Shared.esp", "first")], true);
    let second = installed(&fx.root, "second", &[("Shared.esp", "second")], true);
    let shared = fx.projector.virtual_dir().join("Shared.esp");

    fx.projector.reconcile(&[first.clone(), second.clone()]).unwrap();
    assert_eq!(fs::read_to_string(&shared).unwrap(), "second");

    fx.projector.reconcile(&[second, first.clone()]).unwrap();
    assert_eq!(fs::read_to_string(&shared).unwrap(), "first");

    // Disabling either owner withdraws the shared name
    fx.projector.disable(&first).unwrap();
    assert!(!shared.exists());
}

#[test]
fn test_reconcile_leaves_unmanaged_files() {
    let fx = fixture();
    fs::write(fx.projector.virtual_dir().join("Skyrim.esm"), "base").unwrap();
    let record = installed(&fx.root, "a", &[("A.esp", "a")], true);

    fx.projector.reconcile(&[record]).unwrap();

    assert_eq!(
        listing(fx.projector.virtual_dir()),
        BTreeSet::from(["A.esp".to_string(), "Skyrim.esm".to_string()])
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_reconcile_converges_on_enabled_files(flags in proptest::collection::vec(any::<bool>(), 1..5)) {
        let fx = fixture();
        let records: Vec<ModRecord> = flags
            .iter()
            .enumerate()
            .map(|(i, enabled)| {
                let file = format!("Mod{}.esp", i);
                installed(&fx.root, &format!("mod{}", i), &[(file.as_str(), "x")], *enabled)
            })
            .collect();

        fx.projector.reconcile(&records).unwrap();
        let first = listing(fx.projector.virtual_dir());
        fx.projector.reconcile(&records).unwrap();
        let second = listing(fx.projector.virtual_dir());

        let expected: BTreeSet<String> = records
            .iter()
            .filter(|r| r.enabled)
            .flat_map(|r| r.plugin_files.clone())
            .collect();
        prop_assert_eq!(&first, &expected);
        prop_assert_eq!(first, second);
    }
}
