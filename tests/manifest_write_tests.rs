//! Manifest writing guarantees: canonical bytes and atomicity.


use std::fs;

use elmpm::{Manifest, PackageName, Version};
use test_utils::TestProject;

const APP: &str = r#"{
    "type": "application",
    "source-directories": ["src"],
    "elm-version": "0.19.1",
    "dependencies": {
        "direct": { "elm/core": "1.0.5" },
        "indirect": {}
    },
    "test-dependencies": { "direct": {}, "indirect": {} }
}"#;

fn pkg(s: &str) -> PackageName {
    PackageName::parse(s).unwrap()
}

#[test]
fn test_write_canonicity_across_insert_orders() {
    let project_a = TestProject::new(APP);
    let project_b = TestProject::new(APP);

    let mut a = Manifest::load(&project_a.path().join("elm.json")).unwrap();
    let mut b = Manifest::load(&project_b.path().join("elm.json")).unwrap();

    a.add_or_update(&pkg("elm/time"), Version::new(1, 0, 0), false, true, false);
    a.add_or_update(&pkg("elm/html"), Version::new(1, 0, 0), false, true, false);
    b.add_or_update(&pkg("elm/html"), Version::new(1, 0, 0), false, true, false);
    b.add_or_update(&pkg("elm/time"), Version::new(1, 0, 0), false, true, false);

    a.save(&project_a.path().join("elm.json")).unwrap();
    b.save(&project_b.path().join("elm.json")).unwrap();

    assert_eq!(project_a.manifest(), project_b.manifest());
}

#[test]
fn test_save_leaves_no_tempfile() {
    let project = TestProject::new(APP);
    let path = project.path().join("elm.json");
    let manifest = Manifest::load(&path).unwrap();
    manifest.save(&path).unwrap();

    assert!(path.exists());
    assert!(!project.path().join("elm.json.tmp").exists());
    let leftovers: Vec<_> = fs::read_dir(project.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext == "tmp")
                .unwrap_or(false)
        })
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_failed_write_preserves_original() {
    let project = TestProject::new(APP);
    let path = project.path().join("elm.json");
    let manifest = Manifest::load(&path).unwrap();
    let original = project.manifest();

    // Block the tempfile slot with a directory so the write fails
    // before the rename.
    fs::create_dir(project.path().join("elm.json.tmp")).unwrap();
    assert!(manifest.save(&path).is_err());
    assert_eq!(project.manifest(), original);
}

#[test]
fn test_write_ends_with_newline_and_four_space_indent() {
    let project = TestProject::new(APP);
    let path = project.path().join("elm.json");
    let manifest = Manifest::load(&path).unwrap();
    manifest.save(&path).unwrap();

    let written = project.manifest();
    assert!(written.ends_with("}\n"));
    assert!(written.contains("\n    \"type\": \"application\""));
    assert!(written.contains("\n        \"direct\""));
}
