//! End-to-end CLI tests
//!
//! Each test runs the real binary against a throwaway project and a
//! throwaway `ELM_HOME` with a v2 registry index, so nothing here ever
//! touches the network.


use assert_cmd::Command;
use predicates::prelude::*;
use test_utils::{TestCache, TestProject};

fn elmpm() -> Command {
    Command::cargo_bin("elmpm").expect("binary builds")
}

const BASE_APP: &str = r#"{
    "type": "application",
    "source-directories": ["src"],
    "elm-version": "0.19.1",
    "dependencies": {
        "direct": { "elm/core": "1.0.5" },
        "indirect": {}
    },
    "test-dependencies": { "direct": {}, "indirect": {} }
}"#;

#[test]
fn test_install_new_direct_dep() {
    let project = TestProject::new(BASE_APP);
    let cache = TestCache::new();
    cache.add_package("elm/core", "1.0.5", &[], &["Basics"]);
    cache.add_package("elm/html", "2.0.0", &[("elm/core", "1.0.0 <= v < 2.0.0")], &["Html"]);
    cache.write_registry(
        r#"{
        "elm/core": [{"version": "1.0.5", "status": "valid"}],
        "elm/html": [
            {"version": "2.0.0", "status": "valid", "dependencies": {"elm/core": "1.0.0 <= v < 2.0.0"}},
            {"version": "1.0.0", "status": "valid", "dependencies": {"elm/core": "1.0.0 <= v < 2.0.0"}}
        ]
    }"#,
    );

    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["install", "elm/html@2.0.0", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Add elm/html 2.0.0"));

    let manifest = project.manifest();
    assert!(manifest.contains("\"elm/html\": \"2.0.0\""), "{}", manifest);
    // Still pinned where it was.
    assert!(manifest.contains("\"elm/core\": \"1.0.5\""), "{}", manifest);
}

#[test]
fn test_install_promotes_indirect_to_direct() {
    let project = TestProject::new(
        r#"{
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": { "elm/core": "1.0.5" },
            "indirect": { "elm/json": "1.1.3" }
        },
        "test-dependencies": { "direct": {}, "indirect": {} }
    }"#,
    );
    let cache = TestCache::new();
    cache.write_registry("{}");

    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["install", "elm/json", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Promote elm/json"));

    let manifest = project.manifest();
    let direct_section = manifest.split("\"indirect\"").next().unwrap();
    assert!(direct_section.contains("\"elm/json\""), "{}", manifest);
}

#[test]
fn test_cross_major_install_blocked_reports_blocker() {
    let before = r#"{
    "type": "application",
    "source-directories": ["src"],
    "elm-version": "0.19.1",
    "dependencies": {
        "direct": { "pkg/a": "1.0.0" },
        "indirect": { "target/x": "1.0.0" }
    },
    "test-dependencies": { "direct": {}, "indirect": {} }
}"#;
    let project = TestProject::new(before);
    let cache = TestCache::new();
    cache.write_registry(
        r#"{
        "pkg/a": [{"version": "1.0.0", "status": "valid", "dependencies": {"target/x": "1.0.0 <= v < 2.0.0"}}],
        "target/x": [
            {"version": "2.0.0", "status": "valid"},
            {"version": "1.0.0", "status": "valid"}
        ]
    }"#,
    );

    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["install", "--major", "target/x", "--yes"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("pkg/a 1.0.0"));

    // All-or-nothing: the manifest is untouched.
    assert_eq!(project.manifest(), before);
}

#[test]
fn test_remove_clears_package() {
    let project = TestProject::new(
        r#"{
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": { "elm/core": "1.0.5", "elm/html": "2.0.0" },
            "indirect": {}
        },
        "test-dependencies": { "direct": {}, "indirect": {} }
    }"#,
    );
    let cache = TestCache::new();

    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["remove", "elm/html", "--yes"])
        .assert()
        .success();

    let manifest = project.manifest();
    assert!(!manifest.contains("elm/html"), "{}", manifest);
    assert!(manifest.contains("elm/core"), "{}", manifest);
}

#[test]
fn test_build_plan_topology() {
    let project = TestProject::new(BASE_APP)
        .with_source(
            "src/Main.elm",
            "module Main exposing (main)\n\nimport A\nimport B\n\nmain : Int\nmain =\n    0\n",
        )
        .with_source("src/A.elm", "module A exposing (..)\n\nimport B\n")
        .with_source("src/B.elm", "module B exposing (..)\n");
    let cache = TestCache::new();
    cache.add_package("elm/core", "1.0.5", &[], &["Basics"]);

    let output = elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["build", "--json", "src/Main.elm"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let plan: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON plan");
    let order: Vec<&str> = plan["buildOrder"]
        .as_array()
        .unwrap()
        .iter()
        .map(|module| module["name"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec!["B", "A", "Main"]);

    let batches = plan["parallelBatches"].as_array().unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0]["level"], 0);
    assert_eq!(batches[0]["modules"][0], "B");
    assert_eq!(batches[1]["modules"][0], "A");
    assert_eq!(batches[2]["modules"][0], "Main");

    let main = plan["buildOrder"]
        .as_array()
        .unwrap()
        .iter()
        .find(|module| module["name"] == "Main")
        .unwrap();
    assert_eq!(main["hasMain"], true);
}

#[test]
fn test_build_check_no_aborts_cleanly() {
    let project = TestProject::new(BASE_APP)
        .with_source("src/Main.elm", "module Main exposing (..)\n");
    let cache = TestCache::new();
    cache.add_package("elm/core", "1.0.5", &[], &["Basics"]);

    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["build", "check", "--no", "src/Main.elm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Aborted."));
}

#[test]
fn test_artifact_freshness_mismatch_is_stale() {
    use elmpm::{ArtifactFingerprint, Fingerprint, PackageName, Version};

    let project = TestProject::new(
        r#"{
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": { "a/b": "2.0.0", "x/y": "1.0.0" },
            "indirect": {}
        },
        "test-dependencies": { "direct": {}, "indirect": {} }
    }"#,
    )
    .with_source("src/Main.elm", "module Main exposing (..)\n");
    let cache = TestCache::new();
    cache.add_package("a/b", "2.0.0", &[], &[]);
    cache.add_package("x/y", "1.0.0", &[("a/b", "1.0.0 <= v < 3.0.0")], &[]);

    // x/y was last built against a/b 1.0.0; the manifest now pins 2.0.0.
    let stored = ArtifactFingerprint {
        fingerprints: vec![[(
            PackageName::parse("a/b").unwrap(),
            Version::new(1, 0, 0),
        )]
        .into_iter()
        .collect::<Fingerprint>()],
    };
    std::fs::write(cache.artifacts_path("x/y", "1.0.0"), stored.encode()).unwrap();

    let output = elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["build", "--json", "src/Main.elm"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let plan: serde_json::Value = serde_json::from_slice(&output).expect("valid JSON plan");
    let xy = plan["packageBuildOrder"]
        .as_array()
        .unwrap()
        .iter()
        .find(|pkg| pkg["name"] == "x/y")
        .unwrap();
    assert_eq!(xy["artifactStatus"], "stale");
    assert_eq!(plan["summary"]["packagesStale"], 1);
}

#[test]
fn test_extract_rejects_leaky_imports() {
    let project = TestProject::new(BASE_APP)
        .with_source("src/Foo.elm", "module Foo exposing (..)\n\nimport Bar\n")
        .with_source("src/Bar.elm", "module Bar exposing (..)\n");
    let cache = TestCache::new();
    let before = project.manifest();

    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["extract", "me/pkg", "extracted-pkg", "src/Foo.elm"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Foo imports Bar"));

    // Nothing moved, nothing written.
    assert!(!project.path().join("extracted-pkg").exists());
    assert_eq!(project.manifest(), before);
}

#[test]
fn test_extract_self_contained_selection() {
    let project = TestProject::new(BASE_APP)
        .with_source(
            "src/Widgets.elm",
            "module Widgets exposing (..)\n\nimport Widgets.Button\n",
        )
        .with_source(
            "src/Widgets/Button.elm",
            "module Widgets.Button exposing (..)\n",
        );
    let cache = TestCache::new();
    cache.add_package("elm/core", "1.0.5", &[], &["Basics"]);

    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args([
            "extract",
            "me/widgets",
            "extracted-widgets",
            "src/Widgets.elm",
            "src/Widgets/Button.elm",
        ])
        .assert()
        .success();

    let target = project.path().join("extracted-widgets");
    assert!(target.join("elm.json").exists());
    assert!(target.join("src/Widgets.elm").exists());
    assert!(target.join("src/Widgets/Button.elm").exists());

    let new_manifest = std::fs::read_to_string(target.join("elm.json")).unwrap();
    assert!(new_manifest.contains("\"me/widgets\""), "{}", new_manifest);
    assert!(new_manifest.contains("\"Widgets\""), "{}", new_manifest);

    let app_manifest = project.manifest();
    assert!(app_manifest.contains("\"me/widgets\": \"1.0.0\""), "{}", app_manifest);
    assert!(app_manifest.contains("\"local-dependencies\""), "{}", app_manifest);
}

#[test]
fn test_cache_missing_lists_and_aborts() {
    let project = TestProject::new(BASE_APP);
    let cache = TestCache::new();

    // elm/core 1.0.5 is pinned but not cached; --no via stdin "n".
    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["cache", "missing"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("elm/core 1.0.5"))
        .stdout(predicate::str::contains("Aborted."));
}

#[test]
fn test_confirmation_defaults_to_yes_on_empty_input() {
    let project = TestProject::new(
        r#"{
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": { "elm/core": "1.0.5" },
            "indirect": {}
        },
        "test-dependencies": { "direct": {}, "indirect": {} }
    }"#,
    );
    let cache = TestCache::new();

    elmpm()
        .current_dir(project.path())
        .env("ELM_HOME", cache.path())
        .args(["remove", "elm/core"])
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed elm/core"));

    assert!(!project.manifest().contains("elm/core"));
}
