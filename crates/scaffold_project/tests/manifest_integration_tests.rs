//! Integration tests for project manifests.

use std::fs;

use scaffold_project::{
    AppliedTemplate, Change, HistoryAction, ManifestStore, ProjectError, ProjectManifest,
};
use tempfile::tempdir;

fn saved_project(root: &std::path::Path) -> ProjectManifest {
    let mut manifest = ProjectManifest::new("demo");
    manifest
        .templates
        .push(AppliedTemplate::new("a".repeat(64), "app", "tester").with_alias(Some("node".into())));
    manifest.variables.insert("PROJECT_NAME".into(), "demo".into());
    manifest.record(HistoryAction::Create, vec![Change::added("app/src", "Created from node")]);
    ManifestStore::new().save(root, &mut manifest).unwrap();
    manifest
}

#[test]
fn test_save_and_load() {
    let temp = tempdir().unwrap();
    let saved = saved_project(temp.path());

    let loaded = ManifestStore::new().load(temp.path()).unwrap();
    assert_eq!(loaded.id, saved.id);
    assert_eq!(loaded.name, "demo");
    assert_eq!(loaded.templates[0].alias.as_deref(), Some("node"));
    assert_eq!(loaded.variables["PROJECT_NAME"], "demo");
    assert_eq!(loaded.history.len(), 1);
    assert_eq!(loaded.history[0].action, HistoryAction::Create);
    assert!(!temp.path().join(".scaffold/project.yaml.tmp").exists());
}

#[test]
fn test_find_from_nested_directory() {
    let temp = tempdir().unwrap();
    saved_project(temp.path());
    let nested = temp.path().join("app").join("src").join("deep");
    fs::create_dir_all(&nested).unwrap();

    let (root, manifest) = ManifestStore::new().find(&nested).unwrap().unwrap();
    assert_eq!(root, temp.path().canonicalize().unwrap());
    assert_eq!(manifest.name, "demo");
}

#[test]
fn test_find_respects_depth_bound() {
    let temp = tempdir().unwrap();
    saved_project(temp.path());
    let nested = temp.path().join("a").join("b").join("c");
    fs::create_dir_all(&nested).unwrap();

    assert!(ManifestStore::new().with_max_depth(2).find_root(&nested).is_none());
    assert!(ManifestStore::new().with_max_depth(3).find_root(&nested).is_some());
}

#[test]
fn test_nearest_manifest_wins() {
    let temp = tempdir().unwrap();
    saved_project(temp.path());
    let inner = temp.path().join("packages").join("inner");
    fs::create_dir_all(&inner).unwrap();
    let mut inner_manifest = ProjectManifest::new("inner");
    ManifestStore::new().save(&inner, &mut inner_manifest).unwrap();

    let (_, found) = ManifestStore::new().find(inner.join("src")).unwrap().unwrap();
    assert_eq!(found.name, "inner");
}

#[test]
fn test_corrupt_manifest_is_a_hard_failure() {
    let temp = tempdir().unwrap();
    let path = ManifestStore::manifest_path(temp.path());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "id: not-a-uuid\nname: [").unwrap();

    let err = ManifestStore::new().find(temp.path()).unwrap_err();
    assert!(matches!(err, ProjectError::InvalidManifest { .. }));
}

#[test]
fn test_load_missing() {
    let temp = tempdir().unwrap();
    assert!(matches!(
        ManifestStore::new().load(temp.path()),
        Err(ProjectError::NotFound(_))
    ));
}
