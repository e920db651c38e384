//! Run state persistence through the public API

use recsys_common::ResourceKind;
use recsys_coordinator::state::{RunSettings, RunState, StateStore, SupportResources};

fn partial_run() -> RunState {
    let mut state = RunState::new(RunSettings::default());
    for kind in [
        ResourceKind::DatasetGroup,
        ResourceKind::Schema,
        ResourceKind::Dataset,
        ResourceKind::ImportJob,
        ResourceKind::Solution,
    ] {
        state.record(kind, format!("arn:aws:personalize:us-east-1:123456789012:{kind}/demo"));
    }
    state.set_pending(
        ResourceKind::SolutionVersion,
        "arn:aws:personalize:us-east-1:123456789012:solution/demo/abc123",
    );
    state.support = SupportResources {
        bucket: Some("123456789012-us-east-1-it-service-bucket".to_string()),
        data_location: Some("s3://123456789012-us-east-1-it-service-bucket/interactions.csv".to_string()),
        bucket_policy: true,
        role_name: Some("PersonalizeITServiceRole".to_string()),
        role_arn: Some("arn:aws:iam::123456789012:role/PersonalizeITServiceRole".to_string()),
        role_adopted: true,
    };
    state
}

#[test]
fn persist_then_reload_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("nested").join("run-state.json"));
    let state = partial_run();

    store.save(&state).unwrap();
    let loaded = store.load().unwrap().expect("state should exist");

    assert_eq!(loaded, state);
    assert_eq!(
        loaded.pending().map(|p| p.kind),
        Some(ResourceKind::SolutionVersion)
    );
}

#[test]
fn reload_preserves_teardown_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("run-state.json"));
    let state = partial_run();
    store.save(&state).unwrap();

    let loaded = store.load().unwrap().unwrap();
    let kinds: Vec<_> = loaded.teardown_targets().iter().map(|t| t.kind).collect();
    assert_eq!(kinds.first(), Some(&ResourceKind::SolutionVersion));
    assert_eq!(kinds.last(), Some(&ResourceKind::DatasetGroup));
    assert_eq!(kinds.len(), 6);
}

#[test]
fn missing_file_loads_as_none_and_removes_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("absent.json"));

    assert!(store.load().unwrap().is_none());
    store.remove().unwrap();
}

#[test]
fn saved_file_is_readable_json() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("run-state.json"));
    store.save(&partial_run()).unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value["resources"]["dataset_group"].is_string());
    assert_eq!(value["pending"]["kind"], "solution_version");
    assert_eq!(value["support"]["role_adopted"], true);
}
