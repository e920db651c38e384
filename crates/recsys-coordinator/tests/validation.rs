//! Training-data validation against files on disk

use recsys_coordinator::dataset::{ValidationError, ValidationThresholds, validate_interactions};
use recsys_test_utils::{InteractionShape, interactions_csv, valid_interactions_file, write_csv};

#[test]
fn generated_fixture_passes_default_thresholds() {
    let file = valid_interactions_file();
    let stats = validate_interactions(file.path(), &ValidationThresholds::default()).unwrap();

    assert_eq!(stats.interactions, 1200);
    assert_eq!(stats.distinct_users, 30);
    assert_eq!(stats.distinct_items, 10);
    assert_eq!(stats.event_types, 2);
    assert!(stats.first_timestamp < stats.last_timestamp);
}

#[test]
fn too_few_users_fails_fast() {
    let file = write_csv(&interactions_csv(InteractionShape {
        users: 10,
        ..InteractionShape::default()
    }));

    let err = validate_interactions(file.path(), &ValidationThresholds::default()).unwrap_err();
    assert!(matches!(err, ValidationError::TooFewUsers { .. }), "{err}");
}

#[test]
fn thresholds_are_configurable() {
    let file = write_csv(&interactions_csv(InteractionShape {
        users: 3,
        items: 2,
        rows: 50,
    }));
    let thresholds = ValidationThresholds {
        min_interactions: 50,
        min_users: 3,
        min_items: 2,
    };

    assert!(validate_interactions(file.path(), &thresholds).is_ok());
}

#[test]
fn missing_file_is_a_read_error() {
    let err = validate_interactions(
        std::path::Path::new("/nonexistent/interactions.csv"),
        &ValidationThresholds::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ValidationError::Read { .. }), "{err}");
}
