//! Loading persistence mappings from files.

mod common;

use common::*;
use trellis_persistence::MappingRegistry;
use trellis_persistence::error::{MappingError, StorageError};
use trellis_persistence::mapping::FieldType;

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_reads_mapping_file() {
    let file = write_temp(MAPPINGS_JSON);
    let registry = MappingRegistry::load(&[file.path()]).unwrap();

    assert_eq!(registry.len(), 5);
    assert_eq!(registry.classes()[0], COMPANY);
    let employee = registry.get(EMPLOYEE).unwrap();
    assert_eq!(employee.type_of_field("hiredAt"), Some(FieldType::DateTime));
    assert_eq!(employee.column("hiredAt").unwrap(), "hired_at");
}

#[test]
fn test_same_class_in_two_files_is_rejected() {
    let first = write_temp(MAPPINGS_JSON);
    let second = write_temp(MAPPINGS_JSON);
    let err = MappingRegistry::load(&[first.path(), second.path()]).unwrap_err();

    assert!(matches!(
        err,
        StorageError::Mapping(MappingError::DuplicateClass { ref class }) if class == COMPANY
    ));
}

#[test]
fn test_missing_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.json");
    let err = MappingRegistry::load(&[&path]).unwrap_err();

    match err {
        StorageError::Mapping(MappingError::LoadFailed { path: reported, .. }) => {
            assert_eq!(reported, path.display().to_string());
        }
        other => panic!("Expected LoadFailed, got {:?}", other),
    }
}

#[test]
fn test_invalid_json_names_the_file() {
    let file = write_temp("{ \"classes\": [");
    let err = MappingRegistry::load(&[file.path()]).unwrap_err();

    assert!(err.to_string().contains(&file.path().display().to_string()));
    assert!(err.to_string().contains("Invalid JSON"));
}

#[test]
fn test_unmapped_association_target_is_rejected_after_loading() {
    let file = write_temp(
        r#"{ "classes": [ {
            "class": "App\\Entity\\Badge",
            "table": "badge",
            "identifiers": ["id"],
            "fields": [ { "name": "id", "type": "integer" } ],
            "associations": [ { "name": "employee", "kind": "many_to_one", "target": "App\\Entity\\Employee" } ]
        } ] }"#,
    );
    let err = MappingRegistry::load(&[file.path()]).unwrap_err();

    assert!(matches!(
        err,
        StorageError::Mapping(MappingError::InvalidMapping { .. })
    ));
}
