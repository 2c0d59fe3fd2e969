//! Tests for ObjectStoreRoot lifecycle
//!
//! These tests verify:
//! - Open/create semantics and the Created/Opened status
//! - One live storage per attribute id
//! - Close idempotence and StoreClosed afterwards

use std::path::PathBuf;

use offstore::{Config, IndexMode, ObjectStoreRoot, OffError, OpenStatus, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_uri() -> (TempDir, String, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("objects.db");
    let uri = format!("file:{}", path.display());
    (temp_dir, uri, path)
}

// =============================================================================
// Open Tests
// =============================================================================

#[test]
fn test_open_missing_store_fails() {
    let (_temp, uri, path) = setup_temp_uri();

    let result = ObjectStoreRoot::open(&uri, false);

    assert!(matches!(result, Err(OffError::StoreNotFound(_))));
    assert!(!path.exists());
}

#[test]
fn test_open_missing_memory_store_fails() {
    assert!(matches!(
        ObjectStoreRoot::open("memory:", false),
        Err(OffError::StoreNotFound(_))
    ));
}

#[test]
fn test_create_then_reopen_status() {
    let (_temp, uri, path) = setup_temp_uri();

    let root = ObjectStoreRoot::open(&uri, true).unwrap();
    assert_eq!(root.status(), OpenStatus::Created);
    assert!(root.is_created());
    assert!(path.exists());
    root.close().unwrap();

    let root = ObjectStoreRoot::open(&uri, true).unwrap();
    assert_eq!(root.status(), OpenStatus::Opened);
    assert!(!root.is_created());
}

#[test]
fn test_bare_path_uri() {
    let (_temp, _uri, path) = setup_temp_uri();

    let root = ObjectStoreRoot::open(path.to_str().unwrap(), true).unwrap();

    assert!(root.is_created());
    assert!(path.exists());
}

#[test]
fn test_unknown_scheme_rejected() {
    assert!(matches!(
        ObjectStoreRoot::open("ftp:somewhere", true),
        Err(OffError::InvalidUri(_))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let config = Config::builder()
        .uri("memory:")
        .create_if_missing(true)
        .compaction_threshold(-1.0)
        .build();

    assert!(matches!(ObjectStoreRoot::open_with(config), Err(OffError::Config(_))));
}

// =============================================================================
// Attribute Registry Tests
// =============================================================================

#[test]
fn test_attribute_returns_same_live_instance() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();

    let first = root.attribute(1, false).unwrap();
    first.set(5, "five").unwrap();

    let second = root.attribute(1, false).unwrap();
    assert_eq!(second.get(5).unwrap(), Value::from("five"));

    second.set(6, "six").unwrap();
    assert_eq!(first.len().unwrap(), 2);
}

#[test]
fn test_reversed_hint_applies_only_on_creation() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();

    let eager = root.attribute(1, true).unwrap();
    assert_eq!(eager.mode().unwrap(), IndexMode::Reversed);

    let lazy = root.attribute(2, false).unwrap();
    assert_eq!(lazy.mode().unwrap(), IndexMode::ForwardOnly);

    // A later hint does not change an existing attribute's mode.
    assert_eq!(root.attribute(2, true).unwrap().mode().unwrap(), IndexMode::ForwardOnly);
}

#[test]
fn test_attribute_ids_lists_registered() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();

    root.attribute(7, false).unwrap();
    root.attribute(3, true).unwrap();

    assert_eq!(root.attribute_ids().unwrap(), vec![3, 7]);
}

#[test]
fn test_existing_attribute_never_registers() {
    let (_temp, uri, _path) = setup_temp_uri();
    {
        let root = ObjectStoreRoot::open(&uri, true).unwrap();
        root.attribute(1, false).unwrap().set(10, 3i64).unwrap();

        assert!(root.existing_attribute(42).unwrap().is_none());
        root.close().unwrap();
    }

    let root = ObjectStoreRoot::open(&uri, false).unwrap();
    assert_eq!(root.attribute_ids().unwrap(), vec![1]);

    let attr = root.existing_attribute(1).unwrap().unwrap();
    assert_eq!(attr.get(10).unwrap(), Value::Int(3));
}

#[test]
fn test_existing_attribute_shares_live_instance() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();
    let created = root.attribute(5, true).unwrap();
    created.set(1, 9i64).unwrap();

    let found = root.existing_attribute(5).unwrap().unwrap();

    assert_eq!(found.find(&Value::Int(9)).unwrap(), vec![1]);
    assert!(found.is_reversed().unwrap());
}

#[test]
fn test_existing_attribute_after_close_fails() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();
    root.close().unwrap();

    assert!(matches!(root.existing_attribute(1), Err(OffError::StoreClosed)));
}

#[test]
fn test_handles_share_state_across_threads() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();
    let attr = root.attribute(1, true).unwrap();

    let writer = attr.clone();
    std::thread::spawn(move || {
        for x in 0..100u64 {
            writer.set(x, (x % 10) as i64).unwrap();
        }
    })
    .join()
    .unwrap();

    assert_eq!(attr.find(&Value::Int(3)).unwrap().len(), 10);
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_get_after_close_is_store_closed() {
    let (_temp, uri, _path) = setup_temp_uri();
    let root = ObjectStoreRoot::open(&uri, true).unwrap();
    let attr = root.attribute(1, false).unwrap();
    attr.set(1, 10).unwrap();

    root.close().unwrap();

    assert!(matches!(attr.get(1), Err(OffError::StoreClosed)));
}

#[test]
fn test_every_handle_operation_fails_after_close() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();
    let attr = root.attribute(1, false).unwrap();
    root.close().unwrap();

    assert!(matches!(attr.set(1, 1), Err(OffError::StoreClosed)));
    assert!(matches!(attr.find(&Value::Int(1)), Err(OffError::StoreClosed)));
    assert!(matches!(attr.set_reverse(), Err(OffError::StoreClosed)));
    assert!(matches!(attr.delete(1), Err(OffError::StoreClosed)));
    assert!(matches!(attr.len(), Err(OffError::StoreClosed)));
}

#[test]
fn test_root_operations_fail_after_close() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();
    root.close().unwrap();

    assert!(root.is_closed());
    assert!(matches!(root.attribute(1, false), Err(OffError::StoreClosed)));
    assert!(matches!(root.flush(), Err(OffError::StoreClosed)));
    assert!(matches!(root.compact(), Err(OffError::StoreClosed)));
    assert!(matches!(root.metadata("k"), Err(OffError::StoreClosed)));
    assert!(matches!(root.set_metadata("k", "v"), Err(OffError::StoreClosed)));
    assert!(matches!(root.attribute_ids(), Err(OffError::StoreClosed)));
}

#[test]
fn test_close_is_idempotent() {
    let (_temp, uri, _path) = setup_temp_uri();
    let root = ObjectStoreRoot::open(&uri, true).unwrap();

    root.close().unwrap();
    root.close().unwrap();
}

#[test]
fn test_key_not_found_through_handle() {
    let root = ObjectStoreRoot::open("memory:", true).unwrap();
    let attr = root.attribute(2, true).unwrap();

    assert!(matches!(attr.get(8), Err(OffError::KeyNotFound { attribute: 2, id: 8 })));
    assert!(matches!(attr.delete(8), Err(OffError::KeyNotFound { attribute: 2, id: 8 })));
}
