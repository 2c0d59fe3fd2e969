//! Tests for AttributeStorage
//!
//! These tests verify:
//! - Basic set/get/delete operations
//! - KeyNotFound on absent ids
//! - Forward/reverse consistency under arbitrary edits
//! - Bucket ordering and deletion pruning

use offstore::{AttributeStorage, IndexMode, OffError, Value};

// =============================================================================
// Helper Functions
// =============================================================================

/// Deterministic pseudo-random sequence (xorshift) so edits look arbitrary
fn xorshift(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

/// Check both directions using only the public API
fn assert_consistent(storage: &AttributeStorage) {
    for (id, value) in storage.iter() {
        assert!(
            storage.find(value).contains(&id),
            "id {} missing from bucket {}",
            id,
            value
        );
    }
    for (value, count) in storage.value_counts() {
        let ids = storage.find(&value);
        assert_eq!(ids.len(), count);
        for id in ids {
            assert_eq!(storage.get(id).unwrap(), &value);
        }
    }
}

fn assert_strictly_ascending(ids: &[u64]) {
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "not strictly ascending: {:?}", ids);
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_storage_is_empty() {
    let storage = AttributeStorage::new(3, false);
    assert_eq!(storage.id(), 3);
    assert_eq!(storage.len(), 0);
    assert!(storage.is_empty());
    assert_eq!(storage.mode(), IndexMode::ForwardOnly);
}

#[test]
fn test_constructor_flag_sets_mode() {
    assert_eq!(AttributeStorage::new(1, true).mode(), IndexMode::Reversed);
    assert!(AttributeStorage::new(1, true).is_reversed());
    assert!(!AttributeStorage::new(1, false).is_reversed());
}

#[test]
fn test_set_and_get() {
    let mut storage = AttributeStorage::new(1, false);

    storage.set(10, 42);
    storage.set(11, 2.5);
    storage.set(12, "blue");

    assert_eq!(storage.get(10).unwrap(), &Value::Int(42));
    assert_eq!(storage.get(11).unwrap(), &Value::Float(2.5));
    assert_eq!(storage.get(12).unwrap(), &Value::from("blue"));
    assert_eq!(storage.len(), 3);
}

#[test]
fn test_set_overwrites() {
    let mut storage = AttributeStorage::new(1, false);

    storage.set(1, "old");
    storage.set(1, "new");

    assert_eq!(storage.get(1).unwrap(), &Value::from("new"));
    assert_eq!(storage.len(), 1);
}

#[test]
fn test_get_absent_id_is_key_not_found() {
    let storage = AttributeStorage::new(4, true);

    let err = storage.get(99).unwrap_err();
    assert!(matches!(err, OffError::KeyNotFound { attribute: 4, id: 99 }));
    assert!(err.is_key_not_found());
}

#[test]
fn test_zero_value_is_not_absence() {
    let mut storage = AttributeStorage::new(1, false);
    storage.set(5, 0);
    assert_eq!(storage.get(5).unwrap(), &Value::Int(0));
}

#[test]
fn test_delete_returns_old_value() {
    let mut storage = AttributeStorage::new(1, false);
    storage.set(1, 7);

    assert_eq!(storage.delete(1).unwrap(), Value::Int(7));
    assert!(!storage.contains(1));
    assert!(storage.get(1).unwrap_err().is_key_not_found());
}

#[test]
fn test_delete_absent_id_is_key_not_found() {
    let mut storage = AttributeStorage::new(1, true);
    storage.set(1, 7);
    storage.delete(1).unwrap();

    assert!(matches!(
        storage.delete(1),
        Err(OffError::KeyNotFound { attribute: 1, id: 1 })
    ));
}

#[test]
fn test_iter_is_ascending_by_id() {
    let mut storage = AttributeStorage::new(1, false);
    for id in [9u64, 2, 5, 1] {
        storage.set(id, id as i64);
    }

    let ids: Vec<u64> = storage.iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 2, 5, 9]);
}

// =============================================================================
// Find Tests
// =============================================================================

#[test]
fn test_find_absent_value_is_empty() {
    let mut storage = AttributeStorage::new(1, true);
    storage.set(1, 1);
    assert!(storage.find(&Value::Int(2)).is_empty());

    let mut scan = AttributeStorage::new(1, false);
    scan.set(1, 1);
    assert!(scan.find(&Value::Int(2)).is_empty());
}

#[test]
fn test_find_is_type_stable() {
    let mut storage = AttributeStorage::new(1, true);
    storage.set(1, 1);
    storage.set(2, 1.0);
    storage.set(3, "1");

    assert_eq!(storage.find(&Value::Int(1)), vec![1]);
    assert_eq!(storage.find(&Value::Float(1.0)), vec![2]);
    assert_eq!(storage.find(&Value::from("1")), vec![3]);
}

#[test]
fn test_forward_only_find_does_not_materialize() {
    let mut storage = AttributeStorage::new(1, false);
    storage.set(1, 5);

    assert_eq!(storage.find(&Value::Int(5)), vec![1]);
    assert_eq!(storage.mode(), IndexMode::ForwardOnly);
}

#[test]
fn test_find_ascending_without_duplicates() {
    for reversed in [false, true] {
        let mut storage = AttributeStorage::new(1, reversed);
        // Insert in descending order and repeat every pair.
        for x in (0..50u64).rev() {
            storage.set(x, (x % 4) as i64);
            storage.set(x, (x % 4) as i64);
        }
        for v in 0..4 {
            let ids = storage.find(&Value::Int(v));
            assert_eq!(ids.len(), 13 - (v as usize + 2) / 4);
            assert_strictly_ascending(&ids);
        }
    }
}

// =============================================================================
// Consistency Tests
// =============================================================================

#[test]
fn test_consistency_after_random_edits() {
    let mut storage = AttributeStorage::new(1, true);
    let mut state = 0x9E37_79B9_7F4A_7C15u64;

    for _ in 0..2_000 {
        let r = xorshift(&mut state);
        let id = r % 64;
        if r % 5 == 0 {
            let _ = storage.delete(id);
        } else {
            storage.set(id, ((r >> 8) % 9) as i64);
        }
    }

    assert_consistent(&storage);
}

#[test]
fn test_delete_prunes_id_from_every_bucket() {
    let mut storage = AttributeStorage::new(1, true);
    for x in 0..30u64 {
        storage.set(x, (x % 3) as i64);
    }

    storage.delete(4).unwrap();

    for v in 0..3 {
        assert!(!storage.find(&Value::Int(v)).contains(&4));
    }
    assert!(storage.get(4).unwrap_err().is_key_not_found());
    assert_consistent(&storage);
}

#[test]
fn test_deleting_last_id_drops_bucket() {
    let mut storage = AttributeStorage::new(1, true);
    storage.set(1, "only");

    storage.delete(1).unwrap();

    assert!(storage.value_counts().is_empty());
    assert!(storage.find(&Value::from("only")).is_empty());
}

#[test]
fn test_value_counts_agree_across_modes() {
    let mut scan = AttributeStorage::new(1, false);
    let mut eager = AttributeStorage::new(1, true);
    for x in 0..40u64 {
        scan.set(x, (x % 6) as i64);
        eager.set(x, (x % 6) as i64);
    }

    assert_eq!(scan.value_counts(), eager.value_counts());
}
