//! Integration tests for the trivault crate.
//!
//! These tests exercise the full store lifecycle on real temporary
//! directories: typed round-trips, replica loss and tampering, voting,
//! namespace management, and enumeration quorum behavior.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use trivault::{Consistency, SecureStore, StaticPlatform, StoreError, TypeTag, Value};

/// Path of one replica file under the test root.
fn record_path(root: &Path, replica: usize, module: &str, key: &str) -> PathBuf {
    let mut path = root.join(format!("r{replica}"));
    if !module.is_empty() {
        path.push(module);
    }
    path.join(format!(".{key}.jkl"))
}

fn platform(root: &Path) -> StaticPlatform {
    StaticPlatform::under(root, "alice", "machine-a")
}

// ═══════════════════════════════════════════════════════════════════════
//  Typed round-trips
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn string_roundtrip_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("greeting", "hello").unwrap();

    let (value, consistency) = store.retrieve_string("greeting").unwrap();
    assert_eq!(value, "hello");
    assert_eq!(consistency, Consistency::Clean);
}

#[test]
fn all_types_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("s", "text value").unwrap();
    store.store("i", i64::MIN).unwrap();
    store.store("f", 2.5_f32).unwrap();
    store.store("d", 3.14_f64).unwrap();
    store.store("b", true).unwrap();

    assert_eq!(store.retrieve_string("s").unwrap().0, "text value");
    assert_eq!(store.retrieve_i64("i").unwrap().0, i64::MIN);
    assert_eq!(store.retrieve_f32("f").unwrap().0, 2.5);
    assert_eq!(store.retrieve_f64("d").unwrap().0, 3.14);
    assert!(store.retrieve_bool("b").unwrap().0);
}

#[test]
fn unicode_and_empty_strings_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("unicode", "žluťoučký kůň 🔐").unwrap();
    store.store("empty", "").unwrap();

    assert_eq!(store.retrieve_string("unicode").unwrap().0, "žluťoučký kůň 🔐");
    assert_eq!(store.retrieve_string("empty").unwrap().0, "");
}

#[test]
fn overwrite_returns_latest_and_resynchronizes() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("x", "a").unwrap();
    store.store("x", "b").unwrap();

    let (value, consistency) = store.retrieve_string("x").unwrap();
    assert_eq!(value, "b");
    assert_eq!(consistency, Consistency::Clean);

    // All three replica files are bitwise equal after the overwrite.
    let r0 = fs::read(record_path(dir.path(), 0, "", "x")).unwrap();
    let r1 = fs::read(record_path(dir.path(), 1, "", "x")).unwrap();
    let r2 = fs::read(record_path(dir.path(), 2, "", "x")).unwrap();
    assert_eq!(r0, r1);
    assert_eq!(r1, r2);
}

#[test]
fn repeated_store_of_same_value_stays_clean() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("k", "v").unwrap();
    store.store("k", "v").unwrap();

    let (value, consistency) = store.retrieve_string("k").unwrap();
    assert_eq!(value, "v");
    assert_eq!(consistency, Consistency::Clean);
}

#[test]
fn salt_makes_identical_stores_produce_fresh_ciphertext() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("k", "same value").unwrap();
    let first = fs::read(record_path(dir.path(), 0, "", "k")).unwrap();

    store.store("k", "same value").unwrap();
    let second = fs::read(record_path(dir.path(), 0, "", "k")).unwrap();

    assert_ne!(first, second);
}

// ═══════════════════════════════════════════════════════════════════════
//  Replica loss and tampering
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn one_missing_replica_recovers_with_drift() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("count", 7_i64).unwrap();
    fs::remove_file(record_path(dir.path(), 1, "", "count")).unwrap();

    let (value, consistency) = store.retrieve_i64("count").unwrap();
    assert_eq!(value, 7);
    assert_eq!(consistency, Consistency::Drifted);
}

#[test]
fn two_corrupted_replicas_recover_with_drift() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("flag", true).unwrap();
    fs::write(record_path(dir.path(), 0, "", "flag"), [0xA5u8; 160]).unwrap();
    fs::write(record_path(dir.path(), 1, "", "flag"), [0x5Au8; 96]).unwrap();

    let (value, consistency) = store.retrieve_bool("flag").unwrap();
    assert!(value);
    assert_eq!(consistency, Consistency::Drifted);
}

#[test]
fn one_tampered_replica_recovers_with_drift() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("k", "original").unwrap();
    fs::write(record_path(dir.path(), 2, "", "k"), b"not even ciphertext").unwrap();

    let (value, consistency) = store.retrieve_string("k").unwrap();
    assert_eq!(value, "original");
    assert_eq!(consistency, Consistency::Drifted);
}

#[test]
fn all_replicas_gone_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("pi", 3.14_f64).unwrap();
    for replica in 0..3 {
        fs::remove_file(record_path(dir.path(), replica, "", "pi")).unwrap();
    }

    let err = store.retrieve_f64("pi").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn all_replicas_corrupted_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("k", "v").unwrap();
    for replica in 0..3 {
        fs::write(
            record_path(dir.path(), replica, "", "k"),
            [replica as u8 + 1; 64],
        )
        .unwrap();
    }

    let err = store.retrieve_string("k").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn empty_replica_file_counts_as_absence() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("k", "v").unwrap();
    fs::write(record_path(dir.path(), 0, "", "k"), b"").unwrap();

    let (value, consistency) = store.retrieve_string("k").unwrap();
    assert_eq!(value, "v");
    assert_eq!(consistency, Consistency::Drifted);
}

// ═══════════════════════════════════════════════════════════════════════
//  Type safety and machine binding
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn reading_with_wrong_type_is_type_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("answer", 42_i64).unwrap();

    let err = store.retrieve_string("answer").unwrap_err();
    assert!(matches!(
        err,
        StoreError::TypeMismatch {
            expected: TypeTag::Str,
            ..
        }
    ));

    // The record itself is untouched by the failed read.
    assert_eq!(store.retrieve_i64("answer").unwrap().0, 42);
}

#[test]
fn different_machine_cannot_read() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());

    let writer = SecureStore::open(&platform(dir.path()), &mutex).unwrap();
    writer.store("secret", "machine-bound").unwrap();

    let other = StaticPlatform::under(dir.path(), "alice", "machine-b");
    let reader = SecureStore::open(&other, &mutex).unwrap();

    let err = reader.retrieve_string("secret").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn different_user_cannot_read() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());

    let writer = SecureStore::open(&platform(dir.path()), &mutex).unwrap();
    writer.store("secret", "user-bound").unwrap();

    let other = StaticPlatform::under(dir.path(), "mallory", "machine-a");
    let reader = SecureStore::open(&other, &mutex).unwrap();

    let err = reader.retrieve_string("secret").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
//  Modules
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn module_store_and_direct_listing() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    store.store_to_module("cfg", "port", 8080_i64).unwrap();

    let entries = store.get_direct_keys_in_module("cfg").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].module, "/cfg");
    assert_eq!(entries[0].key, "port");

    let (port, consistency) = store.retrieve_i64_from_module("cfg", "port").unwrap();
    assert_eq!(port, 8080);
    assert_eq!(consistency, Consistency::Clean);
}

#[test]
fn store_to_missing_module_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    let err = store.store_to_module("ghost", "k", "v").unwrap_err();
    assert!(matches!(err, StoreError::ReplicasFailed { .. }));
}

#[test]
fn nested_modules_and_subtree_listing() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    store.create_module("cfg", "net").unwrap();
    store.store_to_module("cfg", "theme", "dark").unwrap();
    store.store_to_module("cfg/net", "port", 8080_i64).unwrap();
    store.store("loose", "root level").unwrap();

    // Subtree listing sees both records under cfg, not the root one.
    let mut keys: Vec<String> = store
        .get_keys_in_module("cfg")
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["port", "theme"]);

    // Direct listing sees only the record immediately inside cfg.
    let direct = store.get_direct_keys_in_module("cfg").unwrap();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].key, "theme");

    assert_eq!(store.get_all_modules(), vec!["cfg", "cfg/net"]);
}

#[test]
fn same_key_in_root_and_module_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    store.store("port", 1_i64).unwrap();
    store.store_to_module("cfg", "port", 2_i64).unwrap();

    assert_eq!(store.retrieve_i64("port").unwrap().0, 1);
    assert_eq!(store.retrieve_i64_from_module("cfg", "port").unwrap().0, 2);
}

#[test]
fn remove_module_destroys_its_records() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    store.store_to_module("cfg", "port", 8080_i64).unwrap();

    store.remove_module("cfg").unwrap();

    assert!(store.get_all_modules().is_empty());
    let err = store.retrieve_i64_from_module("cfg", "port").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn purge_module_keeps_structure() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    store.create_module("cfg", "net").unwrap();
    store.store_to_module("cfg", "theme", "dark").unwrap();
    store.store_to_module("cfg/net", "port", 8080_i64).unwrap();
    store.store("loose", "untouched").unwrap();

    store.delete_all_data_from_module("cfg").unwrap();

    assert_eq!(store.get_all_modules(), vec!["cfg", "cfg/net"]);
    assert!(store.get_keys_in_module("cfg").unwrap().is_empty());
    assert_eq!(store.retrieve_string("loose").unwrap().0, "untouched");
}

#[test]
fn submodule_listing_uses_substring_matching() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "foo").unwrap();
    store.create_module("", "barfoo").unwrap();
    store.create_module("foo", "inner").unwrap();
    store.create_module("", "unrelated").unwrap();

    // Substring semantics: "barfoo" matches too.
    assert_eq!(
        store.get_all_submodules("foo"),
        vec!["barfoo", "foo", "foo/inner"]
    );
}

#[test]
fn module_paths_normalize_redundant_separators() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    // Leading and trailing separators name the same module.
    store.store_to_module("/cfg/", "port", 8080_i64).unwrap();

    assert_eq!(store.retrieve_i64_from_module("cfg", "port").unwrap().0, 8080);
    assert_eq!(store.get_all_modules(), vec!["cfg"]);
}

#[test]
fn invalid_module_paths_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    assert!(matches!(
        store.store_to_module("../outside", "k", "v"),
        Err(StoreError::InvalidModulePath { .. })
    ));
    assert!(matches!(
        store.remove_module(".."),
        Err(StoreError::InvalidModulePath { .. })
    ));
    assert!(matches!(
        store.create_module("", ""),
        Err(StoreError::InvalidModulePath { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════════
//  Deletion
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn delete_removes_every_replica() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("k", "v").unwrap();
    store.delete("k").unwrap();

    for replica in 0..3 {
        assert!(!record_path(dir.path(), replica, "", "k").exists());
    }
    assert!(matches!(
        store.retrieve_string("k").unwrap_err(),
        StoreError::NotFound { .. }
    ));

    // Deleting a missing key is a quiet no-op.
    store.delete("k").unwrap();
}

#[test]
fn delete_from_module_leaves_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    store.store_to_module("cfg", "a", "keep").unwrap();
    store.store_to_module("cfg", "b", "drop").unwrap();

    store.delete_from_module("cfg", "b").unwrap();

    assert_eq!(
        store.retrieve_string_from_module("cfg", "a").unwrap().0,
        "keep"
    );
    assert!(matches!(
        store.retrieve_string_from_module("cfg", "b").unwrap_err(),
        StoreError::NotFound { .. }
    ));
}

#[test]
fn delete_all_wipes_and_store_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    store.store("k", "v").unwrap();
    store.store_to_module("cfg", "port", 1_i64).unwrap();

    store.delete_all().unwrap();

    assert!(store.get_all_keys().is_empty());
    assert!(store.get_all_modules().is_empty());

    // Root-level stores recreate the wiped bases.
    store.store("k", "again").unwrap();
    assert_eq!(store.retrieve_string("k").unwrap().0, "again");
}

// ═══════════════════════════════════════════════════════════════════════
//  Enumeration quorum
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn wiped_base_does_not_hide_keys() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("a", 1_i64).unwrap();
    store.store("b", 2_i64).unwrap();
    store.store("c", 3_i64).unwrap();

    fs::remove_dir_all(dir.path().join("r1")).unwrap();

    let mut keys: Vec<String> = store.get_all_keys().into_iter().map(|e| e.key).collect();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);
}

#[test]
fn lost_module_survives_in_union_listing() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    // Two replicas forget the module; the third still remembers.
    fs::remove_dir_all(dir.path().join("r0").join("cfg")).unwrap();
    fs::remove_dir_all(dir.path().join("r1").join("cfg")).unwrap();

    assert_eq!(store.get_all_modules(), vec!["cfg"]);
}

#[test]
fn contains_sees_keys_anywhere() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.create_module("", "cfg").unwrap();
    store.store_to_module("cfg", "nested", 1_i64).unwrap();
    store.store("top", 2_i64).unwrap();

    assert!(store.contains("top"));
    assert!(store.contains("nested"));
    assert!(!store.contains("missing"));
}

// ═══════════════════════════════════════════════════════════════════════
//  Value-level API
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn untyped_retrieve_returns_value_enum() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    store.store("k", 42_i64).unwrap();

    let (value, _) = store.retrieve("k", TypeTag::I64).unwrap();
    assert_eq!(value, Value::I64(42));
}

#[test]
fn invalid_data_keys_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mutex = Mutex::new(());
    let store = SecureStore::open(&platform(dir.path()), &mutex).unwrap();

    for bad in ["", "a/b", "a\\b", ".hidden"] {
        assert!(matches!(
            store.store(bad, "v"),
            Err(StoreError::InvalidDataKey { .. })
        ));
    }
}
