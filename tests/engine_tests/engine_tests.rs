//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/put/delete operations
//! - Sequence numbering and snapshots
//! - User-level iteration
//! - Accelerated and plain engines behave identically
//! - Concurrent readers alongside writers
//! - Configuration handling

use std::sync::Arc;
use std::thread;

use prismkv::engine::{Engine, ReadOptions};
use prismkv::iterator::StorageIterator;
use prismkv::{Config, PrismError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .write_buffer_size(1024 * 1024) // 1 MB
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn setup_accelerated_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .point_lookup_accelerator(true)
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn latest() -> ReadOptions {
    ReadOptions::default()
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_put_get() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"hello", b"world").unwrap();
    let result = engine.get(&latest(), b"hello").unwrap();

    assert_eq!(result, Some(b"world".to_vec()));
}

#[test]
fn test_engine_get_nonexistent_key() {
    let (_temp, engine) = setup_temp_engine();
    assert_eq!(engine.get(&latest(), b"nonexistent").unwrap(), None);
}

#[test]
fn test_engine_put_overwrite() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value1").unwrap();
    engine.put(b"key", b"value2").unwrap();

    assert_eq!(engine.get(&latest(), b"key").unwrap(), Some(b"value2".to_vec()));
    // Both versions stay in the memtable
    assert_eq!(engine.memtable_entry_count(), 2);
}

#[test]
fn test_engine_delete() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"key", b"value").unwrap();
    engine.delete(b"key").unwrap();

    assert_eq!(engine.get(&latest(), b"key").unwrap(), None);
}

#[test]
fn test_engine_delete_nonexistent_key() {
    let (_temp, engine) = setup_temp_engine();
    engine.delete(b"never").unwrap();
    assert_eq!(engine.get(&latest(), b"never").unwrap(), None);
    assert_eq!(engine.last_sequence(), 1);
}

#[test]
fn test_engine_empty_key_and_value() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"", b"empty key").unwrap();
    engine.put(b"k", b"").unwrap();

    assert_eq!(engine.get(&latest(), b"").unwrap(), Some(b"empty key".to_vec()));
    assert_eq!(engine.get(&latest(), b"k").unwrap(), Some(vec![]));
}

#[test]
fn test_engine_large_value() {
    let (_temp, engine) = setup_temp_engine();
    let value = vec![0xabu8; 100_000];
    engine.put(b"big", &value).unwrap();
    assert_eq!(engine.get(&latest(), b"big").unwrap(), Some(value));
}

#[test]
fn test_engine_binary_data() {
    let (_temp, engine) = setup_temp_engine();
    let key = [0u8, 1, 2, 255, 254];
    let value = [255u8, 0, 255];
    engine.put(&key, &value).unwrap();
    assert_eq!(engine.get(&latest(), &key).unwrap(), Some(value.to_vec()));
}

// =============================================================================
// Sequence & Snapshot Tests
// =============================================================================

#[test]
fn test_sequences_advance_per_write() {
    let (_temp, engine) = setup_temp_engine();
    assert_eq!(engine.last_sequence(), 0);

    engine.put(b"a", b"1").unwrap();
    engine.delete(b"a").unwrap();
    engine.put_cf("ns", b"b", b"2").unwrap();

    assert_eq!(engine.last_sequence(), 3);
    assert_eq!(engine.snapshot().sequence(), 3);
}

#[test]
fn test_snapshot_isolation() {
    let (_temp, engine) = setup_temp_engine();

    engine.put(b"k", b"v1").unwrap();
    let s1 = engine.snapshot();
    engine.put(b"k", b"v2").unwrap();
    let s2 = engine.snapshot();
    engine.delete(b"k").unwrap();

    assert_eq!(s1.sequence(), 1);
    assert_eq!(s2.sequence(), 2);
    assert_eq!(
        engine.get(&ReadOptions::at(s1), b"k").unwrap(),
        Some(b"v1".to_vec())
    );
    assert_eq!(
        engine.get(&ReadOptions::at(s2), b"k").unwrap(),
        Some(b"v2".to_vec())
    );
    assert_eq!(engine.get(&latest(), b"k").unwrap(), None);
}

#[test]
fn test_snapshot_hides_later_keys_from_iterators() {
    let (_temp, engine) = setup_temp_engine();
    engine.put(b"a", b"1").unwrap();
    let snap = engine.snapshot();
    engine.put(b"b", b"2").unwrap();

    let mut iter = engine.iter(&ReadOptions::at(snap));
    iter.seek_to_first();
    assert_eq!(iter.key(), b"a");
    iter.next();
    assert!(!iter.valid());
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_engine_iterator_sorted_latest_values() {
    let (_temp, engine) = setup_temp_engine();
    for key in ["delta", "alpha", "charlie", "bravo"] {
        engine.put(key.as_bytes(), b"old").unwrap();
    }
    engine.put(b"charlie", b"new").unwrap();
    engine.delete(b"bravo").unwrap();

    let mut iter = engine.iter(&latest());
    iter.seek_to_first();
    let mut seen = vec![];
    while iter.valid() {
        seen.push((
            String::from_utf8(iter.key().to_vec()).unwrap(),
            String::from_utf8(iter.value().to_vec()).unwrap(),
        ));
        iter.next();
    }

    assert_eq!(
        seen,
        vec![
            ("alpha".to_string(), "old".to_string()),
            ("charlie".to_string(), "new".to_string()),
            ("delta".to_string(), "old".to_string()),
        ]
    );
}

// =============================================================================
// Accelerator Tests
// =============================================================================

#[test]
fn test_accelerated_engine_reads() {
    let (_temp, engine) = setup_accelerated_engine();
    assert!(engine.config().point_lookup_accelerator);

    for i in 0..1000 {
        let k = i.to_string();
        engine.put(k.as_bytes(), k.as_bytes()).unwrap();
    }
    for i in 0..1000 {
        let k = i.to_string();
        assert_eq!(engine.get(&latest(), k.as_bytes()).unwrap(), Some(k.into_bytes()));
    }
    assert_eq!(engine.accelerated_keys(), 1000);
}

#[test]
fn test_accelerated_engine_versions() {
    let (_temp, engine) = setup_accelerated_engine();

    engine.put(b"k", b"v1").unwrap();
    let s1 = engine.snapshot();
    engine.put(b"k", b"v2").unwrap();
    engine.delete(b"k").unwrap();
    engine.put(b"k", b"v4").unwrap();

    assert_eq!(engine.get(&ReadOptions::at(s1), b"k").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(engine.get(&latest(), b"k").unwrap(), Some(b"v4".to_vec()));
    assert_eq!(engine.accelerated_keys(), 1);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_engine_concurrent_reads() {
    let (_temp, engine) = setup_accelerated_engine();
    let engine = Arc::new(engine);

    for i in 0..100 {
        let key = format!("key{}", i);
        engine.put(key.as_bytes(), key.as_bytes()).unwrap();
    }

    let mut handles = vec![];
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let key = format!("key{}", i);
                let result = engine.get(&ReadOptions::default(), key.as_bytes()).unwrap();
                assert_eq!(result, Some(key.into_bytes()));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_engine_concurrent_writes() {
    let (_temp, engine) = setup_temp_engine();
    let engine = Arc::new(engine);

    let mut handles = vec![];
    for t in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            for i in 0..250 {
                let key = format!("thread{}_key{}", t, i);
                let value = format!("thread{}_value{}", t, i);
                engine.put(key.as_bytes(), value.as_bytes()).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.last_sequence(), 1000);
    for t in 0..4 {
        for i in 0..250 {
            let key = format!("thread{}_key{}", t, i);
            let expected = format!("thread{}_value{}", t, i);
            assert_eq!(
                engine.get(&latest(), key.as_bytes()).unwrap(),
                Some(expected.into_bytes())
            );
        }
    }
}

#[test]
fn test_snapshot_reads_stable_during_writes() {
    let (_temp, engine) = setup_accelerated_engine();
    let engine = Arc::new(engine);
    engine.put(b"counter", b"0").unwrap();
    let snap = engine.snapshot();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for i in 1..=500 {
                engine.put(b"counter", i.to_string().as_bytes()).unwrap();
            }
        })
    };

    let reader = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut last_seen = 0u32;
            for _ in 0..500 {
                let old = engine.get(&ReadOptions::at(snap), b"counter").unwrap();
                assert_eq!(old, Some(b"0".to_vec()));

                // The latest view never goes backwards
                let now = engine.get(&ReadOptions::default(), b"counter").unwrap().unwrap();
                let now: u32 = String::from_utf8(now).unwrap().parse().unwrap();
                assert!(now >= last_seen);
                last_seen = now;
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(
        engine.get(&latest(), b"counter").unwrap(),
        Some(b"500".to_vec())
    );
}

// =============================================================================
// Configuration & Accessor Tests
// =============================================================================

#[test]
fn test_engine_rejects_invalid_config() {
    let config = Config::builder().write_buffer_size(0).build();
    assert!(matches!(Engine::open(config), Err(PrismError::Config(_))));
}

#[test]
fn test_engine_open_path_convenience() {
    let temp = TempDir::new().unwrap();
    let engine = Engine::open_path(temp.path()).unwrap();
    assert_eq!(engine.data_dir(), temp.path());
    assert!(!engine.config().point_lookup_accelerator);
}

#[test]
fn test_engine_should_flush() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .write_buffer_size(16 * 1024)
        .build();
    let engine = Engine::open(config).unwrap();
    assert!(!engine.should_flush());

    let value = [7u8; 512];
    for i in 0..64 {
        engine.put(format!("key{}", i).as_bytes(), &value).unwrap();
    }

    assert!(engine.should_flush());
    assert!(engine.memory_usage() >= 64 * 512);
}
