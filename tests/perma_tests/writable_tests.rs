//! Tests for WritablePerma
//!
//! These tests verify:
//! - In-memory operations and persisting them
//! - Delta writes and automatic compaction
//! - Refreshing from another writer
//! - Deleting all files of a map

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, FixedOffset};
use permakv::codec::{DateTimeCodec, StringCodec};
use permakv::{Codecs, Options, ReadOnlyPerma, WritablePerma};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

fn open(path: &Path, compact_after_deltas: Option<usize>) -> WritablePerma<String, String> {
    let options = Options::builder()
        .sync_writes(false)
        .compact_after_deltas(compact_after_deltas)
        .build();
    WritablePerma::load_with_options(path, "orders", options, Codecs::strings()).unwrap()
}

fn file_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// In-Memory Tests
// =============================================================================

#[test]
fn test_load_creates_directory() {
    let (_temp, path) = setup_temp_dir();
    let dir = path.join("nested").join("maps");

    let perma = open(&dir, None);

    assert!(dir.is_dir());
    assert!(perma.is_empty());
}

#[test]
fn test_insert_get_remove() {
    let (_temp, path) = setup_temp_dir();
    let perma = open(&path, None);

    assert_eq!(perma.insert("a".to_string(), "1".to_string()), None);
    assert_eq!(perma.insert("a".to_string(), "2".to_string()), Some("1".to_string()));
    assert_eq!(perma.get(&"a".to_string()), Some("2".to_string()));
    assert!(perma.contains_key(&"a".to_string()));
    assert_eq!(perma.len(), 1);

    assert_eq!(perma.remove(&"a".to_string()), Some("2".to_string()));
    assert!(perma.is_empty());

    // Nothing persisted yet
    assert!(file_names(&path).is_empty());
}

// =============================================================================
// Persist Tests
// =============================================================================

#[test]
fn test_persist_empty_map_writes_nothing() {
    let (_temp, path) = setup_temp_dir();
    let perma = open(&path, None);

    perma.persist().unwrap();

    assert!(file_names(&path).is_empty());
}

#[test]
fn test_persist_writes_full_then_deltas() {
    let (_temp, path) = setup_temp_dir();
    let perma = open(&path, None);

    perma.insert("a".to_string(), "1".to_string());
    perma.persist().unwrap();
    perma.insert("b".to_string(), "2".to_string());
    perma.persist().unwrap();
    perma.remove(&"a".to_string());
    perma.persist().unwrap();

    assert_eq!(
        file_names(&path),
        vec!["orders-F1-D1.perma", "orders-F1-D2.perma", "orders-F1.perma"]
    );
    assert_eq!(perma.delta_file_count(), 2);

    let reopened = open(&path, None);
    assert_eq!(reopened.map(), perma.map());
    assert_eq!(reopened.get(&"b".to_string()), Some("2".to_string()));
}

#[test]
fn test_persist_without_changes_writes_nothing() {
    let (_temp, path) = setup_temp_dir();
    let perma = open(&path, None);
    perma.insert("a".to_string(), "1".to_string());
    perma.persist().unwrap();

    perma.insert("a".to_string(), "1".to_string());
    perma.persist().unwrap();

    assert_eq!(file_names(&path), vec!["orders-F1.perma"]);
}

#[test]
fn test_persist_compacts_after_delta_limit() {
    let (_temp, path) = setup_temp_dir();
    let perma = open(&path, Some(2));

    for i in 0..4 {
        perma.insert(format!("k{}", i), i.to_string());
        perma.persist().unwrap();
    }

    // F1, D1, D2, then the limit turns the fourth persist into F2
    assert_eq!(file_names(&path), vec!["orders-F2.perma"]);
    assert_eq!(perma.delta_file_count(), 0);
    assert_eq!(open(&path, None).len(), 4);
}

#[test]
fn test_persist_full() {
    let (_temp, path) = setup_temp_dir();
    let perma = open(&path, None);
    perma.insert("a".to_string(), "1".to_string());
    perma.persist().unwrap();
    perma.insert("b".to_string(), "2".to_string());

    perma.persist_full().unwrap();

    assert!(path.join("orders-F2.perma").exists());
    assert_eq!(*perma.persisted_map(), perma.map());
}

#[test]
fn test_compact_skips_unpersisted_changes() {
    let (_temp, path) = setup_temp_dir();
    let perma = open(&path, None);
    perma.insert("a".to_string(), "1".to_string());
    perma.persist().unwrap();
    perma.insert("b".to_string(), "2".to_string());
    perma.persist().unwrap();
    perma.insert("c".to_string(), "3".to_string());

    perma.compact().unwrap();

    assert_eq!(file_names(&path), vec!["orders-F2.perma"]);
    assert_eq!(open(&path, None).len(), 2);
    assert_eq!(perma.len(), 3);
}

// =============================================================================
// Refresh Tests
// =============================================================================

#[test]
fn test_refresh_replaces_local_state() {
    let (_temp, path) = setup_temp_dir();
    let first = open(&path, None);
    let second = open(&path, None);

    first.insert("a".to_string(), "1".to_string());
    first.persist().unwrap();
    second.insert("local".to_string(), "x".to_string());

    second.refresh().unwrap();

    assert_eq!(second.get(&"a".to_string()), Some("1".to_string()));
    assert!(!second.contains_key(&"local".to_string()));

    // The refreshed writer continues the chain
    second.insert("b".to_string(), "2".to_string());
    second.persist().unwrap();
    assert!(path.join("orders-F1-D1.perma").exists());
}

// =============================================================================
// Delete Tests
// =============================================================================

#[test]
fn test_delete_files() {
    let (_temp, path) = setup_temp_dir();
    let perma = open(&path, None);
    perma.insert("a".to_string(), "1".to_string());
    perma.persist().unwrap();
    perma.insert("b".to_string(), "2".to_string());
    perma.persist().unwrap();
    fs::write(path.join("orders-0123456789abcdef.perma.temp"), b"x").unwrap();

    assert!(perma.delete_files().unwrap());

    assert!(file_names(&path).is_empty());
    assert_eq!(perma.len(), 2);
    assert!(perma.persisted_map().is_empty());

    // Persisting again starts a fresh chain
    perma.persist().unwrap();
    assert_eq!(file_names(&path), vec!["orders-F1.perma"]);
}

// =============================================================================
// Codec and Concurrency Tests
// =============================================================================

#[test]
fn test_date_time_values() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::new(StringCodec, DateTimeCodec);
    let perma: WritablePerma<String, DateTime<FixedOffset>> =
        WritablePerma::load(&path, "events", codecs.clone()).unwrap();
    let at = DateTime::parse_from_rfc3339("2024-03-01T12:30:45.123456789+02:00").unwrap();

    perma.insert("deployed".to_string(), at);
    perma.persist().unwrap();

    let reader = ReadOnlyPerma::load(&path, "events", codecs).unwrap();
    assert_eq!(reader.map().get("deployed"), Some(&at));
}

#[test]
fn test_concurrent_inserts_then_persist() {
    let (_temp, path) = setup_temp_dir();
    let perma = Arc::new(open(&path, None));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let perma = Arc::clone(&perma);
            thread::spawn(move || {
                for i in 0..25 {
                    perma.insert(format!("t{}-{}", t, i), i.to_string());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    perma.persist().unwrap();

    assert_eq!(open(&path, None).len(), 100);
}
