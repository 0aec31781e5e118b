//! Tests for MapData
//!
//! These tests verify:
//! - Writing and reading full and delta files
//! - Chain replay order (upserts overwrite, tombstones remove)
//! - Chain continuity rejection
//! - Entry count validation and corruption detection
//! - Compressed files and non-string codecs

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use permakv::codec::{StringCodec, U64Codec, VecCodec};
use permakv::datastore::EntryRecord;
use permakv::{Codecs, Compression, Header, MapData, PermaError, PermaFile};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn keys(keys: &[&str]) -> BTreeSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

fn full_file(path: &PathBuf, n: u32) -> PermaFile {
    PermaFile::full(Compression::None, path, "orders", n)
}

/// Writes F1 = `full`, then one delta per entry of `deltas`
fn write_chain(
    path: &PathBuf,
    full: BTreeMap<String, String>,
    deltas: Vec<(BTreeMap<String, String>, BTreeSet<String>)>,
) -> Vec<PermaFile> {
    let codecs = Codecs::strings();
    let f1 = full_file(path, 1);
    let mut data = MapData::new_full("orders", 1, full)
        .write_to(&f1, false, &codecs)
        .unwrap();

    let mut files = vec![f1.clone()];
    for (upserted, deleted) in deltas {
        let file = files.last().unwrap().next_delta();
        data = data
            .next_delta(upserted, deleted)
            .write_to(&file, false, &codecs)
            .unwrap();
        files.push(file);
    }
    files
}

// =============================================================================
// Single File Tests
// =============================================================================

#[test]
fn test_full_file_round_trip() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = full_file(&path, 1);
    let entries = map(&[("a", "1"), ("b", ""), ("ключ", "значение")]);

    MapData::new_full("orders", 1, entries.clone())
        .write_to(&file, false, &codecs)
        .unwrap();
    let data = MapData::read_from(&file, &codecs).unwrap();

    assert!(data.header().is_full_file());
    assert_eq!(data.header().entry_count(), 3);
    assert_eq!(data.upserted(), &entries);
    assert!(data.deleted().is_empty());
}

#[test]
fn test_empty_full_file_round_trip() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = full_file(&path, 1);

    MapData::new_full("orders", 1, BTreeMap::new())
        .write_to(&file, false, &codecs)
        .unwrap();
    let data = MapData::<String, String>::read_from(&file, &codecs).unwrap();

    assert!(data.is_empty());
    assert_eq!(data.header().entry_count(), 0);
}

#[test]
fn test_delta_file_round_trip() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let files = write_chain(
        &path,
        map(&[("a", "1")]),
        vec![(map(&[("b", "2")]), keys(&["a"]))],
    );

    let delta = MapData::read_from(&files[1], &codecs).unwrap();

    assert!(!delta.header().is_full_file());
    assert_eq!(delta.header().delta_number(), 1);
    assert_eq!(delta.upserted(), &map(&[("b", "2")]));
    assert_eq!(delta.deleted(), &keys(&["a"]));
}

#[test]
fn test_write_to_rejects_foreign_identity() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = full_file(&path, 1);

    let result = MapData::new_full("orders", 2, map(&[("a", "1")])).write_to(&file, false, &codecs);

    assert!(matches!(result, Err(PermaError::HeaderMismatch(_))));
    assert!(!file.exists());
}

#[test]
fn test_zstd_round_trip() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = PermaFile::full(Compression::Zstd, &path, "orders", 1);
    let entries: BTreeMap<String, String> = (0..500)
        .map(|i| (format!("key-{:04}", i), "value ".repeat(10)))
        .collect();

    MapData::new_full("orders", 1, entries.clone())
        .write_to(&file, false, &codecs)
        .unwrap();

    assert!(file.path().to_string_lossy().ends_with(".perma.zst"));
    let data = MapData::read_from(&file, &codecs).unwrap();
    assert_eq!(data.upserted(), &entries);
}

#[test]
fn test_custom_codecs_round_trip() {
    let (_temp, path) = setup_temp_dir();
    let codecs: Codecs<u64, Vec<String>> = Codecs::new(U64Codec, VecCodec::new(StringCodec));
    let file = full_file(&path, 1);
    let entries = BTreeMap::from([
        (1, vec!["x".to_string(), "y".to_string()]),
        (2, Vec::new()),
    ]);

    MapData::new_full("orders", 1, entries.clone())
        .write_to(&file, false, &codecs)
        .unwrap();
    let data = MapData::read_from(&file, &codecs).unwrap();

    assert_eq!(data.upserted(), &entries);
}

// =============================================================================
// Chain Replay Tests
// =============================================================================

#[test]
fn test_chain_replay_order() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let files = write_chain(
        &path,
        BTreeMap::new(),
        vec![
            (map(&[("a", "1")]), BTreeSet::new()),
            (map(&[("b", "2")]), keys(&["a"])),
        ],
    );

    let mut collector = BTreeMap::new();
    let last = MapData::read_chain(&files[0], &files[1..], &codecs, &mut collector).unwrap();

    assert_eq!(collector, map(&[("b", "2")]));
    assert_eq!(last.delta_number(), 2);
}

#[test]
fn test_chain_later_files_override() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let files = write_chain(
        &path,
        map(&[("a", "1"), ("b", "1"), ("c", "1")]),
        vec![
            (map(&[("a", "2")]), keys(&["c"])),
            (map(&[("c", "3")]), BTreeSet::new()),
        ],
    );

    let mut collector = BTreeMap::new();
    MapData::read_chain(&files[0], &files[1..], &codecs, &mut collector).unwrap();

    assert_eq!(collector, map(&[("a", "2"), ("b", "1"), ("c", "3")]));
}

#[test]
fn test_extend_chain_from_loaded_header() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let files = write_chain(
        &path,
        map(&[("a", "1")]),
        vec![
            (map(&[("b", "2")]), BTreeSet::new()),
            (map(&[("c", "3")]), keys(&["a"])),
        ],
    );

    let mut collector = BTreeMap::new();
    let after_d1 = MapData::read_chain(&files[0], &files[1..2], &codecs, &mut collector).unwrap();
    let after_d2 = MapData::extend_chain(&after_d1, &files[2..], &codecs, &mut collector).unwrap();

    assert_eq!(after_d2.delta_number(), 2);
    assert_eq!(collector, map(&[("b", "2"), ("c", "3")]));
}

#[test]
fn test_chain_rejects_delta_of_other_full_file() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let files = write_chain(
        &path,
        map(&[("a", "1")]),
        vec![(map(&[("b", "2")]), BTreeSet::new())],
    );

    // D2 on disk claims to follow full file 2
    let bogus = files[1].next_delta();
    bogus
        .with_writer(false, |out| {
            MapData::new_delta(&Header::new_full("orders", 2, 0), map(&[("c", "3")]), BTreeSet::new())
                .write(out, &codecs)
        })
        .unwrap();

    let mut collector = BTreeMap::new();
    let chain = [files[1].clone(), bogus];
    let result = MapData::read_chain(&files[0], &chain, &codecs, &mut collector);

    assert!(matches!(result, Err(PermaError::HeaderMismatch(_))));
    assert_eq!(collector, map(&[("a", "1"), ("b", "2")]));
}

#[test]
fn test_chain_rejects_skipped_delta_number() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let files = write_chain(&path, map(&[("a", "1")]), Vec::new());

    // D1 on disk carries the header of a second delta
    let d1 = files[0].next_delta();
    let d1_header = Header::new_full("orders", 1, 0).next_delta(0);
    d1.with_writer(false, |out| {
        MapData::new_delta(&d1_header, map(&[("x", "9")]), BTreeSet::new()).write(out, &codecs)
    })
    .unwrap();

    let mut collector = BTreeMap::new();
    let result = MapData::read_chain(&files[0], &[d1], &codecs, &mut collector);

    assert!(matches!(result, Err(PermaError::HeaderMismatch(_))));
    assert_eq!(collector, map(&[("a", "1")]));
}

#[test]
fn test_chain_rejects_delta_as_full_file() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let f1 = full_file(&path, 1);

    f1.with_writer(false, |out| {
        MapData::new_delta(&Header::new_full("orders", 1, 0), map(&[("a", "1")]), BTreeSet::new())
            .write(out, &codecs)
    })
    .unwrap();

    let mut collector = BTreeMap::new();
    let result = MapData::read_chain(&f1, &[], &codecs, &mut collector);

    assert!(matches!(result, Err(PermaError::HeaderMismatch(_))));
    assert!(collector.is_empty());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_count_mismatch_too_few_records() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = full_file(&path, 1);

    file.with_writer(false, |out| {
        Header::new_full("orders", 1, 3).write_to(out)?;
        EntryRecord::write_upsert(out, &"a".to_string(), &"1".to_string(), &codecs)?;
        EntryRecord::write_upsert(out, &"b".to_string(), &"2".to_string(), &codecs)?;
        Ok(())
    })
    .unwrap();

    let result = MapData::read_from(&file, &codecs);
    assert!(matches!(result, Err(PermaError::HeaderMismatch(_))));
}

#[test]
fn test_count_mismatch_too_many_records() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = full_file(&path, 1);

    file.with_writer(false, |out| {
        Header::new_full("orders", 1, 1).write_to(out)?;
        EntryRecord::write_upsert(out, &"a".to_string(), &"1".to_string(), &codecs)?;
        EntryRecord::write_tombstone(out, &"b".to_string(), &codecs)?;
        Ok(())
    })
    .unwrap();

    let result = MapData::read_from(&file, &codecs);
    assert!(matches!(result, Err(PermaError::HeaderMismatch(_))));
}

#[test]
fn test_partial_trailing_record_is_corruption() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = full_file(&path, 1);
    MapData::new_full("orders", 1, map(&[("a", "1"), ("b", "value")]))
        .write_to(&file, false, &codecs)
        .unwrap();

    let bytes = fs::read(file.path()).unwrap();
    fs::write(file.path(), &bytes[..bytes.len() - 2]).unwrap();

    let result = MapData::read_from(&file, &codecs);
    assert!(matches!(result, Err(PermaError::Corrupted(_))));
}

#[test]
fn test_damaged_header_is_corruption() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = full_file(&path, 1);
    MapData::new_full("orders", 1, map(&[("a", "1")]))
        .write_to(&file, false, &codecs)
        .unwrap();

    // Flip a bit inside the map name
    let mut bytes = fs::read(file.path()).unwrap();
    bytes[10] ^= 0x01;
    fs::write(file.path(), &bytes).unwrap();

    let result = MapData::read_from(&file, &codecs);
    assert!(matches!(result, Err(PermaError::Corrupted(_))));
}

#[test]
fn test_empty_file_is_corruption() {
    let (_temp, path) = setup_temp_dir();
    let codecs = Codecs::strings();
    let file = full_file(&path, 1);
    fs::write(file.path(), b"").unwrap();

    let result = MapData::read_from(&file, &codecs);
    assert!(matches!(result, Err(PermaError::Corrupted(_))));
}

// =============================================================================
// Diff Tests
// =============================================================================

#[test]
fn test_diff_between_maps() {
    let previous = map(&[("a", "1"), ("b", "2"), ("c", "3")]);
    let current = map(&[("a", "1"), ("b", "20"), ("d", "4")]);

    let (upserted, deleted) = MapData::diff(&previous, &current);

    assert_eq!(upserted, map(&[("b", "20"), ("d", "4")]));
    assert_eq!(deleted, keys(&["c"]));

    let mut replayed = previous.clone();
    MapData::new_delta(&Header::new_full("orders", 1, 3), upserted, deleted).apply_to(&mut replayed);
    assert_eq!(replayed, current);
}
