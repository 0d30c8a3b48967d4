//! Tests for RegionFile
//!
//! These tests verify:
//! - Lazy header initialization on new and existing files
//! - Slot read/write/remove round trips
//! - Placement rules (reuse, shrink, grow, first-fit)
//! - Compaction via optimize()
//! - Read-only and closed handle errors
//! - Corruption detection

use std::fs;
use std::path::PathBuf;

use regionstore::storage::{RegionFile, SectorBlock};
use regionstore::{PassthroughCodec, RegionConfig, RegionError, SlotIndex};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const SECTOR: u64 = 4096;

fn setup_temp_region() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("r.0.0.region");
    (temp_dir, path)
}

fn slot(index: usize) -> SlotIndex {
    SlotIndex::new(index).unwrap()
}

/// Raw record bytes: compression id 3 followed by `len - 1` patterned bytes
fn payload(len: usize, seed: u8) -> Vec<u8> {
    let mut raw = vec![3u8];
    raw.extend((1..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)));
    raw
}

/// Payload whose record (length prefix included) fills exactly `sectors` sectors
fn payload_for_sectors(sectors: usize, seed: u8) -> Vec<u8> {
    payload(sectors * SECTOR as usize - 4, seed)
}

fn file_len(path: &PathBuf) -> u64 {
    fs::metadata(path).unwrap().len()
}

// =============================================================================
// Initialization Tests
// =============================================================================

#[test]
fn test_open_defers_header_until_first_call() {
    let (_temp, path) = setup_temp_region();

    let mut region = RegionFile::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(file_len(&path), 0);

    assert!(!region.has_slot(slot(0)).unwrap());
    assert_eq!(file_len(&path), 2 * SECTOR);
}

#[test]
fn test_truncated_header_is_reset() {
    let (_temp, path) = setup_temp_region();
    fs::write(&path, vec![0xFFu8; 100]).unwrap();

    let mut region = RegionFile::open(&path).unwrap();
    assert!(region.occupied_slots().unwrap().is_empty());
    assert_eq!(file_len(&path), 2 * SECTOR);
    assert_eq!(fs::read(&path).unwrap(), vec![0u8; 8192]);
}

#[test]
fn test_header_inside_header_sectors_is_corrupt() {
    let (_temp, path) = setup_temp_region();
    let mut header = vec![0u8; 8192];
    header[0..4].copy_from_slice(&0x0101u32.to_be_bytes());
    fs::write(&path, &header).unwrap();

    let mut region = RegionFile::open(&path).unwrap();
    let result = region.has_slot(slot(0));
    assert!(matches!(result, Err(RegionError::CorruptFile(_))));
}

#[test]
fn test_overlapping_records_are_corrupt() {
    let (_temp, path) = setup_temp_region();
    let mut bytes = vec![0u8; 5 * 4096];
    bytes[0..4].copy_from_slice(&0x0202u32.to_be_bytes());
    bytes[4..8].copy_from_slice(&0x0302u32.to_be_bytes());
    fs::write(&path, &bytes).unwrap();

    let mut region = RegionFile::open(&path).unwrap();
    let result = region.write(slot(2), 1, &payload(100, 0));
    assert!(matches!(result, Err(RegionError::CorruptFile(_))));
}

#[test]
fn test_flush_rewrites_clean_header() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();
    region.write(slot(1), 7, &payload(100, 0)).unwrap();
    assert!(region.is_dirty());
    region.flush().unwrap();
    assert!(!region.is_dirty());

    // Scribble over the on-disk header; a clean flush still restores it
    let mut bytes = fs::read(&path).unwrap();
    bytes[4..8].fill(0xFF);
    fs::write(&path, &bytes).unwrap();

    region.flush().unwrap();
    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[4..8], &0x0201u32.to_be_bytes());
}

// =============================================================================
// Read/Write/Remove Tests
// =============================================================================

#[test]
fn test_write_then_read() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    let data = payload(12_345, 1);
    region.write(slot(42), 1_700_000_000, &data).unwrap();

    assert!(region.has_slot(slot(42)).unwrap());
    assert_eq!(region.read(slot(42)).unwrap(), Some(data));
    assert_eq!(region.timestamp(slot(42)).unwrap(), Some(1_700_000_000));
}

#[test]
fn test_read_empty_slot() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    assert_eq!(region.read(slot(7)).unwrap(), None);
    assert_eq!(region.timestamp(slot(7)).unwrap(), None);
}

#[test]
fn test_empty_payload_occupies_one_sector() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(1), 5, &[]).unwrap();

    assert_eq!(region.read(slot(1)).unwrap(), Some(Vec::new()));
    assert_eq!(region.sector_block(slot(1)).unwrap(), Some(SectorBlock::new(2, 1)));
}

#[test]
fn test_remove_then_rewrite() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(3), 1, &payload(500, 1)).unwrap();
    assert!(region.remove(slot(3)).unwrap());

    assert!(!region.has_slot(slot(3)).unwrap());
    assert_eq!(region.read(slot(3)).unwrap(), None);
    assert_eq!(region.timestamp(slot(3)).unwrap(), None);

    let replacement = payload(900, 2);
    region.write(slot(3), 2, &replacement).unwrap();
    assert_eq!(region.read(slot(3)).unwrap(), Some(replacement));
}

#[test]
fn test_remove_empty_slot_returns_false() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    assert!(!region.remove(slot(99)).unwrap());
}

#[test]
fn test_remove_keeps_bytes_on_disk() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(0), 1, &payload(200, 9)).unwrap();
    region.write(slot(1), 1, &payload(200, 4)).unwrap();
    region.remove(slot(0)).unwrap();
    region.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], &[0, 0, 0, 0]);
    // record at sector 2 is still intact: length prefix + compression id
    assert_eq!(&bytes[8192..8196], &200u32.to_be_bytes());
    assert_eq!(bytes[8196], 3);
}

#[test]
fn test_data_survives_reopen() {
    let (_temp, path) = setup_temp_region();

    {
        let mut region = RegionFile::open(&path).unwrap();
        region.write(slot(0), 10, &payload(100, 1)).unwrap();
        region.write(slot(1023), 20, &payload(9000, 2)).unwrap();
        region.close().unwrap();
    }

    let mut region = RegionFile::open(&path).unwrap();
    assert_eq!(region.read(slot(0)).unwrap(), Some(payload(100, 1)));
    assert_eq!(region.read(slot(1023)).unwrap(), Some(payload(9000, 2)));
    assert_eq!(region.timestamp(slot(1023)).unwrap(), Some(20));
    assert_eq!(region.occupied_slots().unwrap(), vec![slot(0), slot(1023)]);
}

#[test]
fn test_drop_flushes_header() {
    let (_temp, path) = setup_temp_region();

    {
        let mut region = RegionFile::open(&path).unwrap();
        region.write(slot(8), 33, &payload(64, 5)).unwrap();
        // no explicit close
    }

    let mut region = RegionFile::open(&path).unwrap();
    assert_eq!(region.read(slot(8)).unwrap(), Some(payload(64, 5)));
}

#[test]
fn test_codec_round_trip() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();
    let codec = PassthroughCodec::default();

    region
        .write_encoded(slot(12), 1, &b"chunk body".to_vec(), &codec)
        .unwrap();

    assert_eq!(region.read(slot(12)).unwrap().unwrap()[0], 3);
    assert_eq!(
        region.read_decoded(slot(12), &codec).unwrap(),
        Some(b"chunk body".to_vec())
    );
    assert_eq!(region.read_decoded(slot(13), &codec).unwrap(), None);
}

// =============================================================================
// Placement Tests
// =============================================================================

#[test]
fn test_reference_scenario() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(5), 1000, &payload(4090, 1)).unwrap();
    assert_eq!(region.sector_block(slot(5)).unwrap(), Some(SectorBlock::new(2, 1)));

    region.write(slot(6), 2000, &payload(4100, 2)).unwrap();
    assert_eq!(region.sector_block(slot(6)).unwrap(), Some(SectorBlock::new(3, 2)));

    assert!(region.remove(slot(5)).unwrap());

    region.write(slot(7), 3000, &payload(1000, 3)).unwrap();
    assert_eq!(region.sector_block(slot(7)).unwrap(), Some(SectorBlock::new(2, 1)));

    region.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len() as u64, 5 * SECTOR);
    assert_eq!(&bytes[5 * 4..5 * 4 + 4], &[0, 0, 0, 0]);
    assert_eq!(&bytes[6 * 4..6 * 4 + 4], &0x0302u32.to_be_bytes());
    assert_eq!(&bytes[7 * 4..7 * 4 + 4], &0x0201u32.to_be_bytes());
    assert_eq!(&bytes[4096 + 7 * 4..4096 + 7 * 4 + 4], &3000i32.to_be_bytes());
}

#[test]
fn test_same_size_rewrite_in_place() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(0), 1, &payload(3000, 1)).unwrap();
    region.write(slot(1), 1, &payload(3000, 2)).unwrap();
    region.write(slot(0), 2, &payload(3500, 3)).unwrap();

    assert_eq!(region.sector_block(slot(0)).unwrap(), Some(SectorBlock::new(2, 1)));
    assert_eq!(region.read(slot(0)).unwrap(), Some(payload(3500, 3)));
    assert_eq!(region.timestamp(slot(0)).unwrap(), Some(2));
}

#[test]
fn test_shrink_frees_tail_for_reuse() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(0), 1, &payload_for_sectors(5, 1)).unwrap(); // 2..7
    region.write(slot(1), 1, &payload(100, 2)).unwrap(); // 7
    let cursor = region.stats().unwrap().append_cursor;

    region.write(slot(0), 2, &payload_for_sectors(2, 3)).unwrap();
    assert_eq!(region.sector_block(slot(0)).unwrap(), Some(SectorBlock::new(2, 2)));

    let stats = region.stats().unwrap();
    assert_eq!(stats.free_sectors, 3);
    assert_eq!(stats.append_cursor, cursor);

    region.write(slot(2), 3, &payload_for_sectors(3, 4)).unwrap();
    assert_eq!(region.sector_block(slot(2)).unwrap(), Some(SectorBlock::new(4, 3)));
    assert_eq!(region.stats().unwrap().append_cursor, cursor);
    assert_eq!(region.read(slot(0)).unwrap(), Some(payload_for_sectors(2, 3)));
}

#[test]
fn test_grow_relocates() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(0), 1, &payload(1000, 1)).unwrap(); // 2
    region.write(slot(1), 1, &payload(1000, 2)).unwrap(); // 3
    region.write(slot(0), 2, &payload(5000, 3)).unwrap();

    assert_eq!(region.sector_block(slot(0)).unwrap(), Some(SectorBlock::new(4, 2)));
    assert_eq!(region.read(slot(0)).unwrap(), Some(payload(5000, 3)));
    assert_eq!(region.read(slot(1)).unwrap(), Some(payload(1000, 2)));

    // old location is first in line for the next small record
    region.write(slot(2), 3, &payload(10, 4)).unwrap();
    assert_eq!(region.sector_block(slot(2)).unwrap(), Some(SectorBlock::new(2, 1)));
}

#[test]
fn test_largest_record_accepted() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    let data = payload_for_sectors(255, 6);
    region.write(slot(0), 1, &data).unwrap();

    assert_eq!(region.sector_block(slot(0)).unwrap(), Some(SectorBlock::new(2, 255)));
    assert_eq!(region.read(slot(0)).unwrap(), Some(data));
}

#[test]
fn test_payload_too_large_leaves_state_unchanged() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(0), 1, &payload(100, 1)).unwrap();
    let before = region.stats().unwrap();

    let oversized = payload(255 * 4096 - 4 + 1, 2);
    let result = region.write(slot(0), 2, &oversized);
    assert!(matches!(
        result,
        Err(RegionError::PayloadTooLarge { index: 0, sectors: 256 })
    ));

    let result = region.write(slot(1), 2, &oversized);
    assert!(matches!(result, Err(RegionError::PayloadTooLarge { .. })));

    assert_eq!(region.stats().unwrap(), before);
    assert_eq!(region.read(slot(0)).unwrap(), Some(payload(100, 1)));
    assert_eq!(region.timestamp(slot(0)).unwrap(), Some(1));
    assert!(!region.has_slot(slot(1)).unwrap());
}

// =============================================================================
// Optimize Tests
// =============================================================================

#[test]
fn test_optimize_reclaims_gaps() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    for i in 0..6 {
        region.write(slot(i), 100 + i as i32, &payload(1000, i as u8)).unwrap();
    }
    assert_eq!(file_len(&path), 8 * SECTOR);

    region.remove(slot(1)).unwrap();
    region.remove(slot(3)).unwrap();

    let reclaimed = region.optimize().unwrap();
    assert_eq!(reclaimed, 2 * SECTOR);
    assert_eq!(file_len(&path), 6 * SECTOR);

    for i in [0, 2, 4, 5] {
        assert_eq!(region.read(slot(i)).unwrap(), Some(payload(1000, i as u8)));
        assert_eq!(region.timestamp(slot(i)).unwrap(), Some(100 + i as i32));
    }
    assert_eq!(region.stats().unwrap().free_sectors, 0);
}

#[test]
fn test_optimize_is_idempotent() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    for i in 0..4 {
        region.write(slot(i), 1, &payload(6000, i as u8)).unwrap();
    }
    region.remove(slot(0)).unwrap();
    region.remove(slot(3)).unwrap();

    assert!(region.optimize().unwrap() > 0);
    assert_eq!(region.optimize().unwrap(), 0);
}

#[test]
fn test_optimize_persists_relocated_header() {
    let (_temp, path) = setup_temp_region();

    {
        let mut region = RegionFile::open(&path).unwrap();
        region.write(slot(0), 1, &payload(5000, 1)).unwrap();
        region.write(slot(1), 2, &payload(300, 2)).unwrap();
        region.write(slot(2), 3, &payload(9000, 3)).unwrap();
        region.remove(slot(0)).unwrap();
        region.optimize().unwrap();
    }

    let mut region = RegionFile::open(&path).unwrap();
    assert_eq!(region.sector_block(slot(1)).unwrap(), Some(SectorBlock::new(2, 1)));
    assert_eq!(region.sector_block(slot(2)).unwrap(), Some(SectorBlock::new(3, 3)));
    assert_eq!(region.read(slot(2)).unwrap(), Some(payload(9000, 3)));
    assert_eq!(file_len(&path), 6 * SECTOR);
}

#[test]
fn test_optimize_on_close() {
    let (_temp, path) = setup_temp_region();
    let config = RegionConfig::builder().optimize_on_close(true).build();

    let mut region = RegionFile::open_with(&path, config).unwrap();
    region.write(slot(0), 1, &payload(100, 1)).unwrap();
    region.write(slot(1), 1, &payload(100, 2)).unwrap();
    region.remove(slot(0)).unwrap();
    region.close().unwrap();

    assert_eq!(file_len(&path), 3 * SECTOR);
    let mut region = RegionFile::open(&path).unwrap();
    assert_eq!(region.read(slot(1)).unwrap(), Some(payload(100, 2)));
}

// =============================================================================
// Handle State Tests
// =============================================================================

#[test]
fn test_read_only_rejects_mutation() {
    let (_temp, path) = setup_temp_region();
    {
        let mut region = RegionFile::open(&path).unwrap();
        region.write(slot(0), 1, &payload(100, 1)).unwrap();
        region.write(slot(1), 1, &payload(100, 2)).unwrap();
        region.remove(slot(0)).unwrap();
        region.close().unwrap();
    }
    let before = fs::read(&path).unwrap();

    let mut region = RegionFile::open_with(&path, RegionConfig::read_only()).unwrap();
    assert_eq!(region.read(slot(1)).unwrap(), Some(payload(100, 2)));

    assert!(matches!(
        region.write(slot(2), 1, &payload(10, 1)),
        Err(RegionError::ReadOnlyViolation { operation: "write" })
    ));
    assert!(matches!(
        region.remove(slot(1)),
        Err(RegionError::ReadOnlyViolation { operation: "remove" })
    ));
    assert!(matches!(
        region.optimize(),
        Err(RegionError::ReadOnlyViolation { .. })
    ));
    region.flush().unwrap();
    region.close().unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_read_only_empty_file_is_untouched() {
    let (_temp, path) = setup_temp_region();
    fs::write(&path, b"").unwrap();

    let mut region = RegionFile::open_with(&path, RegionConfig::read_only()).unwrap();
    assert!(!region.has_slot(slot(0)).unwrap());
    region.close().unwrap();

    assert_eq!(file_len(&path), 0);
}

#[test]
fn test_missing_file_without_create() {
    let (_temp, path) = setup_temp_region();
    let config = RegionConfig::builder().create_if_missing(false).build();

    assert!(matches!(
        RegionFile::open_with(&path, config),
        Err(RegionError::Io(_))
    ));
}

#[test]
fn test_closed_handle_rejects_calls() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();
    region.write(slot(0), 1, &payload(10, 1)).unwrap();

    region.close().unwrap();
    assert!(region.is_closed());

    assert!(matches!(region.read(slot(0)), Err(RegionError::FileClosed)));
    assert!(matches!(
        region.write(slot(0), 1, &payload(10, 1)),
        Err(RegionError::FileClosed)
    ));
    assert!(matches!(region.remove(slot(0)), Err(RegionError::FileClosed)));
    assert!(matches!(region.flush(), Err(RegionError::FileClosed)));
    assert!(matches!(region.optimize(), Err(RegionError::FileClosed)));

    // close stays idempotent
    region.close().unwrap();
}

#[test]
fn test_close_before_init_writes_nothing() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();
    region.close().unwrap();

    assert_eq!(file_len(&path), 0);
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_length_overrunning_sectors_is_corrupt() {
    let (_temp, path) = setup_temp_region();
    {
        let mut region = RegionFile::open(&path).unwrap();
        region.write(slot(0), 1, &payload(100, 1)).unwrap();
        region.close().unwrap();
    }

    let mut bytes = fs::read(&path).unwrap();
    bytes[8192..8196].copy_from_slice(&5000u32.to_be_bytes());
    fs::write(&path, &bytes).unwrap();

    let mut region = RegionFile::open(&path).unwrap();
    assert!(matches!(region.read(slot(0)), Err(RegionError::CorruptFile(_))));
}

#[test]
fn test_stats_report_usage() {
    let (_temp, path) = setup_temp_region();
    let mut region = RegionFile::open(&path).unwrap();

    region.write(slot(0), 1, &payload(5000, 1)).unwrap(); // 2..4
    region.write(slot(1), 1, &payload(100, 2)).unwrap(); // 4
    region.write(slot(2), 1, &payload(100, 3)).unwrap(); // 5
    region.remove(slot(0)).unwrap();

    let stats = region.stats().unwrap();
    assert_eq!(stats.occupied_slots, 2);
    assert_eq!(stats.used_sectors, 2);
    assert_eq!(stats.free_sectors, 2);
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.append_cursor, 6);
    assert_eq!(stats.file_len, 6 * SECTOR);
}
