/*!
 * Tests for resume checkpoints
 */

use anyhow::Result;

use bookvox::checkpoint::{UnitCheckpoint, fingerprint, marker_path};
use bookvox::timeline::{TimedSegment, WordEvent};

use crate::common;

fn segment() -> TimedSegment {
    TimedSegment {
        events: vec![WordEvent::new(0, 400_000, "One")],
        duration_us: 1_600_000,
    }
}

/// Test that a stored checkpoint is found again
#[test]
fn test_store_thenLoad_withMatchingFingerprint_shouldReturnSegment() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "book-part1-title.mp3", "speech:400\n")?;
    let fp = fingerprint("en-US-AndrewNeural", "One", &[1200]);

    UnitCheckpoint::new(&audio, fp.clone(), segment()).store(&audio)?;

    assert!(marker_path(&audio).exists());
    let loaded = UnitCheckpoint::load_if_complete(&audio, &fp).expect("checkpoint should load");
    assert_eq!(loaded.audio_file, "book-part1-title.mp3");
    assert_eq!(loaded.segment, segment());
    Ok(())
}

/// Test that a fingerprint mismatch means the unit is redone
#[test]
fn test_load_withStaleFingerprint_shouldReturnNone() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "unit.flac", "speech:400\n")?;
    let old = fingerprint("en-US-AndrewNeural", "One", &[1200]);
    let new = fingerprint("en-GB-SoniaNeural", "One", &[1200]);

    UnitCheckpoint::new(&audio, old, segment()).store(&audio)?;

    assert!(UnitCheckpoint::load_if_complete(&audio, &new).is_none());
    Ok(())
}

/// Test that a marker without audio means the unit is redone
#[test]
fn test_load_withMissingOrEmptyAudio_shouldReturnNone() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = temp_dir.path().join("unit.flac");
    let fp = fingerprint("v", "t", &[]);
    UnitCheckpoint::new(&audio, fp.clone(), segment()).store(&audio)?;

    assert!(UnitCheckpoint::load_if_complete(&audio, &fp).is_none());

    std::fs::write(&audio, "")?;
    assert!(UnitCheckpoint::load_if_complete(&audio, &fp).is_none());
    Ok(())
}

/// Test that a corrupt marker is ignored
#[test]
fn test_load_withCorruptMarker_shouldReturnNone() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "unit.flac", "speech:1\n")?;
    std::fs::write(marker_path(&audio), "{ truncated")?;

    assert!(UnitCheckpoint::load_if_complete(&audio, "anything").is_none());
    Ok(())
}

/// Test marker removal, including when there is nothing to remove
#[test]
fn test_remove_shouldDeleteMarkerAndTolerateMissing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let audio = common::create_test_file(temp_dir.path(), "unit.flac", "speech:1\n")?;
    UnitCheckpoint::new(&audio, "fp".to_string(), segment()).store(&audio)?;

    UnitCheckpoint::remove(&audio)?;
    assert!(!marker_path(&audio).exists());
    UnitCheckpoint::remove(&audio)?;
    Ok(())
}

/// Test that every input changes the fingerprint
#[test]
fn test_fingerprint_shouldDependOnVoiceTextAndSilences() {
    let base = fingerprint("en-US-AndrewNeural", "Hello world.", &[1200, 0]);

    assert_eq!(base.len(), 64);
    assert_eq!(base, fingerprint("en-US-AndrewNeural", "Hello world.", &[1200, 0]));
    assert_ne!(base, fingerprint("en-US-AriaNeural", "Hello world.", &[1200, 0]));
    assert_ne!(base, fingerprint("en-US-AndrewNeural", "Hello world!", &[1200, 0]));
    assert_ne!(base, fingerprint("en-US-AndrewNeural", "Hello world.", &[1200, 2800]));
}
