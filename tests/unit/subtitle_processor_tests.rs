/*!
 * Tests for subtitle output
 */

use anyhow::Result;
use std::str::FromStr;

use bookvox::subtitle_processor::{SubtitleFormat, SubtitleTrack, parse_timestamp};
use bookvox::timeline::SubtitleCue;

use crate::common;

fn sample_cues() -> Vec<SubtitleCue> {
    vec![
        SubtitleCue {
            start_us: 1_600_000,
            end_us: 2_000_000,
            text: "Hello".to_string(),
        },
        SubtitleCue {
            start_us: 0,
            end_us: 400_000,
            text: "One".to_string(),
        },
    ]
}

/// Test WebVTT rendering
#[test]
fn test_display_withVtt_shouldWriteHeaderAndDottedTimestamps() {
    let track = SubtitleTrack::new(sample_cues(), SubtitleFormat::Vtt);

    assert_eq!(
        track.to_string(),
        "WEBVTT\n\n0:00:00.000 --> 0:00:00.400\nOne\n\n0:00:01.600 --> 0:00:02.000\nHello\n\n"
    );
}

/// Test SRT rendering
#[test]
fn test_display_withSrt_shouldNumberCuesAndUseCommas() {
    let track = SubtitleTrack::new(sample_cues(), SubtitleFormat::Srt);

    assert_eq!(
        track.to_string(),
        "1\n00:00:00,000 --> 00:00:00,400\nOne\n\n2\n00:00:01,600 --> 00:00:02,000\nHello\n\n"
    );
}

/// Test that an empty track still writes a valid file
#[test]
fn test_writeToFile_withNoCues_shouldWriteHeaderOnly() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("nested").join("book.vtt");

    let track = SubtitleTrack::new(Vec::new(), SubtitleFormat::Vtt);
    track.write_to_file(&path)?;

    assert!(track.is_empty());
    assert_eq!(std::fs::read_to_string(&path)?, "WEBVTT\n\n");
    Ok(())
}

/// Test timestamp parsing in both dialects
#[test]
fn test_parseTimestamp_shouldAcceptBothDialects() -> Result<()> {
    assert_eq!(parse_timestamp("00:00:01,600")?, 1_600_000);
    assert_eq!(parse_timestamp("1:02:03.456")?, 3_723_456_000);
    assert!(parse_timestamp("00:61:00,000").is_err());
    assert!(parse_timestamp("nonsense").is_err());
    Ok(())
}

/// Test that written timestamps parse back to the cue times
#[test]
fn test_formatTimestamp_thenParse_shouldKeepMilliseconds() -> Result<()> {
    for format in [SubtitleFormat::Vtt, SubtitleFormat::Srt] {
        let text = format.format_timestamp(12_800_000);
        assert_eq!(parse_timestamp(&text)?, 12_800_000);
    }
    Ok(())
}

/// Test format names
#[test]
fn test_subtitleFormat_fromStr_shouldAcceptKnownNames() {
    assert_eq!(SubtitleFormat::from_str("VTT").ok(), Some(SubtitleFormat::Vtt));
    assert_eq!(SubtitleFormat::from_str("webvtt").ok(), Some(SubtitleFormat::Vtt));
    assert_eq!(SubtitleFormat::from_str("srt").ok(), Some(SubtitleFormat::Srt));
    assert!(SubtitleFormat::from_str("ass").is_err());
    assert_eq!(SubtitleFormat::Srt.extension(), "srt");
}
