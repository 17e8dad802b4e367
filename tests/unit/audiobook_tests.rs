/*!
 * Tests for chapter metadata and M4B assembly
 */

use anyhow::Result;
use std::path::PathBuf;

use bookvox::audiobook::{AudiobookAssembler, ChapterMarker, chapter_markers, render_ffmetadata};

use crate::common::{self, FakeTranscoder};

/// Test that chapters are laid end to end
#[test]
fn test_chapterMarkers_shouldStartEachChapterWhereThePreviousEnds() {
    let markers = chapter_markers(&[8600, 8600, 1000], &["One".to_string(), "Two".to_string()]);

    assert_eq!(
        markers,
        vec![
            ChapterMarker { title: "One".to_string(), start_ms: 0, end_ms: 8600 },
            ChapterMarker { title: "Two".to_string(), start_ms: 8600, end_ms: 17200 },
            ChapterMarker { title: "blank".to_string(), start_ms: 17200, end_ms: 18200 },
        ]
    );
}

/// Test the ffmetadata sidecar layout
#[test]
fn test_renderFfmetadata_shouldWriteHeaderTagsAndChapters() {
    let markers = chapter_markers(&[1500], &["Intro; Part=1".to_string()]);

    let metadata = render_ffmetadata("Jane Doe", "My Book", &markers);

    assert_eq!(
        metadata,
        ";FFMETADATA1\nARTIST=Jane Doe\nALBUM=My Book\n[CHAPTER]\nTIMEBASE=1/1000\nSTART=0\nEND=1500\ntitle=Intro\\; Part\\=1\n"
    );
}

/// Test assembling chapter files into an M4B
#[tokio::test]
async fn test_assemble_shouldPackageAndCleanUp() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    let part1 = common::create_test_file(dir, "book-part1.flac", "speech:400\nsilence:1200\n")?;
    let part2 = common::create_test_file(dir, "book-part2.flac", "speech:900\n")?;
    let transcoder = FakeTranscoder::new();

    let assembled = AudiobookAssembler::new(transcoder.clone())
        .assemble(
            &[part1.clone(), part2.clone()],
            &["One".to_string(), "Two".to_string()],
            "Tester",
            "Test Book",
            &dir.join("book"),
            None,
        )
        .await?;

    assert_eq!(assembled.m4b_path, dir.join("book.m4b"));
    assert_eq!(assembled.markers[1].start_ms, 1600);
    assert_eq!(assembled.markers[1].end_ms, 2500);
    assert!(!assembled.cover_embedded);

    let m4b = std::fs::read_to_string(&assembled.m4b_path)?;
    assert!(m4b.starts_with("speech:400\nsilence:1200\nspeech:900\n"));
    assert!(m4b.contains("title=Two"));

    for leftover in ["book-part1.flac", "book-part2.flac", "book.ffmetadata", "book-filelist.ffconcat", "book.m4a"] {
        assert!(!dir.join(leftover).exists(), "{} should be removed", leftover);
    }
    assert_eq!(transcoder.count_calls("package"), 1);
    Ok(())
}

/// Test that a cover is attached when present
#[tokio::test]
async fn test_assemble_withCover_shouldEmbedIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    let part = common::create_test_file(dir, "book-part1.flac", "speech:400\n")?;
    let cover = common::create_test_file(dir, "book.jpg", "jpeg bytes")?;

    let assembled = AudiobookAssembler::new(FakeTranscoder::new())
        .assemble(&[part], &["One".to_string()], "A", "B", &dir.join("book"), Some(&cover))
        .await?;

    assert!(assembled.cover_embedded);
    assert!(std::fs::read_to_string(&assembled.m4b_path)?.ends_with("cover:book.jpg\n"));
    Ok(())
}

/// Test that cover problems do not fail the book
#[tokio::test]
async fn test_assemble_withBrokenOrMissingCover_shouldStillSucceed() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    let cover = common::create_test_file(dir, "book.jpg", "jpeg bytes")?;

    let part = common::create_test_file(dir, "book-part1.flac", "speech:400\n")?;
    let assembled = AudiobookAssembler::new(FakeTranscoder::failing_cover())
        .assemble(&[part], &["One".to_string()], "A", "B", &dir.join("book"), Some(&cover))
        .await?;
    assert!(!assembled.cover_embedded);
    assert!(assembled.m4b_path.exists());

    let part = common::create_test_file(dir, "other-part1.flac", "speech:400\n")?;
    let missing: PathBuf = dir.join("missing.png");
    let assembled = AudiobookAssembler::new(FakeTranscoder::new())
        .assemble(&[part], &["One".to_string()], "A", "B", &dir.join("other"), Some(&missing))
        .await?;
    assert!(!assembled.cover_embedded);
    Ok(())
}

/// Test that a transcoder failure is reported
#[tokio::test]
async fn test_assemble_withMissingChapterFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();

    let result = AudiobookAssembler::new(FakeTranscoder::new())
        .assemble(&[dir.join("nope.flac")], &[], "A", "B", &dir.join("book"), None)
        .await;

    assert!(result.is_err());
    Ok(())
}

/// Test that a packaging failure removes the sidecar files but keeps chapter audio
#[tokio::test]
async fn test_assemble_withPackagingFailure_shouldRemoveSidecarsAndKeepChapters() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    let part = common::create_test_file(dir, "book-part1.flac", "speech:400\n")?;
    let transcoder = FakeTranscoder::failing_package();

    let result = AudiobookAssembler::new(transcoder.clone())
        .assemble(&[part.clone()], &["One".to_string()], "A", "B", &dir.join("book"), None)
        .await;

    assert!(result.is_err());
    assert_eq!(transcoder.count_calls("package"), 1);
    for leftover in ["book.ffmetadata", "book-filelist.ffconcat", "book.m4a"] {
        assert!(!dir.join(leftover).exists(), "{} should be removed", leftover);
    }
    assert!(part.exists());

    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().to_string()))
        .collect::<std::io::Result<_>>()?;
    names.sort();
    assert_eq!(names, vec!["book-part1.flac".to_string()]);
    Ok(())
}
