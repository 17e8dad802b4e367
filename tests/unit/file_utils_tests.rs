/*!
 * Tests for file and folder utilities
 */

use anyhow::Result;
use std::path::{Path, PathBuf};

use bookvox::app_controller::select_chapters;
use bookvox::file_utils::{FileManager, FileType};

use crate::common;

/// Test artifact naming
#[test]
fn test_artifactPath_shouldAppendSuffixToBase() {
    let base = FileManager::base_path("/books/novel.txt");

    assert_eq!(base, PathBuf::from("/books/novel"));
    assert_eq!(FileManager::artifact_path(&base, "-part3.flac"), PathBuf::from("/books/novel-part3.flac"));
    assert_eq!(FileManager::artifact_path(&base, ".m4b"), PathBuf::from("/books/novel.m4b"));
}

/// Test that only direct children with the extension are found, sorted
#[test]
fn test_findFiles_shouldListMatchingFilesSorted() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    common::create_test_file(dir, "b.txt", "b")?;
    common::create_test_file(dir, "a.TXT", "a")?;
    common::create_test_file(dir, "c.epub", "c")?;
    std::fs::create_dir(dir.join("sub"))?;
    common::create_test_file(&dir.join("sub"), "d.txt", "d")?;

    let files = FileManager::find_files(dir, "txt")?;

    assert_eq!(files, vec![dir.join("a.TXT"), dir.join("b.txt")]);
    Ok(())
}

/// Test input detection
#[test]
fn test_detectFileType_shouldRecognizeInputs() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path();
    let epub = common::create_test_file(dir, "book.epub", "")?;
    let text = common::create_test_file(dir, "book.txt", "")?;
    let other = common::create_test_file(dir, "book.pdf", "")?;

    assert_eq!(FileManager::detect_file_type(&epub)?, FileType::Epub);
    assert_eq!(FileManager::detect_file_type(&text)?, FileType::Text);
    assert_eq!(FileManager::detect_file_type(dir)?, FileType::Directory);
    assert_eq!(FileManager::detect_file_type(&other)?, FileType::Unknown);
    assert!(FileManager::detect_file_type(dir.join("missing.txt")).is_err());
    Ok(())
}

/// Test removing files that may or may not exist
#[test]
fn test_removeFiles_withMissingFiles_shouldSucceed() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let present = common::create_test_file(temp_dir.path(), "x.mp3", "x")?;
    let absent = temp_dir.path().join("y.mp3");

    FileManager::remove_files(&[&present, &absent])?;

    assert!(!present.exists());
    Ok(())
}

/// Test the issues log format
#[test]
fn test_appendToLogFile_shouldAppendTimestampedLines() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let log = temp_dir.path().join("logs").join("issues.log");

    FileManager::append_to_log_file(&log, "first")?;
    FileManager::append_to_log_file(&log, "second")?;

    let content = std::fs::read_to_string(&log)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('[') && lines[0].ends_with("] first"));
    assert!(lines[1].ends_with("] second"));
    Ok(())
}

/// Test chapter range selection for batch runs
#[test]
fn test_selectChapters_shouldUseOneBasedInclusiveRange() {
    let files: Vec<PathBuf> = (1..=5).map(|i| Path::new("/b").join(format!("book-{}.txt", i))).collect();

    assert_eq!(select_chapters(&files, None, None).len(), 5);
    assert_eq!(select_chapters(&files, Some(2), Some(3)), files[1..3].to_vec());
    assert_eq!(select_chapters(&files, Some(4), Some(99)), files[3..].to_vec());
    assert_eq!(select_chapters(&files, Some(0), Some(1)), files[..1].to_vec());
    assert!(select_chapters(&files, Some(4), Some(2)).is_empty());
    assert!(select_chapters(&[], None, None).is_empty());
}
