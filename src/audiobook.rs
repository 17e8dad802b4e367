/*!
 * Audiobook assembly.
 *
 * Chapter audio files are joined into one M4B with chapter markers taken from
 * an ffmetadata sidecar, then the cover image is attached if there is one.
 */

use anyhow::{Context, Result};
use log::{info, warn};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checkpoint::UnitCheckpoint;
use crate::file_utils::FileManager;
use crate::text_segmenter::BLANK_TITLE;
use crate::transcoder::Transcoder;

/// A chapter entry of the M4B, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterMarker {
    pub title: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Lay chapters end to end. Chapters without a title get `"blank"`.
pub fn chapter_markers(durations_ms: &[u64], titles: &[String]) -> Vec<ChapterMarker> {
    let mut start_ms = 0;
    durations_ms
        .iter()
        .enumerate()
        .map(|(i, duration)| {
            let marker = ChapterMarker {
                title: titles.get(i).cloned().unwrap_or_else(|| BLANK_TITLE.to_string()),
                start_ms,
                end_ms: start_ms + duration,
            };
            start_ms += duration;
            marker
        })
        .collect()
}

/// Escape a value for an ffmetadata file
pub fn escape_ffmetadata(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render the `;FFMETADATA1` sidecar for the book
pub fn render_ffmetadata(author: &str, title: &str, markers: &[ChapterMarker]) -> String {
    let mut out = String::from(";FFMETADATA1\n");
    // Writing to a String cannot fail
    let _ = writeln!(out, "ARTIST={}", escape_ffmetadata(author));
    let _ = writeln!(out, "ALBUM={}", escape_ffmetadata(title));
    for marker in markers {
        out.push_str("[CHAPTER]\n");
        out.push_str("TIMEBASE=1/1000\n");
        let _ = writeln!(out, "START={}", marker.start_ms);
        let _ = writeln!(out, "END={}", marker.end_ms);
        let _ = writeln!(out, "title={}", escape_ffmetadata(&marker.title));
    }
    out
}

/// Suffix of the concat demuxer list written next to the book
pub const CONCAT_LIST_SUFFIX: &str = "-filelist.ffconcat";

/// Concat demuxer list; single quotes in names become `'\''`
pub fn render_concat_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|file| {
            let absolute = std::fs::canonicalize(file).unwrap_or_else(|_| file.clone());
            format!("file '{}'\n", absolute.to_string_lossy().replace('\'', "'\\''"))
        })
        .collect()
}

/// Finished audiobook
#[derive(Debug, Clone)]
pub struct AssembledBook {
    pub m4b_path: PathBuf,
    pub markers: Vec<ChapterMarker>,
    pub cover_embedded: bool,
}

/// Builds the M4B from chapter audio
#[derive(Debug, Clone)]
pub struct AudiobookAssembler {
    transcoder: Arc<dyn Transcoder>,
}

impl AudiobookAssembler {
    pub fn new(transcoder: Arc<dyn Transcoder>) -> Self {
        Self { transcoder }
    }

    /// Package `chapter_files` into `<base>.m4b`.
    ///
    /// The sidecar, the concat list and the intermediate M4A are always
    /// deleted; chapter files only once the M4B exists. A missing or unusable
    /// cover only produces a warning.
    pub async fn assemble(
        &self,
        chapter_files: &[PathBuf],
        chapter_titles: &[String],
        author: &str,
        title: &str,
        base: &Path,
        cover: Option<&Path>,
    ) -> Result<AssembledBook> {
        let mut durations_ms = Vec::with_capacity(chapter_files.len());
        for file in chapter_files {
            let duration_us = self
                .transcoder
                .duration_us(file)
                .await
                .with_context(|| format!("Failed to probe chapter {}", file.display()))?;
            durations_ms.push(duration_us / 1_000);
        }
        let markers = chapter_markers(&durations_ms, chapter_titles);

        let metadata_path = FileManager::artifact_path(base, ".ffmetadata");
        let list_path = FileManager::artifact_path(base, CONCAT_LIST_SUFFIX);
        let m4a_path = FileManager::artifact_path(base, ".m4a");
        let m4b_path = FileManager::artifact_path(base, ".m4b");

        FileManager::write_to_file(&metadata_path, &render_ffmetadata(author, title, &markers))?;
        FileManager::write_to_file(&list_path, &render_concat_list(chapter_files))?;

        let packaged = self
            .transcoder
            .package_m4b(&list_path, &metadata_path, &m4a_path, &m4b_path)
            .await;
        // Chapter files stay on failure so the next run can reuse them
        let cleaned = FileManager::remove_files(&[&list_path, &metadata_path, &m4a_path]);
        packaged.with_context(|| format!("Failed to build {}", m4b_path.display()))?;
        cleaned?;

        for file in chapter_files {
            UnitCheckpoint::remove(file)?;
        }
        FileManager::remove_files(chapter_files)?;

        let cover_embedded = match cover {
            Some(cover) => self.attach_cover(&m4b_path, cover).await,
            None => false,
        };

        info!("Audiobook written to {}", m4b_path.display());
        Ok(AssembledBook {
            m4b_path,
            markers,
            cover_embedded,
        })
    }

    async fn attach_cover(&self, m4b_path: &Path, cover: &Path) -> bool {
        if !FileManager::file_exists(cover) {
            warn!("Cover image {} not found", cover.display());
            return false;
        }
        match self.transcoder.embed_cover(m4b_path, cover).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not attach cover {}: {}", cover.display(), e);
                false
            }
        }
    }
}
