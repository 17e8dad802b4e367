/*!
 * Resume checkpoints.
 *
 * Every finished unit (chapter title, paragraph, chapter) gets a marker file
 * `<unit-stem>.done.json` next to its audio. The marker names the audio file,
 * stores the unit's stitched timing and a fingerprint of everything that
 * shaped the audio. A unit is only skipped on a later run when marker, audio
 * and fingerprint all agree.
 */

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::timeline::TimedSegment;

/// Completion marker of one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCheckpoint {
    /// File name of the unit audio, relative to the marker's directory
    pub audio_file: String,
    /// Fingerprint of voice, text and silence settings
    pub fingerprint: String,
    /// Stitched timing relative to the unit start
    pub segment: TimedSegment,
}

/// Fingerprint the inputs that determine a unit's audio
pub fn fingerprint(voice: &str, text: &str, silences_ms: &[u64]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(voice.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    for silence in silences_ms {
        hasher.update(silence.to_le_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Marker path for a unit audio file: `dir/stem.flac` -> `dir/stem.done.json`
pub fn marker_path(audio_path: &Path) -> PathBuf {
    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    audio_path.with_file_name(format!("{}.done.json", stem))
}

impl UnitCheckpoint {
    pub fn new(audio_path: &Path, fingerprint: String, segment: TimedSegment) -> Self {
        Self {
            audio_file: audio_path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            fingerprint,
            segment,
        }
    }

    /// Load the checkpoint of `audio_path` if the unit is complete and current.
    ///
    /// Missing or unreadable markers, missing audio and fingerprint
    /// mismatches all mean "not complete".
    pub fn load_if_complete(audio_path: &Path, expected_fingerprint: &str) -> Option<Self> {
        let marker = marker_path(audio_path);
        let content = std::fs::read_to_string(&marker).ok()?;

        let checkpoint: UnitCheckpoint = match serde_json::from_str(&content) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!("Ignoring unreadable checkpoint {}: {}", marker.display(), e);
                return None;
            }
        };

        let audio_ok = std::fs::metadata(audio_path).map(|m| m.len() > 0).unwrap_or(false);
        if !audio_ok {
            debug!("Checkpoint {} has no audio, redoing unit", marker.display());
            return None;
        }

        if checkpoint.fingerprint != expected_fingerprint {
            warn!("Checkpoint {} is stale, redoing unit", marker.display());
            return None;
        }

        Some(checkpoint)
    }

    /// Write the marker for `audio_path` atomically
    pub fn store(&self, audio_path: &Path) -> Result<()> {
        let marker = marker_path(audio_path);
        let dir = marker
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let json = serde_json::to_string_pretty(self).context("Failed to serialize checkpoint")?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary checkpoint in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&marker)
            .with_context(|| format!("Failed to write checkpoint {}", marker.display()))?;
        Ok(())
    }

    /// Delete the marker of `audio_path`, if any
    pub fn remove(audio_path: &Path) -> Result<()> {
        let marker = marker_path(audio_path);
        match std::fs::remove_file(&marker) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove checkpoint {}", marker.display())),
        }
    }
}
