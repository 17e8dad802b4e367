use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use anyhow::{Result, Context, anyhow};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::timeline::{SubtitleCue, microseconds_to_timestamp};

// @module: Subtitle serialization for the narrated book

/// Output subtitle dialect
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// `WEBVTT` header, `H:MM:SS.mmm --> H:MM:SS.mmm` cues
    #[default]
    Vtt,
    /// Numbered cues, `HH:MM:SS,mmm --> HH:MM:SS,mmm`
    Srt,
}

impl SubtitleFormat {
    // @returns: File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Vtt => "vtt",
            Self::Srt => "srt",
        }
    }

    /// Format a timestamp in microseconds for this dialect
    pub fn format_timestamp(&self, microseconds: u64) -> String {
        match self {
            Self::Vtt => microseconds_to_timestamp(microseconds).replace(',', "."),
            Self::Srt => {
                let ms = microseconds / 1_000;
                let hours = ms / 3_600_000;
                let minutes = (ms % 3_600_000) / 60_000;
                let seconds = (ms % 60_000) / 1_000;
                let millis = ms % 1_000;
                format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
            }
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vtt" | "webvtt" => Ok(Self::Vtt),
            "srt" => Ok(Self::Srt),
            _ => Err(anyhow!("Invalid subtitle format: {}", s)),
        }
    }
}

/// Parse `H:MM:SS,mmm`, `HH:MM:SS,mmm` or `H:MM:SS.mmm` into microseconds
pub fn parse_timestamp(timestamp: &str) -> Result<u64> {
    let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

    if parts.len() != 4 {
        return Err(anyhow!("Invalid timestamp format: {}", timestamp));
    }

    let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
    let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
    let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
    let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
    }

    Ok((hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis) * 1_000)
}

/// Stitched subtitle track of a whole book
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    /// Cues in final-audio time
    pub cues: Vec<SubtitleCue>,

    /// Output dialect
    pub format: SubtitleFormat,
}

impl SubtitleTrack {
    /// Create a track, sorting the cues by start time
    pub fn new(mut cues: Vec<SubtitleCue>, format: SubtitleFormat) -> Self {
        cues.sort_by_key(|cue| cue.start_us);
        SubtitleTrack { cues, format }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Write the track next to the audiobook
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        if self.cues.is_empty() {
            warn!("Writing an empty subtitle track to {}", path.display());
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create subtitle file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        write!(writer, "{}", self)?;
        writer.flush()?;

        debug!("Wrote {} cues to {}", self.cues.len(), path.display());
        Ok(())
    }
}

impl fmt::Display for SubtitleTrack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.format == SubtitleFormat::Vtt {
            writeln!(f, "WEBVTT")?;
            writeln!(f)?;
        }
        for (i, cue) in self.cues.iter().enumerate() {
            if self.format == SubtitleFormat::Srt {
                writeln!(f, "{}", i + 1)?;
            }
            writeln!(
                f,
                "{} --> {}",
                self.format.format_timestamp(cue.start_us),
                self.format.format_timestamp(cue.end_us)
            )?;
            writeln!(f, "{}", cue.text)?;
            writeln!(f)?;
        }
        Ok(())
    }
}
