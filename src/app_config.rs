use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::Path;

use crate::subtitle_processor::SubtitleFormat;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Speech service settings
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Silence and transcoder settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Subtitle output settings
    #[serde(default)]
    pub subtitles: SubtitleConfig,

    /// Batch (multi-chapter) settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Speech service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpeechConfig {
    /// URL of the streaming synthesis endpoint
    #[serde(default = "default_speech_endpoint")]
    pub endpoint: String,

    /// Voice identifier, e.g. "en-US-AndrewNeural"
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Maximum number of fragments in flight
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Attempts per fragment before giving up
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Fixed delay between attempts (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: default_speech_endpoint(),
            voice: default_voice(),
            concurrent_requests: default_concurrent_requests(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Audio assembly configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AudioConfig {
    /// Silence after a chapter title and after each paragraph
    #[serde(default = "default_sentence_silence_ms")]
    pub sentence_silence_ms: u64,

    /// Extra silence after the last paragraph of a chapter
    #[serde(default = "default_chapter_silence_ms")]
    pub chapter_silence_ms: u64,

    /// Measure the audio of fragments that came back without word events
    /// and advance the subtitle timeline by that length
    #[serde(default = "default_true")]
    pub measure_silent_fragments: bool,

    /// ffmpeg binary
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,

    /// ffprobe binary
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: String,

    /// Timeout for a single transcoder call in seconds
    #[serde(default = "default_transcode_timeout_secs")]
    pub transcode_timeout_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sentence_silence_ms: default_sentence_silence_ms(),
            chapter_silence_ms: default_chapter_silence_ms(),
            measure_silent_fragments: default_true(),
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
            transcode_timeout_secs: default_transcode_timeout_secs(),
        }
    }
}

/// Subtitle output configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SubtitleConfig {
    /// Output dialect
    #[serde(default)]
    pub format: SubtitleFormat,
}

/// Batch processing of exported chapters
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchConfig {
    /// Number of chapter books narrated at the same time
    #[serde(default = "default_max_parallel_books")]
    pub max_parallel_books: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_parallel_books: default_max_parallel_books(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching log crate filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_speech_endpoint() -> String {
    "http://localhost:5050/v1/speech".to_string()
}

fn default_voice() -> String {
    "en-US-AndrewNeural".to_string()
}

fn default_concurrent_requests() -> usize {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    3000 // fixed, not exponential
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_sentence_silence_ms() -> u64 {
    1200
}

fn default_chapter_silence_ms() -> u64 {
    2800
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_transcode_timeout_secs() -> u64 {
    600
}

fn default_max_parallel_books() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a JSON file, or write the defaults there if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok((config, false));
        }

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;
        Ok((config, true))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.speech.endpoint)
            .with_context(|| format!("Invalid speech endpoint: {}", self.speech.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!("Speech endpoint must be http or https: {}", endpoint));
        }

        validate_voice(&self.speech.voice)?;

        if self.speech.concurrent_requests == 0 {
            return Err(anyhow!("speech.concurrent_requests must be at least 1"));
        }
        if self.speech.retry_count == 0 {
            return Err(anyhow!("speech.retry_count must be at least 1"));
        }
        if self.batch.max_parallel_books == 0 {
            return Err(anyhow!("batch.max_parallel_books must be at least 1"));
        }
        if self.audio.ffmpeg_path.trim().is_empty() || self.audio.ffprobe_path.trim().is_empty() {
            return Err(anyhow!("ffmpeg and ffprobe paths must not be empty"));
        }

        Ok(())
    }
}

/// Voices are named `<lang>-<REGION>-<Name>`; the language part must be a real ISO 639 code
pub fn validate_voice(voice: &str) -> Result<()> {
    let mut parts = voice.splitn(3, '-');
    let (Some(lang), Some(region), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(anyhow!("Voice '{}' is not of the form <lang>-<REGION>-<Name>", voice));
    };
    if region.is_empty() || name.is_empty() {
        return Err(anyhow!("Voice '{}' is not of the form <lang>-<REGION>-<Name>", voice));
    }
    let lang = lang.to_lowercase();
    let known = match lang.len() {
        2 => isolang::Language::from_639_1(&lang),
        3 => isolang::Language::from_639_3(&lang),
        _ => None,
    };
    if known.is_none() {
        return Err(anyhow!("Voice '{}' has unknown language code '{}'", voice, lang));
    }
    Ok(())
}
