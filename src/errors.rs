/*!
 * Error types for the bookvox application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to a speech service
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when decoding the streamed response fails
    #[error("Failed to parse speech stream: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The service finished without producing any audio
    #[error("Speech service returned no audio for {0:?}")]
    EmptyAudio(String),

    /// Writing the streamed audio to disk failed
    #[error("Failed to write audio: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while synthesizing fragments
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// A fragment failed on every attempt; the book cannot be completed
    #[error("Giving up on {text:?} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Text of the fragment
        text: String,
        /// Number of attempts made
        attempts: u32,
        /// The error of the final attempt
        last_error: ProviderError,
    },

    /// A batch worker terminated without producing a result
    #[error("Synthesis worker for fragment {0} did not complete")]
    WorkerLost(usize),
}

/// Errors from the external transcoder (ffmpeg / ffprobe)
#[derive(Error, Debug)]
pub enum TranscodeError {
    /// The transcoder binary could not be started
    #[error("Failed to execute {program}: {message}")]
    SpawnFailed {
        /// Program name
        program: String,
        /// Underlying error
        message: String,
    },

    /// The transcoder exited with a non-zero status
    #[error("{program} failed with status {status}: {stderr}")]
    CommandFailed {
        /// Program name
        program: String,
        /// Exit status as printed by the OS
        status: String,
        /// Filtered stderr output
        stderr: String,
    },

    /// The transcoder did not finish in time
    #[error("{program} timed out after {seconds} seconds")]
    Timeout {
        /// Program name
        program: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// The transcoder claimed success but the expected output is missing or empty
    #[error("Transcoder produced no output at {0}")]
    MissingOutput(PathBuf),

    /// ffprobe output could not be interpreted
    #[error("Could not read duration of {path}: {message}")]
    Probe {
        /// Probed file
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Local file handling around a transcoder call failed
    #[error("I/O error around transcoder call: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while reading book text
#[derive(Error, Debug)]
pub enum SegmentError {
    /// The book has no chapter with speakable content
    #[error("No chapters with readable text found in {0}")]
    EmptyBook(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a speech provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from synthesis
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Error from the transcoder
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Error from text segmentation
    #[error("Segment error: {0}")]
    Segment(#[from] SegmentError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
