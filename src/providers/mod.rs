/*!
 * Speech service clients.
 *
 * This module contains client implementations for speech services:
 * - `http`: streaming synthesis over HTTP (newline-delimited JSON)
 * - `mock`: scripted in-process provider for tests and dry runs
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

use crate::errors::ProviderError;
use crate::timeline::WordEvent;

/// One synthesis request: a fragment's text spoken with a voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,
    /// Voice identifier
    pub voice: String,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
        }
    }
}

/// A decoded item of a speech stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechChunk {
    /// Encoded audio bytes, in stream order
    Audio(Vec<u8>),
    /// A word boundary relative to the start of this fragment
    WordBoundary(WordEvent),
}

/// Common trait for all speech providers
///
/// Implementations stream the audio of `request` into `audio_path` and return
/// the word boundaries in the order the service emitted them.
#[async_trait]
pub trait SpeechProvider: Send + Sync + Debug {
    /// Synthesize one fragment
    ///
    /// # Arguments
    /// * `request` - Text and voice
    /// * `audio_path` - File the audio is written to (created or truncated)
    ///
    /// # Returns
    /// * `Result<Vec<WordEvent>, ProviderError>` - Word boundaries or an error
    async fn synthesize(&self, request: &SpeechRequest, audio_path: &Path) -> Result<Vec<WordEvent>, ProviderError>;

    /// Short provider name for log lines
    fn name(&self) -> &str;
}

/// Drain decoded chunks into an audio file and an event list
pub async fn write_chunks<I>(chunks: I, audio_path: &Path) -> Result<Vec<WordEvent>, ProviderError>
where
    I: IntoIterator<Item = SpeechChunk>,
{
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(audio_path).await?;
    let mut events = Vec::new();
    for chunk in chunks {
        match chunk {
            SpeechChunk::Audio(bytes) => file.write_all(&bytes).await?,
            SpeechChunk::WordBoundary(event) => events.push(event),
        }
    }
    file.flush().await?;
    Ok(events)
}

pub mod http;
pub mod mock;
