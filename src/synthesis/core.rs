/*!
 * Core synthesis service implementation.
 *
 * `SynthesisService` sends one fragment to the speech provider and retries
 * with a fixed delay until it gets usable audio or runs out of attempts.
 */

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::SpeechConfig;
use crate::errors::{ProviderError, SynthesisError};
use crate::providers::{SpeechProvider, SpeechRequest};
use crate::text_segmenter::normalize_for_speech;
use crate::timeline::WordEvent;

/// A fragment waiting to be synthesized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentRequest {
    /// Position in the unit's concatenation order
    pub index: usize,
    /// Title or sentence text
    pub text: String,
    /// Where the audio goes
    pub audio_path: PathBuf,
}

impl FragmentRequest {
    pub fn new(index: usize, text: impl Into<String>, audio_path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            text: text.into(),
            audio_path: audio_path.into(),
        }
    }
}

/// A synthesized fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedFragment {
    pub index: usize,
    pub text: String,
    pub audio_path: PathBuf,
    /// Word events relative to the fragment start, in service order
    pub events: Vec<WordEvent>,
}

/// Synthesis service with retry handling
#[derive(Clone, Debug)]
pub struct SynthesisService {
    /// Speech provider
    provider: Arc<dyn SpeechProvider>,

    /// Voice used for every fragment
    voice: String,

    /// Attempts per fragment
    retry_count: u32,

    /// Delay between attempts
    retry_backoff: Duration,

    /// Upper bound on fragments in flight
    pub max_concurrent_requests: usize,
}

impl SynthesisService {
    /// Create a new synthesis service from the speech settings
    pub fn new(provider: Arc<dyn SpeechProvider>, config: &SpeechConfig) -> Self {
        Self {
            provider,
            voice: config.voice.clone(),
            retry_count: config.retry_count.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_concurrent_requests: config.concurrent_requests.max(1),
        }
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Synthesize one fragment, retrying on any failure.
    ///
    /// A failure is a provider error or an audio file that is missing or
    /// empty afterwards. Exhausting the attempts is fatal for the book.
    pub async fn synthesize_fragment(&self, fragment: FragmentRequest) -> Result<SynthesizedFragment, SynthesisError> {
        let request = SpeechRequest::new(normalize_for_speech(&fragment.text), &self.voice);
        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match self.attempt(&request, &fragment.audio_path).await {
                Ok(events) => {
                    debug!(
                        "Fragment {} synthesized on attempt {} ({} words)",
                        fragment.index,
                        attempt,
                        events.len()
                    );
                    return Ok(SynthesizedFragment {
                        index: fragment.index,
                        text: fragment.text,
                        audio_path: fragment.audio_path,
                        events,
                    });
                }
                Err(e) => {
                    warn!(
                        "Synthesis attempt {}/{} failed for {:?}: {}",
                        attempt, self.retry_count, fragment.text, e
                    );
                    last_error = Some(e);
                    if attempt < self.retry_count && !self.retry_backoff.is_zero() {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
            }
        }

        Err(SynthesisError::RetriesExhausted {
            text: fragment.text,
            attempts: self.retry_count,
            last_error: last_error.unwrap_or_else(|| ProviderError::EmptyAudio(request.text.clone())),
        })
    }

    async fn attempt(&self, request: &SpeechRequest, audio_path: &Path) -> Result<Vec<WordEvent>, ProviderError> {
        let events = self.provider.synthesize(request, audio_path).await?;
        match tokio::fs::metadata(audio_path).await {
            Ok(meta) if meta.len() > 0 => Ok(events),
            _ => Err(ProviderError::EmptyAudio(request.text.clone())),
        }
    }
}
