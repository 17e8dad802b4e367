/*!
 * Mock speech provider for testing.
 *
 * This module provides a provider that simulates different service behaviors:
 * - `MockSpeechProvider::working()` - Always succeeds with evenly spaced words
 * - `MockSpeechProvider::intermittent(n)` - Fails every nth request
 * - `MockSpeechProvider::failing()` - Always fails with an error
 * - `MockSpeechProvider::silent()` - Returns audio but no word boundaries
 *
 * The "audio" it writes is a single text line `speech:<ms>` so fake
 * transcoders in the tests can tell how long a fragment is.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{SpeechChunk, SpeechProvider, SpeechRequest, write_chunks};
use crate::timeline::{WordEvent, fragment_end};

/// Spacing between word starts of the default word clock (microseconds)
pub const DEFAULT_WORD_US: u64 = 500_000;

/// Spoken length of each word of the default word clock (microseconds)
pub const DEFAULT_SPOKEN_US: u64 = 400_000;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds; word k starts at k * word_us and lasts spoken_us
    Working { word_us: u64, spoken_us: u64 },
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Produces neither audio nor events
    Empty,
    /// Produces audio but no word boundaries
    Silent,
    /// Simulates slow response (for concurrency testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing synthesis behavior
#[derive(Debug)]
pub struct MockSpeechProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Texts received, in arrival order
    requests: Arc<Mutex<Vec<String>>>,
    /// Custom event generator (optional)
    script: Option<fn(&str) -> Vec<WordEvent>>,
    /// Texts whose word events are withheld while their audio is kept
    muted: Option<fn(&str) -> bool>,
}

impl MockSpeechProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            script: None,
            muted: None,
        }
    }

    /// Create a working mock provider with the default word clock
    pub fn working() -> Self {
        Self::new(MockBehavior::Working {
            word_us: DEFAULT_WORD_US,
            spoken_us: DEFAULT_SPOKEN_US,
        })
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns nothing at all
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that returns audio without word boundaries
    pub fn silent() -> Self {
        Self::new(MockBehavior::Silent)
    }

    /// Create a working mock that sleeps before answering
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom event generator used by the succeeding behaviors
    pub fn with_script(mut self, script: fn(&str) -> Vec<WordEvent>) -> Self {
        self.script = Some(script);
        self
    }

    /// Withhold word events for texts matching `muted`
    pub fn with_muted(mut self, muted: fn(&str) -> bool) -> Self {
        self.muted = Some(muted);
        self
    }

    /// Number of synthesize calls so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Texts received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Events of the default word clock for a text
    pub fn word_clock(text: &str, word_us: u64, spoken_us: u64) -> Vec<WordEvent> {
        text.split_whitespace()
            .enumerate()
            .map(|(k, word)| WordEvent::new(k as u64 * word_us, spoken_us, word))
            .collect()
    }

    fn events_for(&self, text: &str) -> Vec<WordEvent> {
        if let Some(script) = self.script {
            return script(text);
        }
        match self.behavior {
            MockBehavior::Working { word_us, spoken_us } => Self::word_clock(text, word_us, spoken_us),
            _ => Self::word_clock(text, DEFAULT_WORD_US, DEFAULT_SPOKEN_US),
        }
    }

    async fn speak(&self, text: &str, audio_path: &Path) -> Result<Vec<WordEvent>, ProviderError> {
        let events = self.events_for(text);
        let audio = format!("speech:{}\n", fragment_end(&events) / 1_000).into_bytes();
        let mut chunks = vec![SpeechChunk::Audio(audio)];
        if !self.muted.is_some_and(|muted| muted(text)) {
            chunks.extend(events.into_iter().map(SpeechChunk::WordBoundary));
        }
        write_chunks(chunks, audio_path).await
    }
}

impl Clone for MockSpeechProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            script: self.script,
            muted: self.muted,
        }
    }
}

#[async_trait]
impl SpeechProvider for MockSpeechProvider {
    async fn synthesize(&self, request: &SpeechRequest, audio_path: &Path) -> Result<Vec<WordEvent>, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.text.clone());

        match self.behavior {
            MockBehavior::Working { .. } => self.speak(&request.text, audio_path).await,

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    self.speak(&request.text, audio_path).await
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => write_chunks(Vec::new(), audio_path).await,

            MockBehavior::Silent => {
                let spoken = fragment_end(&self.events_for(&request.text));
                let audio = format!("speech:{}\n", spoken / 1_000).into_bytes();
                write_chunks(vec![SpeechChunk::Audio(audio)], audio_path).await
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                self.speak(&request.text, audio_path).await
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
