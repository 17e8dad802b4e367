/*!
 * HTTP speech provider.
 *
 * Posts each fragment to a streaming endpoint and writes the audio chunks to
 * disk as they arrive, collecting word boundaries on the way.
 */

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::BytesMut;
use futures::StreamExt;
use log::{debug, trace};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::errors::ProviderError;
use crate::providers::{SpeechChunk, SpeechProvider, SpeechRequest};
use crate::timeline::WordEvent;

/// Client for a streaming speech endpoint.
///
/// The endpoint takes `{"text": ..., "voice": ...}` and answers with one JSON
/// object per line:
///
/// ```text
/// {"type":"audio","data":"<base64>"}
/// {"type":"WordBoundary","offset":100000,"duration":350000,"text":"Hello"}
/// {"type":"error","message":"..."}
/// ```
///
/// Offsets and durations are microseconds from the start of the fragment.
#[derive(Debug, Clone)]
pub struct HttpSpeechProvider {
    /// Full URL of the synthesis endpoint
    endpoint: String,
    /// HTTP client for making requests
    client: Client,
}

/// Request body sent to the endpoint
#[derive(Debug, Serialize)]
struct SynthesisBody<'a> {
    text: &'a str,
    voice: &'a str,
}

/// One line of the response stream
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireChunk {
    #[serde(rename = "audio")]
    Audio { data: String },
    #[serde(rename = "WordBoundary")]
    WordBoundary { offset: u64, duration: u64, text: String },
    #[serde(rename = "error")]
    Error { message: String },
    // SentenceBoundary and anything newer
    #[serde(other)]
    Other,
}

impl HttpSpeechProvider {
    /// Create a new client for the endpoint
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Decode one response line; blank and unknown lines yield `None`
pub fn decode_line(line: &str) -> Result<Option<SpeechChunk>, ProviderError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: WireChunk = serde_json::from_str(line)
        .map_err(|e| ProviderError::ParseError(format!("{}: {}", e, truncate(line, 200))))?;

    match chunk {
        WireChunk::Audio { data } => {
            let bytes = BASE64_STANDARD
                .decode(data.as_bytes())
                .map_err(|e| ProviderError::ParseError(format!("Invalid audio payload: {}", e)))?;
            Ok(Some(SpeechChunk::Audio(bytes)))
        }
        WireChunk::WordBoundary { offset, duration, text } => {
            Ok(Some(SpeechChunk::WordBoundary(WordEvent::new(offset, duration, text))))
        }
        WireChunk::Error { message } => Err(ProviderError::RequestFailed(message)),
        WireChunk::Other => Ok(None),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "…"
    } else {
        text.to_string()
    }
}

#[async_trait]
impl SpeechProvider for HttpSpeechProvider {
    async fn synthesize(&self, request: &SpeechRequest, audio_path: &Path) -> Result<Vec<WordEvent>, ProviderError> {
        let body = SynthesisBody {
            text: &request.text,
            voice: &request.voice,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        let mut file = tokio::fs::File::create(audio_path).await?;
        let mut events = Vec::new();
        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();

        while let Some(piece) = stream.next().await {
            let piece = piece.map_err(|e| ProviderError::ConnectionError(e.to_string()))?;
            buffer.extend_from_slice(&piece);

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line = buffer.split_to(newline + 1);
                let line = String::from_utf8_lossy(&line);
                match decode_line(&line)? {
                    Some(SpeechChunk::Audio(bytes)) => file.write_all(&bytes).await?,
                    Some(SpeechChunk::WordBoundary(event)) => {
                        trace!("Word boundary {:?}", event);
                        events.push(event);
                    }
                    None => {}
                }
            }
        }

        // Last line may lack a trailing newline
        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer);
            match decode_line(&line)? {
                Some(SpeechChunk::Audio(bytes)) => file.write_all(&bytes).await?,
                Some(SpeechChunk::WordBoundary(event)) => events.push(event),
                None => {}
            }
        }

        file.flush().await?;
        debug!("Synthesized {} words for {:?}", events.len(), truncate(&request.text, 60));
        Ok(events)
    }

    fn name(&self) -> &str {
        "http"
    }
}
