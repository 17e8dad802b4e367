/*!
 * Tests for fragment synthesis with retries and batches
 */

use anyhow::Result;
use std::sync::Arc;

use bookvox::app_config::SpeechConfig;
use bookvox::errors::SynthesisError;
use bookvox::providers::mock::MockSpeechProvider;
use bookvox::synthesis::{BatchSynthesizer, FragmentRequest, SynthesisService};
use bookvox::timeline::WordEvent;

use crate::common;

fn speech_config() -> SpeechConfig {
    common::test_config().speech
}

/// Test a fragment that succeeds right away
#[tokio::test]
async fn test_synthesizeFragment_withWorkingProvider_shouldReturnEvents() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockSpeechProvider::working());
    let service = SynthesisService::new(provider.clone(), &speech_config());

    let fragment = service
        .synthesize_fragment(FragmentRequest::new(0, "Hello world.", temp_dir.path().join("s1.mp3")))
        .await?;

    assert_eq!(fragment.events, vec![
        WordEvent::new(0, 400_000, "Hello"),
        WordEvent::new(500_000, 400_000, "world."),
    ]);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(service.provider_name(), "mock");
    Ok(())
}

/// Test that a failed attempt is retried
#[tokio::test]
async fn test_synthesizeFragment_withIntermittentProvider_shouldRecover() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockSpeechProvider::intermittent(2));
    let service = SynthesisService::new(provider.clone(), &speech_config());

    // Request 1 succeeds, request 2 fails, request 3 succeeds
    service
        .synthesize_fragment(FragmentRequest::new(0, "First.", temp_dir.path().join("s1.mp3")))
        .await?;
    let second = service
        .synthesize_fragment(FragmentRequest::new(1, "Second.", temp_dir.path().join("s2.mp3")))
        .await?;

    assert_eq!(second.events.len(), 1);
    assert_eq!(provider.call_count(), 3);
    Ok(())
}

/// Test that exhausting retries is an error carrying the attempt count
#[tokio::test]
async fn test_synthesizeFragment_withFailingProvider_shouldExhaustRetries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockSpeechProvider::failing());
    let service = SynthesisService::new(provider.clone(), &speech_config());

    let result = service
        .synthesize_fragment(FragmentRequest::new(0, "Doomed.", temp_dir.path().join("s1.mp3")))
        .await;

    match result {
        Err(SynthesisError::RetriesExhausted { text, attempts, .. }) => {
            assert_eq!(text, "Doomed.");
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected RetriesExhausted, got {:?}", other),
    }
    assert_eq!(provider.call_count(), 3);
    Ok(())
}

/// Test that empty audio counts as a failure
#[tokio::test]
async fn test_synthesizeFragment_withEmptyAudio_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockSpeechProvider::empty());
    let service = SynthesisService::new(provider.clone(), &speech_config());

    let result = service
        .synthesize_fragment(FragmentRequest::new(0, "Nothing.", temp_dir.path().join("s1.mp3")))
        .await;

    assert!(result.is_err());
    assert_eq!(provider.call_count(), 3);
    Ok(())
}

/// Test that repeated punctuation is collapsed before sending
#[tokio::test]
async fn test_synthesizeFragment_shouldNormalizeText() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockSpeechProvider::working());
    let service = SynthesisService::new(provider.clone(), &speech_config());

    let fragment = service
        .synthesize_fragment(FragmentRequest::new(0, "What?!!", temp_dir.path().join("s1.mp3")))
        .await?;

    assert_eq!(provider.requests(), vec!["What?!".to_string()]);
    assert_eq!(fragment.text, "What?!!");
    Ok(())
}

/// Test that a batch comes back in index order regardless of completion order
#[tokio::test]
async fn test_synthesizeBatch_shouldReturnFragmentsInIndexOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockSpeechProvider::slow(5));
    let service = SynthesisService::new(provider.clone(), &speech_config());
    let batch = BatchSynthesizer::new(service);

    let requests: Vec<FragmentRequest> = (0..8)
        .rev()
        .map(|i| FragmentRequest::new(i, format!("Sentence number {}.", i), temp_dir.path().join(format!("s{}.mp3", i))))
        .collect();

    let fragments = batch.synthesize_batch(requests).await?;

    let indexes: Vec<usize> = fragments.iter().map(|f| f.index).collect();
    assert_eq!(indexes, (0..8).collect::<Vec<_>>());
    assert_eq!(provider.call_count(), 8);
    assert!(fragments.iter().all(|f| f.audio_path.exists()));
    Ok(())
}

/// Test that one failing fragment fails the batch
#[tokio::test]
async fn test_synthesizeBatch_withFailingProvider_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let provider = Arc::new(MockSpeechProvider::failing());
    let batch = BatchSynthesizer::new(SynthesisService::new(provider, &speech_config()));

    let result = batch
        .synthesize_batch(vec![FragmentRequest::new(0, "A.", temp_dir.path().join("a.mp3"))])
        .await;

    assert!(result.is_err());
    Ok(())
}

/// Test that an empty batch does nothing
#[tokio::test]
async fn test_synthesizeBatch_withNoFragments_shouldReturnEmpty() -> Result<()> {
    let provider = Arc::new(MockSpeechProvider::working());
    let batch = BatchSynthesizer::new(SynthesisService::new(provider.clone(), &speech_config()));

    assert!(batch.synthesize_batch(Vec::new()).await?.is_empty());
    assert_eq!(provider.call_count(), 0);
    Ok(())
}
