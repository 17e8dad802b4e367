/*!
 * Batch synthesis processing.
 *
 * Fragments of one unit (a chapter title or a paragraph) are synthesized
 * concurrently with a cap on requests in flight. Completion order is
 * arbitrary, so every result carries its sequence index and the batch is
 * handed back in index order.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::errors::SynthesisError;

use super::core::{FragmentRequest, SynthesisService, SynthesizedFragment};

/// Batch synthesizer for the fragments of one unit
#[derive(Clone, Debug)]
pub struct BatchSynthesizer {
    /// The synthesis service to use
    service: SynthesisService,

    /// Maximum number of concurrent requests
    max_concurrent_requests: usize,
}

impl BatchSynthesizer {
    /// Create a new batch synthesizer
    pub fn new(service: SynthesisService) -> Self {
        Self {
            max_concurrent_requests: service.max_concurrent_requests,
            service,
        }
    }

    pub fn service(&self) -> &SynthesisService {
        &self.service
    }

    /// Synthesize all fragments and return them in index order.
    ///
    /// The first fragment that exhausts its retries fails the whole batch.
    pub async fn synthesize_batch(&self, fragments: Vec<FragmentRequest>) -> Result<Vec<SynthesizedFragment>, SynthesisError> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        let total = fragments.len();
        let start_time = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_requests));

        let mut results = stream::iter(fragments)
            .map(|fragment| {
                let service = self.service.clone();
                let semaphore = semaphore.clone();

                async move {
                    let index = fragment.index;
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => service.synthesize_fragment(fragment).await,
                        Err(_) => Err(SynthesisError::WorkerLost(index)),
                    };
                    (index, result)
                }
            })
            .buffer_unordered(self.max_concurrent_requests)
            .collect::<Vec<_>>()
            .await;

        // Sort results by index to restore concatenation order
        results.sort_by_key(|(index, _)| *index);

        let mut synthesized = Vec::with_capacity(total);
        for (index, result) in results {
            match result {
                Ok(fragment) => synthesized.push(fragment),
                Err(e) => {
                    error!("Fragment {} failed: {}", index, e);
                    return Err(e);
                }
            }
        }

        debug!("Synthesized {} fragments in {:?}", total, start_time.elapsed());
        Ok(synthesized)
    }
}
