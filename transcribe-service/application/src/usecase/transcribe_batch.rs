use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;
use validator::Validate;

use transcribe_domain::{AudioNormalizerPort, DomainError, InputItem, NormalizedAudio};

use crate::{
    ApplicationError, ExecutionScheduler, RequestContext, ResultAssembler,
    TranscribeBatchRequest, TranscribeBatchResponse,
};

#[async_trait]
pub trait TranscribeBatchUseCase: Send + Sync {
    /// Transcribes every input of the request. The response holds one result per
    /// input in request order. Cancelling `cancel` stops the request at the next
    /// stage boundary and yields `ApplicationError::Cancelled`.
    async fn transcribe(
        &self,
        request: TranscribeBatchRequest,
        cancel: CancellationToken,
    ) -> Result<TranscribeBatchResponse, ApplicationError>;
}

pub struct TranscribeBatchUseCaseImpl {
    normalizer: Arc<dyn AudioNormalizerPort>,
    context: RequestContext,
}

impl TranscribeBatchUseCaseImpl {
    pub fn new(normalizer: Arc<dyn AudioNormalizerPort>, context: RequestContext) -> Self {
        Self {
            normalizer,
            context,
        }
    }

    async fn run(
        &self,
        items: Vec<InputItem>,
        cancel: &CancellationToken,
    ) -> Result<TranscribeBatchResponse, ApplicationError> {
        let expected = items.len();
        let mut assembler = ResultAssembler::new(expected);

        let normalized = self.normalize_all(items, cancel).await;
        if cancel.is_cancelled() {
            // Dropping the normalized audio removes its scratch files.
            drop(normalized);
            return Err(ApplicationError::Cancelled);
        }

        let mut ready = Vec::with_capacity(normalized.len());
        for (index, outcome) in normalized {
            match outcome {
                Ok(audio) => ready.push(audio),
                Err(error) => {
                    tracing::warn!(original_index = index, error = %error, "normalization failed");
                    assembler.record_failure(index, 0.0, error.into_normalizer_item_error());
                }
            }
        }
        ready.sort_by_key(NormalizedAudio::original_index);

        let policy = self.context.policy;
        let (shorts, longs) = policy.bucketize(ready);
        let batches = policy.pack_batches(shorts);
        tracing::info!(
            item_count = expected,
            short_batch_count = batches.len(),
            long_count = longs.len(),
            "scheduling inference"
        );

        ExecutionScheduler::new(policy, self.context.engine.clone())
            .run(batches, longs, &mut assembler, cancel)
            .await?;

        let results = assembler.finish()?;
        let failed = results.iter().filter(|result| !result.is_success()).count();
        tracing::info!(item_count = results.len(), failed, "request completed");
        Ok(TranscribeBatchResponse::from_results(results))
    }

    /// Normalizes items with bounded concurrency. Items not yet started when the
    /// token fires are skipped; in-flight ones are left to finish.
    async fn normalize_all(
        &self,
        items: Vec<InputItem>,
        cancel: &CancellationToken,
    ) -> Vec<(usize, Result<NormalizedAudio, DomainError>)> {
        let concurrency = self.context.normalize_concurrency.max(1);
        stream::iter(items)
            .map(|item| {
                let normalizer = self.normalizer.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let index = item.original_index;
                    Some((index, normalizer.normalize(item).await))
                }
            })
            .buffer_unordered(concurrency)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await
    }
}

#[async_trait]
impl TranscribeBatchUseCase for TranscribeBatchUseCaseImpl {
    async fn transcribe(
        &self,
        request: TranscribeBatchRequest,
        cancel: CancellationToken,
    ) -> Result<TranscribeBatchResponse, ApplicationError> {
        request.validate()?;
        if request.inputs.is_empty() {
            return Ok(TranscribeBatchResponse::no_inputs());
        }

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "transcribe_batch",
            request_id = %request_id,
            engine = self.context.engine.name()
        );

        async move {
            let items = request.into_items();
            tracing::info!(item_count = items.len(), "transcription request received");

            let scoped = cancel.child_token();
            let timer = self
                .context
                .request_timeout
                .map(|timeout| spawn_deadline(timeout, scoped.clone()));

            let outcome = self.run(items, &scoped).await;
            if let Some(timer) = timer {
                timer.abort();
            }

            match outcome {
                Err(ApplicationError::Cancelled) if !cancel.is_cancelled() => {
                    let timeout = self.context.request_timeout.unwrap_or_default();
                    tracing::warn!(timeout_ms = timeout.as_millis() as u64, "request timed out");
                    Err(ApplicationError::TimedOut(timeout))
                }
                Err(ApplicationError::Cancelled) => {
                    tracing::info!("request cancelled");
                    Err(ApplicationError::Cancelled)
                }
                other => other,
            }
        }
        .instrument(span)
        .await
    }
}

fn spawn_deadline(timeout: Duration, token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        token.cancel();
    })
}
