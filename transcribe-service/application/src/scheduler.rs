use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use transcribe_domain::{
    Batch, DomainError, EngineInput, EngineItemOutput, NormalizedAudio, SchedulingPolicy,
    TranscribeOptions,
};

use crate::{ApplicationError, EngineHandle, ResultAssembler};

/// Drives every engine call for one request.
///
/// Short batches run first, in packing order, then long items one at a time.
/// A batch whose call fails as a whole is split into singletons that are retried
/// once each; a singleton that fails again is reported as an item error. The
/// cancellation token is checked before every call, never during one.
pub struct ExecutionScheduler {
    policy: SchedulingPolicy,
    engine: Arc<EngineHandle>,
}

impl ExecutionScheduler {
    pub fn new(policy: SchedulingPolicy, engine: Arc<EngineHandle>) -> Self {
        Self { policy, engine }
    }

    pub async fn run(
        &self,
        batches: Vec<Batch>,
        longs: Vec<NormalizedAudio>,
        assembler: &mut ResultAssembler,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        for batch in batches {
            self.run_batch(batch, assembler, cancel).await?;
        }
        for audio in longs {
            ensure_active(cancel)?;
            self.run_single(audio, assembler).await;
        }
        Ok(())
    }

    /// A failed multi-member batch is retried once per member. A batch of one is
    /// already a singleton, so its failure is reported without a second attempt.
    async fn run_batch(
        &self,
        batch: Batch,
        assembler: &mut ResultAssembler,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        ensure_active(cancel)?;
        if batch.len() == 1 {
            if let Some(audio) = batch.members.into_iter().next() {
                self.run_single(audio, assembler).await;
            }
            return Ok(());
        }

        let options = options_for(&batch);
        let inputs: Vec<EngineInput> = batch
            .members
            .iter()
            .map(NormalizedAudio::engine_input)
            .collect();
        tracing::info!(
            member_count = batch.len(),
            total_duration_seconds = batch.total_duration_seconds,
            attention_mode = %batch.attention_mode,
            "transcribing short batch"
        );

        match self.call(&inputs, &options).await {
            Ok(outputs) => {
                for (audio, output) in batch.members.into_iter().zip(outputs) {
                    assembler.record_output(audio, output);
                }
            }
            Err(error) => {
                tracing::warn!(
                    member_count = batch.len(),
                    error = %error,
                    "batch inference failed, retrying members individually"
                );
                for audio in batch.members {
                    ensure_active(cancel)?;
                    self.run_single(audio, assembler).await;
                }
            }
        }
        Ok(())
    }

    /// One engine call for one item, with the attention mode its own duration selects.
    async fn run_single(&self, audio: NormalizedAudio, assembler: &mut ResultAssembler) {
        let batch = self.policy.batch(vec![audio]);
        let options = options_for(&batch);
        let inputs: Vec<EngineInput> = batch
            .members
            .iter()
            .map(NormalizedAudio::engine_input)
            .collect();
        let Some(audio) = batch.members.into_iter().next() else {
            return;
        };
        tracing::debug!(
            original_index = audio.original_index(),
            duration_seconds = audio.duration_seconds,
            attention_mode = %options.attention_mode,
            "transcribing single item"
        );

        match self.call(&inputs, &options).await {
            Ok(mut outputs) => match outputs.pop() {
                Some(output) => assembler.record_output(audio, output),
                None => assembler.record_inference_failure(
                    audio,
                    DomainError::inference("engine returned no result").into_inference_item_error(),
                ),
            },
            Err(error) => {
                tracing::warn!(
                    original_index = audio.original_index(),
                    error = %error,
                    "item inference failed"
                );
                assembler.record_inference_failure(audio, error.into_inference_item_error());
            }
        }
    }

    /// Engine call whose output count is checked against the input count. A
    /// mismatch counts as a failure of the whole call.
    async fn call(
        &self,
        inputs: &[EngineInput],
        options: &TranscribeOptions,
    ) -> Result<Vec<EngineItemOutput>, DomainError> {
        let outputs = self.engine.transcribe(inputs, options).await?;
        if outputs.len() != inputs.len() {
            return Err(DomainError::inference(format!(
                "engine returned {} results for {} inputs",
                outputs.len(),
                inputs.len()
            )));
        }
        Ok(outputs)
    }
}

fn options_for(batch: &Batch) -> TranscribeOptions {
    TranscribeOptions {
        attention_mode: batch.attention_mode,
        timestamps: batch.members.iter().any(|audio| audio.item.want_timestamps),
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), ApplicationError> {
    if cancel.is_cancelled() {
        return Err(ApplicationError::Cancelled);
    }
    Ok(())
}
