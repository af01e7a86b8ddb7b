use async_trait::async_trait;

use crate::{DomainError, EngineInput, EngineItemOutput, InputItem, NormalizedAudio, TranscribeOptions};

#[async_trait]
pub trait AudioNormalizerPort: Send + Sync {
    /// Converts the item's source into a canonical mono waveform file and measures
    /// its duration. Fails with `DomainError::Fetch` or `DomainError::Decode`.
    async fn normalize(&self, item: InputItem) -> Result<NormalizedAudio, DomainError>;
}

#[async_trait]
pub trait InferenceEnginePort: Send + Sync {
    fn name(&self) -> &'static str;

    /// One inference call over `inputs`. On `Ok` the output holds exactly one entry
    /// per input, in input order. An `Err` is a failure of the whole call.
    async fn transcribe(
        &self,
        inputs: &[EngineInput],
        options: &TranscribeOptions,
    ) -> Result<Vec<EngineItemOutput>, DomainError>;
}
