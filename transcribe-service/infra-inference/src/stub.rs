use async_trait::async_trait;
use transcribe_domain::{
    DomainError, EngineInput, EngineItemOutput, EngineTranscript, InferenceEnginePort,
    TranscribeOptions,
};

pub const DRY_RUN_PREFIX: &str = "[dry-run] Transcribed placeholder for";

/// Engine used when model loading is skipped. Output depends only on each
/// input's source, never on scheduling.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubInferenceEngine;

impl StubInferenceEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl InferenceEnginePort for StubInferenceEngine {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn transcribe(
        &self,
        inputs: &[EngineInput],
        options: &TranscribeOptions,
    ) -> Result<Vec<EngineItemOutput>, DomainError> {
        tracing::debug!(
            input_count = inputs.len(),
            attention_mode = %options.attention_mode,
            "dry-run transcription"
        );
        Ok(inputs
            .iter()
            .map(|input| {
                EngineItemOutput::Transcribed(EngineTranscript {
                    text: format!("{DRY_RUN_PREFIX} {}", input.source),
                    timestamps: None,
                })
            })
            .collect())
    }
}
