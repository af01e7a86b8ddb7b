use std::sync::Arc;

use tokio::sync::Mutex;
use transcribe_domain::{
    DomainError, EngineInput, EngineItemOutput, InferenceEnginePort, TranscribeOptions,
};

/// Process-wide handle to the one loaded inference engine. At most one engine
/// call is in flight at any time, across all requests.
pub struct EngineHandle {
    engine: Arc<dyn InferenceEnginePort>,
    gate: Mutex<()>,
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn InferenceEnginePort>) -> Self {
        Self {
            engine,
            gate: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.engine.name()
    }

    pub async fn transcribe(
        &self,
        inputs: &[EngineInput],
        options: &TranscribeOptions,
    ) -> Result<Vec<EngineItemOutput>, DomainError> {
        let _guard = self.gate.lock().await;
        tracing::debug!(
            engine = self.engine.name(),
            input_count = inputs.len(),
            attention_mode = %options.attention_mode,
            timestamps = options.timestamps,
            "invoking inference engine"
        );
        self.engine.transcribe(inputs, options).await
    }
}
