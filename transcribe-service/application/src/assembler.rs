use std::collections::BTreeMap;

use transcribe_domain::{EngineItemOutput, ItemError, ItemResult, NormalizedAudio};

use crate::ApplicationError;

/// Collects item results as they become final and restores arrival order.
///
/// Each recorded result releases the item's normalized audio, so the scratch
/// file lives exactly as long as the item is in flight.
pub struct ResultAssembler {
    expected: usize,
    results: BTreeMap<usize, ItemResult>,
}

impl ResultAssembler {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            results: BTreeMap::new(),
        }
    }

    pub fn record_output(&mut self, audio: NormalizedAudio, output: EngineItemOutput) {
        let index = audio.original_index();
        let duration = audio.duration_seconds;
        let result = match output {
            EngineItemOutput::Transcribed(transcript) => {
                ItemResult::success(index, duration, transcript, audio.item.want_timestamps)
            }
            EngineItemOutput::Failed { message } => {
                ItemResult::failure(index, duration, ItemError::inference(message))
            }
        };
        audio.release();
        self.insert(result);
    }

    pub fn record_inference_failure(&mut self, audio: NormalizedAudio, error: ItemError) {
        let result = ItemResult::failure(audio.original_index(), audio.duration_seconds, error);
        audio.release();
        self.insert(result);
    }

    /// Failure for an item that never produced normalized audio.
    pub fn record_failure(&mut self, original_index: usize, duration_seconds: f64, error: ItemError) {
        self.insert(ItemResult::failure(original_index, duration_seconds, error));
    }

    fn insert(&mut self, result: ItemResult) {
        let index = result.original_index;
        if index >= self.expected {
            tracing::error!(original_index = index, expected = self.expected, "result index out of range");
            return;
        }
        if self.results.contains_key(&index) {
            tracing::error!(original_index = index, "duplicate result for item, keeping the first");
            return;
        }
        self.results.insert(index, result);
    }

    /// Results ordered by arrival index. Every index below `expected` must be present.
    pub fn finish(self) -> Result<Vec<ItemResult>, ApplicationError> {
        if self.results.len() != self.expected {
            let missing: Vec<usize> = (0..self.expected)
                .filter(|index| !self.results.contains_key(index))
                .collect();
            return Err(ApplicationError::Internal(format!(
                "missing results for items {missing:?}"
            )));
        }
        Ok(self.results.into_values().collect())
    }
}
