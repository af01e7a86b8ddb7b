use serde::{Deserialize, Serialize};
use validator::Validate;

use transcribe_domain::{InputItem, ItemError, ItemResult, Timestamps};

pub const NO_INPUTS_MESSAGE: &str = "No inputs provided.";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SourceInput {
    #[validate(length(min = 1, max = 4096))]
    pub source: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TranscribeBatchRequest {
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    #[validate(nested)]
    pub inputs: Vec<SourceInput>,
}

impl TranscribeBatchRequest {
    pub fn into_items(self) -> Vec<InputItem> {
        let want_timestamps = self.timestamps;
        self.inputs
            .into_iter()
            .enumerate()
            .map(|(index, input)| InputItem::new(index, input.source, want_timestamps))
            .collect()
    }
}

/// Accepts both the serverless envelope `{"input": {...}}` and the bare request.
/// When `input` is present it must parse on its own; a malformed wrapper is an
/// error, never an empty bare request.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "EnvelopeFields")]
pub enum TranscribeBatchEnvelope {
    Wrapped { input: TranscribeBatchRequest },
    Bare(TranscribeBatchRequest),
}

#[derive(Deserialize)]
struct EnvelopeFields {
    #[serde(default)]
    input: Option<TranscribeBatchRequest>,
    #[serde(default)]
    timestamps: bool,
    #[serde(default)]
    inputs: Vec<SourceInput>,
}

impl From<EnvelopeFields> for TranscribeBatchEnvelope {
    fn from(fields: EnvelopeFields) -> Self {
        match fields.input {
            Some(input) => TranscribeBatchEnvelope::Wrapped { input },
            None => TranscribeBatchEnvelope::Bare(TranscribeBatchRequest {
                timestamps: fields.timestamps,
                inputs: fields.inputs,
            }),
        }
    }
}

impl TranscribeBatchEnvelope {
    pub fn into_request(self) -> TranscribeBatchRequest {
        match self {
            TranscribeBatchEnvelope::Wrapped { input } => input,
            TranscribeBatchEnvelope::Bare(request) => request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub duration_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

impl From<ItemResult> for TranscriptionResult {
    fn from(result: ItemResult) -> Self {
        Self {
            text: result.text,
            duration_sec: result.duration_seconds,
            timestamps: result.timestamps,
            error: result.error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscribeBatchResponse {
    pub results: Vec<TranscriptionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscribeBatchResponse {
    pub fn from_results(results: Vec<ItemResult>) -> Self {
        Self {
            results: results.into_iter().map(TranscriptionResult::from).collect(),
            error: None,
        }
    }

    pub fn no_inputs() -> Self {
        Self {
            results: Vec::new(),
            error: Some(NO_INPUTS_MESSAGE.to_string()),
        }
    }
}
