mod transcribe_batch;

pub use transcribe_batch::{
    SourceInput, TranscribeBatchEnvelope, TranscribeBatchRequest, TranscribeBatchResponse,
    TranscriptionResult, NO_INPUTS_MESSAGE,
};
