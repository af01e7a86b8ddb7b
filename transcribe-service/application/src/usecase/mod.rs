mod transcribe_batch;

pub use transcribe_batch::{TranscribeBatchUseCase, TranscribeBatchUseCaseImpl};
