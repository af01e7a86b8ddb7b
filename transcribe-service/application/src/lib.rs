pub mod assembler;
pub mod context;
pub mod dto;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod usecase;

pub use assembler::ResultAssembler;
pub use context::RequestContext;
pub use dto::*;
pub use engine::EngineHandle;
pub use error::*;
pub use scheduler::ExecutionScheduler;
pub use usecase::{TranscribeBatchUseCase, TranscribeBatchUseCaseImpl};
