mod remote;
mod stub;

pub use remote::{RemoteEngineConfig, RemoteInferenceEngine};
pub use stub::{StubInferenceEngine, DRY_RUN_PREFIX};
