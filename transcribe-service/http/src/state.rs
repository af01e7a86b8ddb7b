use std::sync::Arc;

use serde::Serialize;
use transcribe_application::TranscribeBatchUseCase;

#[derive(Debug, Clone, Serialize)]
pub struct HealthInfo {
    pub engine: String,
    pub model: String,
}

#[derive(Clone)]
pub struct AppState {
    pub usecase: Arc<dyn TranscribeBatchUseCase>,
    pub health: HealthInfo,
}

impl AppState {
    pub fn new(usecase: Arc<dyn TranscribeBatchUseCase>, health: HealthInfo) -> Self {
        Self { usecase, health }
    }
}
