use std::sync::Arc;
use std::time::Duration;

use transcribe_domain::SchedulingPolicy;

use crate::EngineHandle;

/// Everything a request needs from the process: thresholds, the shared engine
/// and the limits applied to one request.
#[derive(Clone)]
pub struct RequestContext {
    pub policy: SchedulingPolicy,
    pub engine: Arc<EngineHandle>,
    pub normalize_concurrency: usize,
    pub request_timeout: Option<Duration>,
}

impl RequestContext {
    pub fn new(policy: SchedulingPolicy, engine: Arc<EngineHandle>) -> Self {
        Self {
            policy,
            engine,
            normalize_concurrency: 4,
            request_timeout: None,
        }
    }

    pub fn with_normalize_concurrency(mut self, concurrency: usize) -> Self {
        self.normalize_concurrency = concurrency.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}
