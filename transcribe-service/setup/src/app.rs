use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{anyhow, Error};
use axum::Router;
use transcribe_application::{
    EngineHandle, RequestContext, TranscribeBatchUseCase, TranscribeBatchUseCaseImpl,
};
use transcribe_configuration::AppConfig;
use transcribe_domain::{AudioNormalizerPort, DomainError, InferenceEnginePort};
use transcribe_http_server::{build_router, serve, AppState, HealthInfo};
use transcribe_infra_audio::{FfmpegAudioNormalizer, FfmpegNormalizerConfig};
use transcribe_infra_inference::{RemoteEngineConfig, RemoteInferenceEngine, StubInferenceEngine};

const CONNECT_ATTEMPTS: usize = 20;
const CONNECT_BACKOFF: Duration = Duration::from_millis(500);

pub async fn build_and_run(config: AppConfig) -> Result<(), Error> {
    let app = Application::new(config).await?;
    app.run().await
}

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

impl Application {
    /// Wires the process: the engine variant is chosen here, once, and shared
    /// by every request through a single exclusive handle.
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        let inference = &config.service.inference;
        let engine: Arc<dyn InferenceEnginePort> = if inference.skip_model_load {
            tracing::warn!("model loading skipped; transcripts are dry-run placeholders");
            Arc::new(StubInferenceEngine::new())
        } else {
            let remote = RemoteInferenceEngine::new(RemoteEngineConfig {
                endpoint: inference.endpoint.clone(),
                model: inference.model.clone(),
                request_timeout: Duration::from_secs(inference.timeout_sec),
            })?;
            connect_with_retry("inference", || remote.health_check()).await?;
            tracing::info!(
                endpoint = %inference.endpoint,
                model = %inference.model,
                "inference sidecar ready"
            );
            Arc::new(remote)
        };
        Self::with_engine(config, engine)
    }

    pub fn with_engine(
        config: AppConfig,
        engine: Arc<dyn InferenceEnginePort>,
    ) -> Result<Self, Error> {
        let audio = &config.service.audio;
        let normalizer: Arc<dyn AudioNormalizerPort> =
            Arc::new(FfmpegAudioNormalizer::new(FfmpegNormalizerConfig {
                ffmpeg_bin: audio.ffmpeg_bin.clone(),
                ffprobe_bin: audio.ffprobe_bin.clone(),
                sample_rate_hz: audio.sample_rate_hz,
                temp_dir: audio.temp_dir.clone(),
                download_timeout: Duration::from_secs(audio.download_timeout_sec),
            })?);
        Ok(Self::with_ports(config, normalizer, engine))
    }

    pub fn with_ports(
        config: AppConfig,
        normalizer: Arc<dyn AudioNormalizerPort>,
        engine: Arc<dyn InferenceEnginePort>,
    ) -> Self {
        let policy = config.to_policy();
        tracing::info!(
            engine = engine.name(),
            short_max_seconds = policy.short_max_seconds,
            batch_max_items = policy.batch_max_items,
            batch_max_total_seconds = policy.batch_max_total_seconds,
            local_attention_after_seconds = policy.local_attention_after_seconds,
            "initializing transcription application"
        );

        let health = HealthInfo {
            engine: engine.name().to_string(),
            model: config.service.inference.model.clone(),
        };
        let mut context = RequestContext::new(policy, Arc::new(EngineHandle::new(engine)))
            .with_normalize_concurrency(config.service.audio.normalize_concurrency);
        if let Some(timeout) = config.request_timeout() {
            context = context.with_request_timeout(timeout);
        }
        let usecase: Arc<dyn TranscribeBatchUseCase> =
            Arc::new(TranscribeBatchUseCaseImpl::new(normalizer, context));

        Self {
            config,
            state: AppState::new(usecase, health),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn run(self) -> Result<(), Error> {
        let server = &self.config.server;
        tracing::info!(
            host = %server.host,
            port = server.port,
            "starting transcription http server"
        );
        serve(self.router(), &server.host, server.port).await
    }
}

async fn connect_with_retry<F, Fut>(service: &str, mut connect_fn: F) -> Result<(), Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), DomainError>>,
{
    let mut last_error = None;
    for attempt in 1..=CONNECT_ATTEMPTS {
        match connect_fn().await {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::debug!(service, attempt, error = %err, "service not ready yet");
                last_error = Some(err);
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
        }
    }
    Err(anyhow!(
        "failed to connect to {service} service after retries: {}",
        last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "unknown connection error".to_string())
    ))
}
