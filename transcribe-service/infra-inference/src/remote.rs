use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use transcribe_domain::{
    DomainError, EngineInput, EngineItemOutput, EngineTranscript, InferenceEnginePort, Timestamps,
    TranscribeOptions,
};

const SERVICE: &str = "inference";

#[derive(Debug, Clone)]
pub struct RemoteEngineConfig {
    pub endpoint: String,
    pub model: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct TranscribeRequestBody<'a> {
    model: &'a str,
    audio_paths: Vec<String>,
    attention: AttentionBody,
    timestamps: bool,
}

#[derive(Debug, Serialize)]
struct AttentionBody {
    self_attention_model: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_size: Option<[u32; 2]>,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponseBody {
    results: Vec<ResultBody>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    timestamps: Option<Timestamps>,
    #[serde(default)]
    error: Option<String>,
}

impl From<ResultBody> for EngineItemOutput {
    fn from(body: ResultBody) -> Self {
        match (body.error, body.text) {
            (Some(message), _) => EngineItemOutput::Failed { message },
            (None, Some(text)) => EngineItemOutput::Transcribed(EngineTranscript {
                text,
                timestamps: body.timestamps,
            }),
            (None, None) => EngineItemOutput::Failed {
                message: "engine returned neither text nor error".to_string(),
            },
        }
    }
}

/// Client for the model-serving sidecar that holds the loaded ASR model.
///
/// The sidecar reads the normalized files from the shared filesystem, so only
/// their paths travel over the wire.
pub struct RemoteInferenceEngine {
    config: RemoteEngineConfig,
    client: reqwest::Client,
}

impl RemoteInferenceEngine {
    pub fn new(config: RemoteEngineConfig) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                DomainError::external_service_error(SERVICE, &format!("client setup failed: {err}"))
            })?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.endpoint.trim_end_matches('/'))
    }

    /// Single readiness probe against `GET /health`.
    pub async fn health_check(&self) -> Result<(), DomainError> {
        self.client
            .get(self.url("/health"))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| {
                DomainError::external_service_error(SERVICE, &format!("health check failed: {err}"))
            })?;
        Ok(())
    }
}

#[async_trait]
impl InferenceEnginePort for RemoteInferenceEngine {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn transcribe(
        &self,
        inputs: &[EngineInput],
        options: &TranscribeOptions,
    ) -> Result<Vec<EngineItemOutput>, DomainError> {
        let body = TranscribeRequestBody {
            model: &self.config.model,
            audio_paths: inputs
                .iter()
                .map(|input| input.path.display().to_string())
                .collect(),
            attention: AttentionBody {
                self_attention_model: options.attention_mode.self_attention_model(),
                context_size: options.attention_mode.context_size(),
            },
            timestamps: options.timestamps,
        };

        let response = self
            .client
            .post(self.url("/transcribe"))
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                DomainError::external_service_error(SERVICE, &format!("request failed: {err}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(DomainError::external_service_error(
                SERVICE,
                &format!("status {status}: {}", detail.trim()),
            ));
        }

        let parsed: TranscribeResponseBody = response.json().await.map_err(|err| {
            DomainError::external_service_error(SERVICE, &format!("malformed response: {err}"))
        })?;
        tracing::debug!(
            input_count = inputs.len(),
            result_count = parsed.results.len(),
            "inference sidecar responded"
        );
        Ok(parsed.results.into_iter().map(EngineItemOutput::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use transcribe_domain::AttentionMode;

    use super::*;

    type Seen = Arc<Mutex<Vec<Value>>>;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock sidecar");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        addr
    }

    async fn echo(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
        seen.lock().expect("lock").push(body.clone());
        let results: Vec<Value> = body["audio_paths"]
            .as_array()
            .map(|paths| paths.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|path| {
                let path = path.as_str().unwrap_or_default();
                if path.ends_with("bad.wav") {
                    json!({"error": "no speech"})
                } else {
                    json!({
                        "text": format!("heard {path}"),
                        "timestamps": {
                            "word": [{"word": "heard", "start": 0.0, "end": 0.4, "start_offset": 0}],
                            "segment": [{"segment": "heard", "start": 0.0, "end": 0.4}]
                        }
                    })
                }
            })
            .collect();
        Json(json!({ "results": results }))
    }

    fn engine(addr: SocketAddr) -> RemoteInferenceEngine {
        RemoteInferenceEngine::new(RemoteEngineConfig {
            endpoint: format!("http://{addr}/"),
            model: "nvidia/parakeet-tdt-0.6b-v3".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .expect("client builds")
    }

    fn input(index: usize, path: &str) -> EngineInput {
        EngineInput {
            original_index: index,
            source: format!("source-{index}"),
            path: PathBuf::from(path),
            duration_seconds: 2.0,
        }
    }

    #[tokio::test]
    async fn sends_paths_and_attention_then_maps_results() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/transcribe", post(echo))
            .with_state(seen.clone());
        let addr = serve(router).await;

        let outputs = engine(addr)
            .transcribe(
                &[input(0, "/tmp/a.wav"), input(1, "/tmp/bad.wav")],
                &TranscribeOptions {
                    attention_mode: AttentionMode::Local,
                    timestamps: true,
                },
            )
            .await
            .expect("call succeeds");

        assert_eq!(outputs.len(), 2);
        match &outputs[0] {
            EngineItemOutput::Transcribed(transcript) => {
                assert_eq!(transcript.text, "heard /tmp/a.wav");
                let timestamps = transcript.timestamps.as_ref().expect("timestamps");
                assert_eq!(timestamps.word[0].word, "heard");
                assert_eq!(timestamps.segment[0].end, 0.4);
            }
            other => panic!("unexpected output {other:?}"),
        }
        assert_eq!(
            outputs[1],
            EngineItemOutput::Failed {
                message: "no speech".to_string()
            }
        );

        let body = seen.lock().expect("lock")[0].clone();
        assert_eq!(body["model"], "nvidia/parakeet-tdt-0.6b-v3");
        assert_eq!(body["attention"]["self_attention_model"], "rel_pos_local_attn");
        assert_eq!(body["attention"]["context_size"], json!([256, 256]));
        assert_eq!(body["timestamps"], true);
    }

    #[tokio::test]
    async fn global_attention_omits_context_size() {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route("/transcribe", post(echo))
            .with_state(seen.clone());
        let addr = serve(router).await;

        engine(addr)
            .transcribe(
                &[input(0, "/tmp/a.wav")],
                &TranscribeOptions {
                    attention_mode: AttentionMode::Global,
                    timestamps: false,
                },
            )
            .await
            .expect("call succeeds");

        let body = seen.lock().expect("lock")[0].clone();
        assert_eq!(body["attention"], json!({"self_attention_model": "rel_pos"}));
    }

    #[tokio::test]
    async fn server_error_fails_the_whole_call() {
        let router = Router::new().route(
            "/transcribe",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory") }),
        );
        let addr = serve(router).await;

        let error = engine(addr)
            .transcribe(
                &[input(0, "/tmp/a.wav")],
                &TranscribeOptions {
                    attention_mode: AttentionMode::Global,
                    timestamps: false,
                },
            )
            .await
            .expect_err("call fails");

        assert!(matches!(error, DomainError::ExternalService { .. }));
        assert!(error.to_string().contains("CUDA out of memory"));
    }

    #[tokio::test]
    async fn health_check_follows_sidecar_status() {
        let healthy = serve(Router::new().route("/health", get(|| async { "ok" }))).await;
        let unhealthy = serve(
            Router::new().route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE })),
        )
        .await;

        assert!(engine(healthy).health_check().await.is_ok());
        assert!(engine(unhealthy).health_check().await.is_err());
    }
}
