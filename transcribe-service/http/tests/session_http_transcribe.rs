use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use transcribe_application::{
    ApplicationError, EngineHandle, RequestContext, TranscribeBatchRequest,
    TranscribeBatchResponse, TranscribeBatchUseCase, TranscribeBatchUseCaseImpl,
};
use transcribe_domain::{
    AudioNormalizerPort, DomainError, InputItem, NormalizedAudio, SchedulingPolicy, TempAudioFile,
};
use transcribe_http_server::{build_router, AppState, HealthInfo};
use transcribe_infra_inference::StubInferenceEngine;

/// Every source lasts as many seconds as the number after its last `-`, or ten
/// seconds; sources starting with `missing` fail to fetch.
struct FixedNormalizer;

#[async_trait]
impl AudioNormalizerPort for FixedNormalizer {
    async fn normalize(&self, item: InputItem) -> Result<NormalizedAudio, DomainError> {
        if item.source.starts_with("missing") {
            return Err(DomainError::fetch("404 Not Found"));
        }
        let duration = item
            .source
            .rsplit('-')
            .next()
            .and_then(|tail| tail.parse::<f64>().ok())
            .unwrap_or(10.0);
        let file = tempfile::NamedTempFile::new()
            .map_err(|err| DomainError::internal_error(&err.to_string()))?;
        Ok(NormalizedAudio::new(
            item,
            TempAudioFile::new(file.into_temp_path()),
            duration,
            16_000,
        ))
    }
}

struct FailingUseCase(fn() -> ApplicationError);

#[async_trait]
impl TranscribeBatchUseCase for FailingUseCase {
    async fn transcribe(
        &self,
        _request: TranscribeBatchRequest,
        _cancel: CancellationToken,
    ) -> Result<TranscribeBatchResponse, ApplicationError> {
        Err((self.0)())
    }
}

fn health() -> HealthInfo {
    HealthInfo {
        engine: "stub".to_string(),
        model: "nvidia/parakeet-tdt-0.6b-v3".to_string(),
    }
}

fn stub_router() -> Router {
    let engine = Arc::new(EngineHandle::new(Arc::new(StubInferenceEngine::new())));
    let usecase = TranscribeBatchUseCaseImpl::new(
        Arc::new(FixedNormalizer),
        RequestContext::new(SchedulingPolicy::default(), engine),
    );
    build_router(AppState::new(Arc::new(usecase), health()))
}

async fn post_json(router: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/transcribe")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds");
    let response = router.oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn wrapped_request_returns_results_in_input_order() {
    let (status, body) = post_json(
        stub_router(),
        json!({"input": {"timestamps": false, "inputs": [
            {"source": "a-5"}, {"source": "b-8"}, {"source": "c-700"}, {"source": "d-3"}
        ]}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"results": [
            {"text": "[dry-run] Transcribed placeholder for a-5", "duration_sec": 5.0},
            {"text": "[dry-run] Transcribed placeholder for b-8", "duration_sec": 8.0},
            {"text": "[dry-run] Transcribed placeholder for c-700", "duration_sec": 700.0},
            {"text": "[dry-run] Transcribed placeholder for d-3", "duration_sec": 3.0}
        ]})
    );
}

#[tokio::test]
async fn bare_request_reports_item_errors_inline() {
    let (status, body) = post_json(
        stub_router(),
        json!({"inputs": [{"source": "a-5"}, {"source": "missing.wav"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["results"][1],
        json!({"duration_sec": 0.0, "error": "FetchError: 404 Not Found"})
    );
    assert_eq!(
        body["results"][0]["text"],
        "[dry-run] Transcribed placeholder for a-5"
    );
}

#[tokio::test]
async fn empty_inputs_return_message_not_failure() {
    let (status, body) = post_json(stub_router(), json!({"input": {"inputs": []}})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"results": [], "error": "No inputs provided."}));
}

#[tokio::test]
async fn dry_run_responses_are_identical_across_runs() {
    let payload = json!({"timestamps": true, "inputs": [
        {"source": "a-5"}, {"source": "missing-1"}, {"source": "long-900"}
    ]});
    let first = post_json(stub_router(), payload.clone()).await;
    let second = post_json(stub_router(), payload).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn malformed_body_is_unprocessable() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/transcribe")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request builds");
    let response = stub_router().oneshot(request).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn malformed_wrapped_inputs_are_unprocessable() {
    for payload in [
        json!({"input": {"inputs": [{"src": "a.wav"}]}}),
        json!({"input": {"inputs": [{"source": "a.wav"}], "timestamps": "yes"}}),
    ] {
        let (status, body) = post_json(stub_router(), payload).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_ne!(body["error"], "No inputs provided.");
    }
}

#[tokio::test]
async fn timeout_maps_to_gateway_timeout() {
    let router = build_router(AppState::new(
        Arc::new(FailingUseCase(|| {
            ApplicationError::TimedOut(Duration::from_secs(1))
        })),
        health(),
    ));
    let (status, body) = post_json(router, json!({"inputs": [{"source": "a"}]})).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].as_str().is_some_and(|m| m.contains("timed out")));
}

#[tokio::test]
async fn health_reports_engine_and_model() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request builds");
    let response = stub_router().oneshot(request).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    assert_eq!(
        body,
        json!({"status": "ok", "engine": "stub", "model": "nvidia/parakeet-tdt-0.6b-v3"})
    );
}
