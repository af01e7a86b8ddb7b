use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use tokio_util::sync::CancellationToken;

use transcribe_application::{TranscribeBatchEnvelope, TranscribeBatchResponse};

use crate::error::{error_mapper, HttpError};
use crate::AppState;

/// Runs the request on its own task. If the client goes away the handler future
/// is dropped, which cancels the token; the task then stops at its next stage
/// boundary and releases its files.
pub async fn transcribe_batch(
    State(state): State<AppState>,
    body: Result<Json<TranscribeBatchEnvelope>, JsonRejection>,
) -> Result<(StatusCode, Json<TranscribeBatchResponse>), HttpError> {
    let Json(envelope) = body.map_err(|rejection| HttpError::Validation {
        message: rejection.body_text(),
    })?;
    let request = envelope.into_request();
    tracing::info!(
        input_count = request.inputs.len(),
        timestamps = request.timestamps,
        "received transcribe request"
    );

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let usecase = state.usecase.clone();
    let task = tokio::spawn(async move { usecase.transcribe(request, cancel).await });
    let outcome = task.await;
    guard.disarm();

    let outcome = outcome.map_err(|err| HttpError::Internal {
        message: format!("transcription task failed: {err}"),
    })?;

    match outcome {
        Ok(response) => {
            tracing::info!(
                result_count = response.results.len(),
                "transcribe request completed"
            );
            Ok((StatusCode::OK, Json(response)))
        }
        Err(error) => {
            tracing::error!(error = %error, "transcribe request failed");
            Err(error_mapper(error))
        }
    }
}
