use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use transcribe_application::ApplicationError;

#[derive(Debug)]
pub enum HttpError {
    Validation { message: String },
    Unavailable { message: String },
    Timeout { message: String },
    Internal { message: String },
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::Validation { message } => (StatusCode::UNPROCESSABLE_ENTITY, message),
            HttpError::Unavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
            HttpError::Timeout { message } => (StatusCode::GATEWAY_TIMEOUT, message),
            HttpError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (
            status,
            Json(json!({
                "error": message,
            })),
        )
            .into_response()
    }
}

pub fn error_mapper(error: ApplicationError) -> HttpError {
    match error {
        ApplicationError::Validation(_) => HttpError::Validation {
            message: error.to_string(),
        },
        ApplicationError::Cancelled => HttpError::Unavailable {
            message: error.to_string(),
        },
        ApplicationError::TimedOut(_) => HttpError::Timeout {
            message: error.to_string(),
        },
        ApplicationError::Domain(_) | ApplicationError::Internal(_) => HttpError::Internal {
            message: error.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn application_errors_map_to_statuses() {
        let cases = [
            (
                ApplicationError::Validation("bad".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ApplicationError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (
                ApplicationError::TimedOut(Duration::from_secs(1)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ApplicationError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error_mapper(error).into_response().status(), status);
        }
    }
}
