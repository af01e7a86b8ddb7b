use thiserror::Error;

use crate::{ErrorKind, ItemError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("fetch error: {message}")]
    Fetch { message: String },

    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("inference error: {message}")]
    Inference { message: String },

    #[error("{service} service error: {message}")]
    ExternalService { service: String, message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    pub fn external_service_error(service: &str, message: &str) -> Self {
        Self::ExternalService {
            service: service.to_string(),
            message: message.to_string(),
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }

    /// Item-scoped error for a failure raised while normalizing. Anything that is
    /// not a fetch problem means the audio could not be turned into a waveform.
    pub fn into_normalizer_item_error(self) -> ItemError {
        match self {
            DomainError::Fetch { message } => ItemError::new(ErrorKind::FetchError, message),
            DomainError::Decode { message } => ItemError::new(ErrorKind::DecodeError, message),
            other => ItemError::new(ErrorKind::DecodeError, other.to_string()),
        }
    }

    /// Item-scoped error for a failure raised by the inference engine.
    pub fn into_inference_item_error(self) -> ItemError {
        match self {
            DomainError::Inference { message } => ItemError::inference(message),
            other => ItemError::inference(other.to_string()),
        }
    }
}
