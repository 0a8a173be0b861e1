//! Error taxonomy shared by the HTTP collaborator and both controllers.

use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Every failure a controller can observe. Cloneable so it can be kept as
/// `last_error` and broadcast to event subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to decode {context} response: {message}")]
    Decode {
        context: &'static str,
        message: String,
    },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("server returned {status}: {message}")]
    Server {
        status: u16,
        code: ErrorCode,
        message: String,
    },
    #[error("a prediction request is already in flight")]
    Busy,
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn decode(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            context,
            message: err.to_string(),
        }
    }

    pub fn from_api_error(status: u16, api_error: ApiError) -> Self {
        Self::Server {
            status,
            code: api_error.code,
            message: api_error.message,
        }
    }

    /// Transport and server-side failures may succeed on retry; validation
    /// and configuration failures will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Busy => true,
            ClientError::Server { status, .. } => *status >= 500 || *status == 429,
            ClientError::Decode { .. } | ClientError::Validation(_) | ClientError::Config(_) => {
                false
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::decode("http", err)
        } else if err.is_builder() {
            ClientError::Config(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<shared::domain::UnknownVariant> for ClientError {
    fn from(err: shared::domain::UnknownVariant) -> Self {
        ClientError::Validation(err.to_string())
    }
}
