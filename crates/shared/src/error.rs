use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    RateLimited,
    Internal,
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => ErrorCode::NotFound,
            400 | 422 => ErrorCode::Validation,
            429 => ErrorCode::RateLimited,
            500..=599 => ErrorCode::Internal,
            _ => ErrorCode::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Decodes an error body from the patient service.
    ///
    /// Accepts `{code, message}`, FastAPI's `{detail: "..."}` and its
    /// validation form `{detail: [{msg, ...}]}`; anything else becomes the
    /// trimmed body text.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        if let Ok(api_error) = serde_json::from_str::<ApiError>(body) {
            return api_error;
        }

        let code = ErrorCode::from_status(status);
        let message = match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => match fields.get("detail") {
                Some(Value::String(detail)) => detail.clone(),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => body.trim().to_string(),
            },
            _ => body.trim().to_string(),
        };

        let message = if message.is_empty() {
            format!("HTTP {status}")
        } else {
            message
        };
        Self { code, message }
    }
}
