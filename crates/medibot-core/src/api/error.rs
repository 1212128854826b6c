use std::fmt;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized ({status}): {detail}")]
    Unauthorized { status: u16, detail: ErrorDetail },

    #[error("Request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: ErrorDetail },

    #[error("Server error ({status}): {detail}")]
    ServerError { status: u16, detail: ErrorDetail },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// What the server said when it rejected a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    /// `message` (or `error`) field of a JSON error payload
    pub message: Option<String>,
    /// Raw response body, truncated
    pub body: String,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message {
            Some(ref message) => f.write_str(message),
            None => f.write_str(&self.body),
        }
    }
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: Option<String>,
    error: Option<String>,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Pull a display message out of a JSON error body.
    /// The backend uses `message` on most endpoints and `error` on register.
    pub(crate) fn extract_message(body: &str) -> Option<String> {
        let payload: ErrorPayload = serde_json::from_str(body).ok()?;
        payload
            .message
            .or(payload.error)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = ErrorDetail {
            message: Self::extract_message(body),
            body: Self::truncate_body(body),
        };
        let status = status.as_u16();
        match status {
            401 | 403 => ApiError::Unauthorized { status, detail },
            500..=599 => ApiError::ServerError { status, detail },
            _ => ApiError::Rejected { status, detail },
        }
    }

    /// The message the server supplied, if any
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { detail, .. }
            | ApiError::Rejected { detail, .. }
            | ApiError::ServerError { detail, .. } => detail.message.as_deref(),
            ApiError::NetworkError(_) | ApiError::InvalidResponse(_) => None,
        }
    }
}
