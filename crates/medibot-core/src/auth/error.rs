use serde::Serialize;
use thiserror::Error;

use crate::api::ApiError;

/// Why a session operation did not succeed.
///
/// The `Display` text of every variant is meant for direct display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Input rejected before any request was sent
    #[error("{0}")]
    Validation(String),

    /// Credentials or token refused by the server
    #[error("{0}")]
    Unauthorized(String),

    /// Server answered but refused the request
    #[error("{0}")]
    Rejected(String),

    /// Server failed or sent something unreadable
    #[error("{0}")]
    Server(String),

    /// No response from the server
    #[error("{0}")]
    Transport(String),

    #[error("Could not save your session: {0}")]
    Storage(String),

    #[error("Please sign in first")]
    NotAuthenticated,

    /// A logout was issued while this request was in flight
    #[error("You were signed out before the request finished")]
    Superseded,
}

impl SessionError {
    /// Classify an API failure, using the server's message when it sent one
    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        let message = err.server_message().unwrap_or(fallback).to_string();
        match err {
            ApiError::Unauthorized { .. } => SessionError::Unauthorized(message),
            ApiError::Rejected { .. } => SessionError::Rejected(message),
            ApiError::ServerError { .. } | ApiError::InvalidResponse(_) => {
                SessionError::Server(message)
            }
            ApiError::NetworkError(_) => SessionError::Transport(fallback.to_string()),
        }
    }

    pub fn storage(err: anyhow::Error) -> Self {
        SessionError::Storage(format!("{:#}", err))
    }
}

/// Uniform result for display: success flag plus an optional message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl<T> From<Result<T, SessionError>> for Outcome {
    fn from(result: Result<T, SessionError>) -> Self {
        match result {
            Ok(_) => Outcome::ok(),
            Err(e) => Outcome::failed(e.to_string()),
        }
    }
}
