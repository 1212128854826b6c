//! REST API client module for the MediBot backend.
//!
//! This module provides the `ApiClient` for the account, profile and
//! question/answer endpoints. Authenticated endpoints take the session
//! token as a bearer credential in the `Authorization` header.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, ErrorDetail};
