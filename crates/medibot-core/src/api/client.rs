//! API client for the MediBot backend.
//!
//! Each method issues exactly one request. Nothing is retried: failures are
//! classified into `ApiError` and handed back to the caller.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::models::{
    AskRequest, AskResponse, AuthResponse, LoginRequest, Profile, ProfileResponse,
    RegisterRequest, UpdateResponse,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds, used when no configuration is supplied.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const LOGIN_PATH: &str = "/login";
const REGISTER_PATH: &str = "/register";
const LOGOUT_PATH: &str = "/logout";
const PROFILE_GET_PATH: &str = "/profile/get";
const PROFILE_UPDATE_PATH: &str = "/profile/update";
const ASK_PATH: &str = "/ask";

/// API client for the MediBot backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client for `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            config.api_base_url(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Account =====

    /// Exchange email and password for a session token
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = LoginRequest { email, password };
        self.post(LOGIN_PATH, None, &body).await
    }

    /// Create an account; a successful response signs the user in
    pub async fn register(&self, request: &RegisterRequest<'_>) -> Result<AuthResponse, ApiError> {
        self.post(REGISTER_PATH, None, request).await
    }

    /// Tell the backend the token is no longer in use
    pub async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .bearer_auth(token)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }

    // ===== Profile =====

    pub async fn fetch_profile(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        let request = self.client.get(self.url(PROFILE_GET_PATH)).bearer_auth(token);
        self.send_json(PROFILE_GET_PATH, request).await
    }

    /// Send the given fields as a (possibly partial) profile update
    pub async fn update_profile(
        &self,
        token: &str,
        profile: &Profile,
    ) -> Result<UpdateResponse, ApiError> {
        self.post(PROFILE_UPDATE_PATH, Some(token), profile).await
    }

    // ===== Chat =====

    pub async fn ask(&self, request: &AskRequest<'_>) -> Result<AskResponse, ApiError> {
        self.post(ASK_PATH, None, request).await
    }

    // ===== Helpers =====

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ApiError> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.send_json(path, request).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let response = Self::check_response(response).await?;

        let text = response.text().await?;
        debug!(path, bytes = text.len(), "Response received");

        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Request rejected");
            Err(ApiError::from_status(status, &body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:5000/", Duration::from_secs(1))
            .expect("client builds");
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(client.url(LOGIN_PATH), "http://localhost:5000/login");
    }

    #[test]
    fn test_from_config_uses_base_url() {
        let config = Config {
            api_base_url: "https://api.example.test/v1/".to_string(),
            ..Config::default()
        };
        let client = ApiClient::from_config(&config).expect("client builds");
        assert_eq!(client.url(ASK_PATH), "https://api.example.test/v1/ask");
    }
}
