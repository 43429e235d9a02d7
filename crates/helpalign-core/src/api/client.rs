//! API client for communicating with the HelpAlign REST API.
//!
//! This module provides the `ApiClient` struct for requesting bearer tokens,
//! validating them against the "who am I" endpoints, and logging out.

use std::time::Duration;

use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{ActorProfile, Role, TokenResponse};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// How login credentials are put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginEncoding {
    /// `{"username": .., "password": ..}` as a JSON body
    #[default]
    Json,
    /// `username=..&password=..` URL-encoded, as OAuth2 password-flow
    /// token endpoints expect
    Form,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// API client for the HelpAlign backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    login_encoding: LoginEncoding,
}

impl ApiClient {
    /// Create a new API client with the default request timeout
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            login_encoding: LoginEncoding::default(),
        })
    }

    pub fn with_login_encoding(mut self, encoding: LoginEncoding) -> Self {
        self.login_encoding = encoding;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange a username and password for a bearer token
    pub async fn request_token(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> Result<TokenResponse, ApiError> {
        let url = self.url(role.token_path());
        let credentials = LoginRequest { username, password };

        let request = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json");
        let request = match self.login_encoding {
            LoginEncoding::Json => request.json(&credentials),
            LoginEncoding::Form => request.form(&credentials),
        };

        debug!(%role, encoding = ?self.login_encoding, "Requesting token");
        let response = request.send().await?;
        let response = Self::check_response(response).await?;

        Self::parse_json(response).await
    }

    /// Fetch the profile of whoever `token` belongs to.
    ///
    /// Any status other than 200 comes back as the matching `ApiError`;
    /// rate-limited requests are retried with exponential backoff first.
    pub async fn fetch_profile(&self, role: Role, token: &str) -> Result<ActorProfile, ApiError> {
        let url = self.url(role.me_path());
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .post(&url)
                .header(header::ACCEPT, "application/json")
                .bearer_auth(token)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Self::parse_json(response).await,
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    /// Revoke `token` on the backend
    pub async fn logout(&self, role: Role, token: &str) -> Result<(), ApiError> {
        let url = self.url(role.logout_path());

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .query(&[("token", token)])
            .send()
            .await?;

        Self::check_response(response).await?;
        Ok(())
    }

    /// Only a 200 counts as success; other 2xx statuses are unexpected.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status() == reqwest::StatusCode::OK {
            Ok(Some(response))
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is a 200, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status() == reqwest::StatusCode::OK {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Read the body and decode it, keeping decode failures apart from
    /// transport failures.
    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// Error body shape used by the backend (`{"detail": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorDetail {
    detail: String,
}

/// Pull the human-readable reason out of an error body, if it has one.
pub fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorDetail>(body).ok().map(|d| d.detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://localhost:8000/").expect("Failed to build client");
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(
            client.url(Role::Patient.me_path()),
            "http://localhost:8000/api/patient/me"
        );
    }

    #[test]
    fn test_login_encoding_serde() {
        let enc: LoginEncoding = serde_json::from_str("\"form\"").expect("Failed to parse encoding");
        assert_eq!(enc, LoginEncoding::Form);
        assert_eq!(LoginEncoding::default(), LoginEncoding::Json);
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"detail":"Incorrect username or password"}"#).as_deref(),
            Some("Incorrect username or password")
        );
        assert_eq!(error_detail("Internal Server Error"), None);
    }
}
