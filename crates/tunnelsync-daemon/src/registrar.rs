//! Remote control API client.
//!
//! Two calls per registration:
//! 1. `POST {api}/authentication_token` with the credentials, yielding a
//!    bearer token.
//! 2. `POST {api}/api/config/url` with `{"value": "<public url>/"}`.

use std::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SyncError;
use crate::settings::Credentials;

/// Bearer token for a single registration push. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("AuthToken(<empty>)")
        } else {
            f.write_str("AuthToken(<redacted>)")
        }
    }
}

/// How to treat a 200 authentication response without a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TokenPolicy {
    /// Use the (empty) token anyway and let the registration call decide.
    #[default]
    Lenient,
    /// Fail the cycle with [`SyncError::EmptyToken`].
    Strict,
}

/// How to treat the status of the registration response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResponsePolicy {
    /// Accept any status; the body is only logged.
    #[default]
    Lenient,
    /// Fail the cycle with [`SyncError::Registration`] on non-2xx.
    Strict,
}

/// The remote side of a registration.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Exchange credentials for a bearer token.
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthToken, SyncError>;

    /// Push the public URL. Returns the response body.
    async fn register_url(&self, token: &AuthToken, public_url: &str)
    -> Result<String, SyncError>;
}

#[derive(Serialize)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: String,
}

#[derive(Serialize)]
struct UrlUpdate {
    value: String,
}

/// Value sent to the remote API for a public URL.
pub(crate) fn registration_value(public_url: &str) -> String {
    format!("{public_url}/")
}

/// Interpret an authentication response.
pub(crate) fn parse_auth_response(
    status: StatusCode,
    body: &str,
    policy: TokenPolicy,
) -> Result<AuthToken, SyncError> {
    if status != StatusCode::OK {
        return Err(SyncError::Auth {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    let token = serde_json::from_str::<AuthResponse>(body)
        .map(|r| r.token)
        .unwrap_or_default();
    if token.is_empty() {
        match policy {
            TokenPolicy::Strict => return Err(SyncError::EmptyToken),
            TokenPolicy::Lenient => warn!("Authentication response carried no token"),
        }
    }
    Ok(AuthToken(token))
}

/// Interpret a registration response.
pub(crate) fn check_registration(
    status: StatusCode,
    body: String,
    policy: ResponsePolicy,
) -> Result<String, SyncError> {
    if !status.is_success() {
        if policy == ResponsePolicy::Strict {
            return Err(SyncError::Registration {
                status: status.as_u16(),
                body,
            });
        }
        warn!(status = status.as_u16(), "Registration returned non-success status");
    }
    Ok(body)
}

/// [`Registrar`] talking JSON over HTTP to the remote API.
#[derive(Debug, Clone)]
pub struct ApiRegistrar {
    http: reqwest::Client,
    base_url: String,
    token_policy: TokenPolicy,
    response_policy: ResponsePolicy,
}

impl ApiRegistrar {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_policy: TokenPolicy::default(),
            response_policy: ResponsePolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_token_policy(mut self, policy: TokenPolicy) -> Self {
        self.token_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_response_policy(mut self, policy: ResponsePolicy) -> Self {
        self.response_policy = policy;
        self
    }

    /// Build the full URL for an API path.
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Registrar for ApiRegistrar {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthToken, SyncError> {
        let resp = self
            .http
            .post(self.api_url("/authentication_token"))
            .json(&AuthRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        let token = parse_auth_response(status, &body, self.token_policy)?;
        info!(username = %credentials.username, "Obtained API token");
        Ok(token)
    }

    async fn register_url(
        &self,
        token: &AuthToken,
        public_url: &str,
    ) -> Result<String, SyncError> {
        let resp = self
            .http
            .post(self.api_url("/api/config/url"))
            .bearer_auth(token.as_str())
            .json(&UrlUpdate {
                value: registration_value(public_url),
            })
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        info!(status = status.as_u16(), response = %body, "Registration response");
        check_registration(status, body, self.response_policy)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registrar(base: &str) -> ApiRegistrar {
        ApiRegistrar::new(crate::http::build_client(None).unwrap(), base)
    }

    #[test]
    fn api_url_constructed_correctly() {
        let r = registrar("https://api.example.com");
        assert_eq!(
            r.api_url("/authentication_token"),
            "https://api.example.com/authentication_token"
        );
        assert_eq!(
            r.api_url("/api/config/url"),
            "https://api.example.com/api/config/url"
        );
    }

    #[test]
    fn trailing_slash_stripped_from_base_url() {
        let r = registrar("https://api.example.com/");
        assert!(!r.api_url("/api/config/url").contains("//api"));
    }

    #[test]
    fn registration_value_appends_slash() {
        assert_eq!(
            registration_value("https://abc.ngrok.io"),
            "https://abc.ngrok.io/"
        );
    }

    #[test]
    fn auth_ok_extracts_token() {
        let token =
            parse_auth_response(StatusCode::OK, r#"{"token":"jwt.abc"}"#, TokenPolicy::Strict)
                .unwrap();
        assert_eq!(token.as_str(), "jwt.abc");
    }

    #[test]
    fn auth_non_200_carries_body() {
        let err = parse_auth_response(
            StatusCode::UNAUTHORIZED,
            r#"{"code":401,"message":"Invalid credentials."}"#,
            TokenPolicy::Lenient,
        )
        .unwrap_err();
        match err {
            SyncError::Auth { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Invalid credentials"));
            }
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[test]
    fn auth_201_is_still_a_failure() {
        let err = parse_auth_response(StatusCode::CREATED, r#"{"token":"t"}"#, TokenPolicy::Lenient)
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth { status: 201, .. }));
    }

    #[test]
    fn missing_token_lenient_yields_empty_token() {
        let token = parse_auth_response(StatusCode::OK, "{}", TokenPolicy::Lenient).unwrap();
        assert!(token.is_empty());
    }

    #[test]
    fn missing_token_strict_is_error() {
        let err = parse_auth_response(StatusCode::OK, "not json", TokenPolicy::Strict).unwrap_err();
        assert!(matches!(err, SyncError::EmptyToken));
    }

    #[test]
    fn registration_lenient_accepts_any_status() {
        let body = check_registration(
            StatusCode::INTERNAL_SERVER_ERROR,
            "boom".into(),
            ResponsePolicy::Lenient,
        )
        .unwrap();
        assert_eq!(body, "boom");
    }

    #[test]
    fn registration_strict_rejects_failure_status() {
        let err = check_registration(StatusCode::FORBIDDEN, "nope".into(), ResponsePolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, SyncError::Registration { status: 403, .. }));
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = AuthToken::new("secret-jwt");
        assert!(!format!("{token:?}").contains("secret-jwt"));
    }
}
