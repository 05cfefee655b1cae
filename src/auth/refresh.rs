use std::fmt::{Display, Formatter};
use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_REFRESH_ENDPOINT: &str = "/api/auth/refresh-token";
pub const DEFAULT_LOGIN_REDIRECT: &str = "/login";

/// Where and how to refresh an expired access token.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
    /// Path (joined to the client's base url) or absolute url of the refresh endpoint.
    pub refresh_endpoint: String,
    /// Where the user is sent when the session cannot be recovered.
    pub login_redirect: String,
    /// Upper bound on one refresh call. `None` waits as long as the server does.
    pub timeout: Option<Duration>,
}

impl RefreshConfig {
    pub fn new(refresh_endpoint: &str) -> Self {
        Self {
            refresh_endpoint: refresh_endpoint.to_string(),
            login_redirect: DEFAULT_LOGIN_REDIRECT.to_string(),
            timeout: None,
        }
    }

    pub fn login_redirect(mut self, location: &str) -> Self {
        self.login_redirect = location.to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_ENDPOINT)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    /// Present when the server rotates refresh tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Handed to the session-end callback when the session is torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub location: String,
}

/// Why an access token could not be refreshed. Shared by every request waiting on the same refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshError {
    MissingRefreshToken,
    Rejected { status: StatusCode, body: String },
    Malformed(String),
    Transport(String),
    Timeout(Duration),
    /// The refresh was dropped before it settled.
    Abandoned,
}

impl Display for RefreshError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshError::MissingRefreshToken => write!(f, "no refresh token stored"),
            RefreshError::Rejected { status, body } if body.is_empty() => write!(f, "refresh rejected with status {}", status),
            RefreshError::Rejected { status, body } => write!(f, "refresh rejected with status {}: {}", status, body),
            RefreshError::Malformed(e) => write!(f, "malformed refresh response: {}", e),
            RefreshError::Transport(e) => write!(f, "refresh request failed: {}", e),
            RefreshError::Timeout(d) => write!(f, "refresh timed out after {:?}", d),
            RefreshError::Abandoned => write!(f, "refresh was abandoned before it completed"),
        }
    }
}

impl std::error::Error for RefreshError {}
