//! TURN credential renewal
//!
//! While a content share session is live the transport periodically asks for
//! fresh relay credentials. They are fetched from the meeting's TURN control
//! endpoint, authenticated with the (untagged) join token.

mod request;

use std::sync::Arc;
use thiserror::Error;

use crate::session::MeetingSessionConfiguration;

pub use request::{TurnCredentialsClient, AUTH_TOKEN_HEADER, AUTH_TOKEN_PREFIX};

/// Rewrites relay URIs before they reach the transport
pub type UrlRewriter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Rewriter that leaves URIs untouched
pub fn default_url_rewriter() -> UrlRewriter {
    Arc::new(|url: &str| url.to_string())
}

/// Errors from a single renewal exchange. Never escapes the renewal boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("TURN control endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid TURN response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Fixed inputs for renewal requests, set once per controller
#[derive(Clone, PartialEq, Eq)]
pub struct TurnRequestParams {
    pub control_url: String,
    pub signaling_url: String,
    pub join_token: String,
    pub meeting_id: String,
}

impl TurnRequestParams {
    pub fn from_configuration(configuration: &MeetingSessionConfiguration) -> Self {
        Self {
            control_url: configuration.urls.turn_control_url.clone(),
            signaling_url: configuration.urls.signaling_url.clone(),
            join_token: configuration.credentials.join_token.clone(),
            meeting_id: configuration.meeting_id.clone(),
        }
    }
}

impl std::fmt::Debug for TurnRequestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnRequestParams")
            .field("control_url", &self.control_url)
            .field("signaling_url", &self.signaling_url)
            .field("join_token", &"[REDACTED]")
            .field("meeting_id", &self.meeting_id)
            .finish()
    }
}

/// Relay credentials from one successful renewal
#[derive(Clone, PartialEq, Eq)]
pub struct TurnCredentials {
    pub username: String,
    pub password: String,
    /// Lifetime in seconds
    pub ttl: u64,
    pub uris: Vec<String>,
}

impl std::fmt::Debug for TurnCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .field("uris", &self.uris)
            .finish()
    }
}
