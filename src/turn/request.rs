//! TURN control endpoint exchange

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{TurnCredentials, TurnError, TurnRequestParams, UrlRewriter};
use crate::config::HttpConfig;
use crate::utils::{DefaultModality, Modality};

/// Header carrying the session token
pub const AUTH_TOKEN_HEADER: &str = "X-Chime-Auth-Token";

/// Prefix of the session token header value
pub const AUTH_TOKEN_PREFIX: &str = "_aws_wt_session=";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnRequestBody<'a> {
    meeting_id: &'a str,
}

/// `ttl` arrives as a string from the service but numbers are accepted too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TtlValue {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct TurnResponseBody {
    username: String,
    password: String,
    ttl: TtlValue,
    uris: Vec<String>,
}

/// Performs renewal requests against the TURN control endpoint
#[derive(Clone)]
pub struct TurnCredentialsClient {
    client: Client,
    params: TurnRequestParams,
    url_rewriter: UrlRewriter,
    user_agent: String,
}

impl TurnCredentialsClient {
    pub fn new(
        params: TurnRequestParams,
        url_rewriter: UrlRewriter,
        http: &HttpConfig,
    ) -> Result<Self, TurnError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(http.timeout_ms))
            .connect_timeout(Duration::from_millis(http.connect_timeout_ms))
            .build()
            .map_err(|e| TurnError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            params,
            url_rewriter,
            user_agent: http.user_agent(),
        })
    }

    pub fn params(&self) -> &TurnRequestParams {
        &self.params
    }

    /// Fetch fresh credentials.
    ///
    /// Every failure (transport, status, body) is logged and reported as
    /// `None`; nothing propagates past this call.
    pub async fn request_credentials(&self) -> Option<TurnCredentials> {
        match self.try_request().await {
            Ok(credentials) => {
                info!(
                    "TURN credentials renewed for meeting {} ({} uris, ttl {}s)",
                    self.params.meeting_id,
                    credentials.uris.len(),
                    credentials.ttl
                );
                Some(credentials)
            }
            Err(e) => {
                warn!(
                    "TURN credential renewal failed for meeting {}: {}",
                    self.params.meeting_id, e
                );
                None
            }
        }
    }

    async fn try_request(&self) -> Result<TurnCredentials, TurnError> {
        let token = DefaultModality::new(self.params.join_token.as_str());

        debug!("Requesting TURN credentials from {}", self.params.control_url);

        let response = self
            .client
            .post(&self.params.control_url)
            .header(AUTH_TOKEN_HEADER, format!("{}{}", AUTH_TOKEN_PREFIX, token.base()))
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, self.user_agent.as_str())
            .json(&TurnRequestBody {
                meeting_id: &self.params.meeting_id,
            })
            .send()
            .await
            .map_err(|e| TurnError::Http(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TurnError::Status(status.as_u16()));
        }

        let body: TurnResponseBody = response
            .json()
            .await
            .map_err(|e| TurnError::InvalidResponse(e.to_string()))?;

        let ttl = match body.ttl {
            TtlValue::Number(ttl) => ttl,
            TtlValue::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| TurnError::InvalidResponse(format!("ttl is not a number: {:?}", text)))?,
        };

        let uris = body
            .uris
            .iter()
            .map(|uri| (self.url_rewriter)(uri))
            .collect();

        Ok(TurnCredentials {
            username: body.username,
            password: body.password,
            ttl,
            uris,
        })
    }
}
