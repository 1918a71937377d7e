//! Meeting session configuration supplied by the host application

use serde::{Deserialize, Serialize};

use crate::utils::{DefaultModality, MODALITY_CONTENT};

/// Attendee credentials for joining a meeting
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSessionCredentials {
    pub attendee_id: String,
    pub external_user_id: String,
    pub join_token: String,
}

impl std::fmt::Debug for MeetingSessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeetingSessionCredentials")
            .field("attendee_id", &self.attendee_id)
            .field("external_user_id", &self.external_user_id)
            .field("join_token", &"[REDACTED]")
            .finish()
    }
}

/// Service endpoints for a meeting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSessionUrls {
    #[serde(default)]
    pub audio_fallback_url: String,
    #[serde(default)]
    pub audio_host_url: String,
    pub turn_control_url: String,
    pub signaling_url: String,
}

/// Everything needed to join one meeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSessionConfiguration {
    pub meeting_id: String,
    pub credentials: MeetingSessionCredentials,
    pub urls: MeetingSessionUrls,
}

impl MeetingSessionConfiguration {
    pub fn new(
        meeting_id: impl Into<String>,
        credentials: MeetingSessionCredentials,
        urls: MeetingSessionUrls,
    ) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            credentials,
            urls,
        }
    }

    /// Derive the configuration the content share attendee joins with.
    ///
    /// Attendee id and join token get the `#content` modality appended;
    /// meeting id, external user id and URLs are kept as-is.
    pub fn content_share_configuration(&self) -> Self {
        Self {
            meeting_id: self.meeting_id.clone(),
            credentials: MeetingSessionCredentials {
                attendee_id: DefaultModality::tagged(
                    &self.credentials.attendee_id,
                    MODALITY_CONTENT,
                ),
                external_user_id: self.credentials.external_user_id.clone(),
                join_token: DefaultModality::tagged(
                    &self.credentials.join_token,
                    MODALITY_CONTENT,
                ),
            },
            urls: self.urls.clone(),
        }
    }
}
