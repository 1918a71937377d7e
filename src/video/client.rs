//! Transport (video client) collaborator
//!
//! The media engine that actually connects, encodes and sends is external.
//! This module only describes what the content share engine calls on it and
//! how the engine is called back.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::graphics::GraphicsContextHandle;
use super::source::VideoSource;
use super::ClientDetails;
use crate::turn::TurnCredentials;

pub const VIDEO_CLIENT_FLAG_ENABLE_USE_HW_DECODE_AND_RENDER: u32 = 1 << 6;
pub const VIDEO_CLIENT_FLAG_ENABLE_TWO_SIMULCAST_STREAMS: u32 = 1 << 12;
pub const VIDEO_CLIENT_FLAG_DISABLE_CAPTURER: u32 = 1 << 20;

/// Result code reported by `start_service` on success
pub const VIDEO_CLIENT_START_OK: i32 = 0;

/// TURN status passed along with a credential update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// Fresh credentials are attached
    FeatureOn,
    /// Renewal failed or the session is gone; no credentials attached
    CcpFailure,
}

/// Credential update handed to the transport after a renewal request
#[derive(Debug, Clone, PartialEq)]
pub struct TurnCredentialUpdate {
    pub credentials: Option<TurnCredentials>,
    pub signaling_url: Option<String>,
    pub status: TurnStatus,
}

impl TurnCredentialUpdate {
    pub fn available(credentials: TurnCredentials, signaling_url: String) -> Self {
        Self {
            credentials: Some(credentials),
            signaling_url: Some(signaling_url),
            status: TurnStatus::FeatureOn,
        }
    }

    pub fn failure() -> Self {
        Self {
            credentials: None,
            signaling_url: None,
            status: TurnStatus::CcpFailure,
        }
    }
}

/// Parameters for starting the transport session
#[derive(Clone, PartialEq, Eq)]
pub struct StartServiceParams {
    pub meeting_id: String,
    pub join_token: String,
    pub flags: u32,
    pub graphics_context: Option<GraphicsContextHandle>,
}

impl std::fmt::Debug for StartServiceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartServiceParams")
            .field("meeting_id", &self.meeting_id)
            .field("join_token", &"[REDACTED]")
            .field("flags", &format_args!("{:#x}", self.flags))
            .field("graphics_context", &self.graphics_context)
            .finish()
    }
}

/// Operations the content share engine performs on the transport
pub trait VideoClient: Send + Sync {
    fn set_receiving(&self, receiving: bool);

    fn set_sending(&self, sending: bool);

    fn set_external_video_source(
        &self,
        source: Arc<dyn VideoSource>,
        context: Option<GraphicsContextHandle>,
    );

    /// Begin connecting. Returns the transport's result code
    /// (`VIDEO_CLIENT_START_OK` when accepted).
    fn start_service(&self, params: &StartServiceParams) -> i32;

    fn stop_service(&self);

    fn destroy(&self);

    /// Whether the transport still has a live session
    fn is_active(&self) -> bool;

    fn update_turn_credentials(&self, update: TurnCredentialUpdate);
}

/// Builds transport instances
pub trait VideoClientFactory: Send + Sync {
    /// One-time native bring-up. Runs at most once per process.
    fn initialize_globals(&self, details: &ClientDetails);

    fn create_video_client(&self, delegate: VideoClientDelegate)
        -> anyhow::Result<Box<dyn VideoClient>>;
}

/// Asynchronous signals raised by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoClientEvent {
    Connecting,
    Connected { control_status: i32 },
    Failed { status: i32, control_status: i32 },
    Stopped,
    TurnCredentialsRequested,
}

/// Callback surface handed to the transport on creation.
///
/// Every callback is forwarded, tagged with the client it belongs to, to the
/// engine that owns the client. Callbacks may arrive on any thread.
#[derive(Debug, Clone)]
pub struct VideoClientDelegate {
    client_id: u64,
    events: mpsc::UnboundedSender<(u64, VideoClientEvent)>,
}

impl VideoClientDelegate {
    pub(crate) fn new(client_id: u64, events: mpsc::UnboundedSender<(u64, VideoClientEvent)>) -> Self {
        Self { client_id, events }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    pub fn is_connecting(&self) {
        self.forward(VideoClientEvent::Connecting);
    }

    pub fn did_connect(&self, control_status: i32) {
        self.forward(VideoClientEvent::Connected { control_status });
    }

    pub fn did_fail(&self, status: i32, control_status: i32) {
        self.forward(VideoClientEvent::Failed {
            status,
            control_status,
        });
    }

    pub fn did_stop(&self) {
        self.forward(VideoClientEvent::Stopped);
    }

    pub fn request_turn_creds(&self) {
        self.forward(VideoClientEvent::TurnCredentialsRequested);
    }

    /// No custom resolvers are supplied to the transport
    pub fn available_dns_servers(&self) -> Vec<String> {
        Vec::new()
    }

    fn forward(&self, event: VideoClientEvent) {
        trace!("video client {} callback: {:?}", self.client_id, event);
        if self.events.send((self.client_id, event)).is_err() {
            debug!(
                "Dropping {:?} from video client {}: engine has shut down",
                event, self.client_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_flags_are_distinct_bits() {
        let flags = VIDEO_CLIENT_FLAG_ENABLE_USE_HW_DECODE_AND_RENDER
            | VIDEO_CLIENT_FLAG_ENABLE_TWO_SIMULCAST_STREAMS
            | VIDEO_CLIENT_FLAG_DISABLE_CAPTURER;
        assert_eq!(flags, 0x0010_1040);
    }

    #[test]
    fn test_delegate_tags_events_with_client_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let delegate = VideoClientDelegate::new(7, tx);

        delegate.is_connecting();
        delegate.did_connect(0);
        delegate.did_fail(3, 12);
        delegate.request_turn_creds();
        delegate.did_stop();

        assert_eq!(rx.try_recv().unwrap(), (7, VideoClientEvent::Connecting));
        assert_eq!(
            rx.try_recv().unwrap(),
            (7, VideoClientEvent::Connected { control_status: 0 })
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            (
                7,
                VideoClientEvent::Failed {
                    status: 3,
                    control_status: 12
                }
            )
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            (7, VideoClientEvent::TurnCredentialsRequested)
        );
        assert_eq!(rx.try_recv().unwrap(), (7, VideoClientEvent::Stopped));
        assert!(delegate.available_dns_servers().is_empty());
    }

    #[test]
    fn test_delegate_survives_closed_engine() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let delegate = VideoClientDelegate::new(1, tx);
        delegate.did_stop();
    }

    #[test]
    fn test_failure_update_carries_nothing() {
        let update = TurnCredentialUpdate::failure();
        assert_eq!(update.status, TurnStatus::CcpFailure);
        assert!(update.credentials.is_none());
        assert!(update.signaling_url.is_none());
    }

    #[test]
    fn test_start_params_debug_redacts_token() {
        let params = StartServiceParams {
            meeting_id: "m".to_string(),
            join_token: "secret-token#content".to_string(),
            flags: VIDEO_CLIENT_FLAG_DISABLE_CAPTURER,
            graphics_context: None,
        };
        let debug_str = format!("{:?}", params);
        assert!(!debug_str.contains("secret-token"));
        assert!(debug_str.contains("0x100000"));
    }
}
