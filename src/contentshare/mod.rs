//! Content share: sending a screen or media stream into a meeting as a
//! separate `#content` attendee.
//!
//! The public surface is [`ContentShareController`]. Outcomes are reported
//! only through [`ContentShareObserver`] callbacks, which always run on the
//! controller's notification thread.

mod controller;
mod observers;

use std::sync::Arc;
use thiserror::Error;

use crate::video::VideoSource;

pub use controller::{
    ContentShareController, ContentShareDependencies, ContentShareEngine, ContentShareState,
};
pub use observers::{NotificationDispatcher, ObserverRegistry};

/// Why a content share event occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentShareStatusCode {
    /// Everything is OK so far
    OK,
    /// The content share connection is in an unrecoverable failed state
    VideoServiceFailed,
}

impl ContentShareStatusCode {
    pub fn is_failed(self) -> bool {
        self != ContentShareStatusCode::OK
    }

    pub fn is_terminal(self) -> bool {
        self == ContentShareStatusCode::VideoServiceFailed
    }
}

/// Status delivered with a stopped notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentShareStatus {
    pub status_code: ContentShareStatusCode,
}

impl ContentShareStatus {
    pub fn new(status_code: ContentShareStatusCode) -> Self {
        Self { status_code }
    }

    pub fn ok() -> Self {
        Self::new(ContentShareStatusCode::OK)
    }

    pub fn video_service_failed() -> Self {
        Self::new(ContentShareStatusCode::VideoServiceFailed)
    }
}

/// Receives content share lifecycle events.
///
/// Both callbacks run on the notification thread, never on the caller's
/// or the transport's thread. A panic in one observer does not keep the
/// event from the others.
pub trait ContentShareObserver: Send + Sync {
    fn on_content_share_started(&self);

    /// The content is no longer shared. If the source is no longer needed,
    /// stop it here.
    fn on_content_share_stopped(&self, status: ContentShareStatus);
}

/// What to share. Only sources with a video capability can be shared.
#[derive(Clone, Default)]
pub struct ContentShareSource {
    pub video_source: Option<Arc<dyn VideoSource>>,
}

impl ContentShareSource {
    pub fn from_video_source(video_source: Arc<dyn VideoSource>) -> Self {
        Self {
            video_source: Some(video_source),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_video(&self) -> bool {
        self.video_source.is_some()
    }
}

impl std::fmt::Debug for ContentShareSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentShareSource")
            .field("has_video", &self.has_video())
            .finish()
    }
}

/// Failures while bringing a share up. Reported to observers as
/// `VideoServiceFailed`, never returned to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentShareError {
    #[error("Failed to acquire graphics context: {0}")]
    GraphicsContext(String),

    #[error("Failed to create video client: {0}")]
    ClientCreation(String),

    #[error("Video client rejected start with result {0}")]
    StartRejected(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_classification() {
        assert!(!ContentShareStatusCode::OK.is_failed());
        assert!(!ContentShareStatusCode::OK.is_terminal());
        assert!(ContentShareStatusCode::VideoServiceFailed.is_failed());
        assert!(ContentShareStatusCode::VideoServiceFailed.is_terminal());
    }

    #[test]
    fn test_status_constructors() {
        assert_eq!(ContentShareStatus::ok().status_code, ContentShareStatusCode::OK);
        assert_eq!(
            ContentShareStatus::video_service_failed().status_code,
            ContentShareStatusCode::VideoServiceFailed
        );
    }

    #[test]
    fn test_empty_source_has_no_video() {
        let source = ContentShareSource::empty();
        assert!(!source.has_video());
        assert_eq!(format!("{:?}", source), "ContentShareSource { has_video: false }");
    }
}
