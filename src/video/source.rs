//! Frame producer collaborator
//!
//! Capture (screen projection, media files) happens outside this crate. A
//! source only has to push frames into whatever sinks the transport attaches.

use std::sync::Arc;

/// Hint for how the encoder should trade sharpness against motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoContentHint {
    #[default]
    None,
    Motion,
    Detail,
    /// Screen content with text
    Text,
}

/// A single captured frame. Pixel storage belongs to the producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub timestamp_ns: i64,
    pub rotation: u32,
}

/// Consumer of frames
pub trait VideoSink: Send + Sync {
    fn on_video_frame(&self, frame: &VideoFrame);
}

/// Producer of frames
pub trait VideoSource: Send + Sync {
    fn add_video_sink(&self, sink: Arc<dyn VideoSink>);

    fn remove_video_sink(&self, sink: &Arc<dyn VideoSink>);

    fn content_hint(&self) -> VideoContentHint {
        VideoContentHint::None
    }
}
