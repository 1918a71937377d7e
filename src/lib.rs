//! Content share for real-time meetings.
//!
//! A host joins a meeting as usual and, to present a screen or media stream,
//! hands a [`ContentShareSource`] to a [`ContentShareController`]. The
//! controller brings up a second, send-only transport session under the
//! attendee's `#content` identity and keeps its relay (TURN) credentials
//! fresh while it is live.
//!
//! The media transport, frame capture and rendering context are supplied by
//! the host through the traits in [`video`].

pub mod config;
pub mod contentshare;
pub mod logging;
pub mod session;
pub mod turn;
pub mod utils;
pub mod video;

pub use config::Config;
pub use contentshare::{
    ContentShareController, ContentShareDependencies, ContentShareObserver, ContentShareSource,
    ContentShareState, ContentShareStatus, ContentShareStatusCode,
};
pub use session::{MeetingSessionConfiguration, MeetingSessionCredentials, MeetingSessionUrls};
