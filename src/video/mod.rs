//! External media collaborators
//!
//! Interfaces for the pieces this crate drives but does not implement:
//! - the transport ("video client") and its factory
//! - frame sources and sinks
//! - the shared rendering context
//!
//! Plus the process-wide latch that guards native bring-up.

mod client;
mod graphics;
mod source;

use std::sync::Once;
use tracing::info;

pub use client::{
    StartServiceParams, TurnCredentialUpdate, TurnStatus, VideoClient, VideoClientDelegate,
    VideoClientEvent, VideoClientFactory, VIDEO_CLIENT_FLAG_DISABLE_CAPTURER,
    VIDEO_CLIENT_FLAG_ENABLE_TWO_SIMULCAST_STREAMS,
    VIDEO_CLIENT_FLAG_ENABLE_USE_HW_DECODE_AND_RENDER, VIDEO_CLIENT_START_OK,
};
pub use graphics::{GraphicsContext, GraphicsContextFactory, GraphicsContextHandle};
pub use source::{VideoContentHint, VideoFrame, VideoSink, VideoSource};

/// Client source reported to the media service
pub const CLIENT_SOURCE: &str = "amazon-chime-sdk";

/// Device and SDK details reported once at native bring-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDetails {
    pub platform: String,
    pub architecture: String,
    pub client_source: String,
    pub sdk_version: String,
}

impl ClientDetails {
    /// Details for the running process
    pub fn current() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            client_source: CLIENT_SOURCE.to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One-shot latch around an initialization routine
pub struct GlobalsLatch {
    once: Once,
}

impl GlobalsLatch {
    pub const fn new() -> Self {
        Self { once: Once::new() }
    }

    /// Run `init` if no caller has yet. Returns true for the caller that ran it.
    pub fn initialize(&self, init: impl FnOnce()) -> bool {
        let mut ran_here = false;
        self.once.call_once(|| {
            init();
            ran_here = true;
        });
        ran_here
    }

    pub fn is_initialized(&self) -> bool {
        self.once.is_completed()
    }
}

impl Default for GlobalsLatch {
    fn default() -> Self {
        Self::new()
    }
}

static VIDEO_CLIENT_GLOBALS: GlobalsLatch = GlobalsLatch::new();

/// Native transport bring-up, once per process regardless of how many
/// controllers exist.
pub(crate) fn ensure_globals_initialized(factory: &dyn VideoClientFactory) {
    VIDEO_CLIENT_GLOBALS.initialize(|| {
        let details = ClientDetails::current();
        info!(
            "Initializing video client globals (platform={}, sdk={})",
            details.platform, details.sdk_version
        );
        factory.initialize_globals(&details);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_latch_runs_once() {
        let latch = GlobalsLatch::new();
        let count = AtomicUsize::new(0);

        assert!(!latch.is_initialized());
        assert!(latch.initialize(|| {
            count.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!latch.initialize(|| {
            count.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(latch.is_initialized());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_latch_runs_once_across_threads() {
        let latch = Arc::new(GlobalsLatch::new());
        let count = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latch = latch.clone();
                let count = count.clone();
                std::thread::spawn(move || {
                    latch.initialize(|| {
                        count.fetch_add(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ran| *ran)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_client_details() {
        let details = ClientDetails::current();
        assert_eq!(details.client_source, CLIENT_SOURCE);
        assert_eq!(details.sdk_version, env!("CARGO_PKG_VERSION"));
        assert!(!details.platform.is_empty());
    }
}
