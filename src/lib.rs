//! tabscribe - Live captions for tab audio
//!
//! Captures a browsing surface's audio, transcribes it in overlapping
//! streaming chunks, and relays accepted text to a transcript overlay.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod capture;
pub mod config;
pub mod defaults;
pub mod driver;
pub mod error;
pub mod overlay;
pub mod relay;
pub mod session;

// Core seams (browser plumbing → inference → presentation)
pub use capture::coordinator::{CaptureCoordinator, CoordinatorTimeouts, DriverPort};
pub use capture::surface::{StreamHandle, SurfaceDirectory, SurfaceInfo};
pub use driver::engine::{DecodeOptions, EngineProvider, InferenceEngine};
pub use driver::stream::{AudioStream, StreamSource};
pub use driver::{DriverHost, DriverState, InferenceDriver};

// Wire protocol and routing
pub use relay::protocol::{
    CaptureResponse, ControlCommand, DriverAck, DriverCommand, DriverEvent, OverlayCommand,
    PingReply,
};
pub use relay::router::{ControlHandler, Relay};

// Presentation
pub use overlay::sink::{OverlaySink, OverlaySnapshot, SnapshotLine};

// Composition root
pub use app::App;

// Error handling
pub use error::{Result, TabscribeError};

// Config and session state
pub use config::Config;
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore, SurfaceId};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        }
    }
}
