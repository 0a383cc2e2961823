//! Browsing-surface abstraction: tab resolution, capture-stream handles, and
//! the overlay receiver installed on the page.
//!
//! The real implementation is browser plumbing; this crate only defines the
//! seam and a mock used by tests and degraded mode.

use crate::error::{Result, TabscribeError};
use crate::relay::protocol::OverlayCommand;
use crate::session::SurfaceId;

/// A capturable browsing surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceInfo {
    pub id: SurfaceId,
    pub url: String,
}

impl SurfaceInfo {
    /// Privileged pages cannot be captured or injected into.
    pub fn is_privileged(&self) -> bool {
        self.url.starts_with("chrome://") || self.url.starts_with("chrome-extension://")
    }
}

/// Opaque capture-stream handle scoped to one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    pub stream_id: String,
}

impl StreamHandle {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

/// Directory of browsing surfaces and the operations the coordinator needs
/// on them.
#[async_trait::async_trait]
pub trait SurfaceDirectory: Send + Sync {
    /// Currently focused surface, if any.
    async fn active_surface(&self) -> Option<SurfaceInfo>;

    /// Mints a capture-stream handle scoped to the surface.
    async fn media_stream_handle(&self, surface: SurfaceId) -> Result<StreamHandle>;

    /// Probes the overlay receiver on the surface.
    async fn ping_receiver(&self, surface: SurfaceId) -> Result<()>;

    /// Injects the overlay receiver script into the surface.
    async fn inject_receiver(&self, surface: SurfaceId) -> Result<()>;

    /// Fire-and-forget notification to the surface overlay.
    async fn notify(&self, surface: SurfaceId, command: OverlayCommand);
}

/// Mock surface directory for testing.
///
/// Records every interaction and can be scripted to fail pings or injection.
pub struct MockSurfaceDirectory {
    surface: Option<SurfaceInfo>,
    ping_failures: std::sync::atomic::AtomicUsize,
    inject_fails: bool,
    stream_requests: std::sync::atomic::AtomicUsize,
    notifications: std::sync::Mutex<Vec<(SurfaceId, OverlayCommand)>>,
}

impl MockSurfaceDirectory {
    /// Directory with no active surface.
    pub fn empty() -> Self {
        Self {
            surface: None,
            ping_failures: std::sync::atomic::AtomicUsize::new(0),
            inject_fails: false,
            stream_requests: std::sync::atomic::AtomicUsize::new(0),
            notifications: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Directory whose active surface has the given id and url.
    pub fn with_surface(id: SurfaceId, url: &str) -> Self {
        Self {
            surface: Some(SurfaceInfo {
                id,
                url: url.to_string(),
            }),
            ..Self::empty()
        }
    }

    /// Fail the first `n` receiver pings (the receiver is "not installed").
    pub fn with_ping_failures(self, n: usize) -> Self {
        self.ping_failures
            .store(n, std::sync::atomic::Ordering::SeqCst);
        self
    }

    /// Make receiver injection fail.
    pub fn with_inject_failure(mut self) -> Self {
        self.inject_fails = true;
        self
    }

    /// Number of stream-handle requests made so far.
    pub fn stream_requests(&self) -> usize {
        self.stream_requests
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Notifications sent to surfaces, in order.
    pub fn notifications(&self) -> Vec<(SurfaceId, OverlayCommand)> {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl SurfaceDirectory for MockSurfaceDirectory {
    async fn active_surface(&self) -> Option<SurfaceInfo> {
        self.surface.clone()
    }

    async fn media_stream_handle(&self, surface: SurfaceId) -> Result<StreamHandle> {
        self.stream_requests
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(StreamHandle::new(format!("stream-{}", surface)))
    }

    async fn ping_receiver(&self, _surface: SurfaceId) -> Result<()> {
        let remaining = self.ping_failures.load(std::sync::atomic::Ordering::SeqCst);
        if remaining > 0 {
            self.ping_failures
                .store(remaining - 1, std::sync::atomic::Ordering::SeqCst);
            return Err(TabscribeError::Other("receiver not present".to_string()));
        }
        Ok(())
    }

    async fn inject_receiver(&self, _surface: SurfaceId) -> Result<()> {
        if self.inject_fails {
            return Err(TabscribeError::ReceiverInjectionFailed {
                message: "script injection rejected".to_string(),
            });
        }
        Ok(())
    }

    async fn notify(&self, surface: SurfaceId, command: OverlayCommand) {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((surface, command));
    }
}
