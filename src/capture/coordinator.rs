//! Capture coordinator: owns the single active session and drives the
//! start/stop lifecycle across the other contexts.

use crate::capture::surface::{StreamHandle, SurfaceDirectory};
use crate::defaults;
use crate::error::{Result, TabscribeError};
use crate::relay::protocol::{
    CaptureResponse, ControlCommand, DriverAck, OverlayCommand, PingReply,
};
use crate::relay::router::ControlHandler;
use crate::session::{Session, SessionStore, SurfaceId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

/// Port into the inference execution context.
#[async_trait::async_trait]
pub trait DriverPort: Send + Sync {
    /// Creates the inference context if absent; "already exists" is success.
    async fn ensure_context(&self) -> Result<()>;

    /// Liveness probe.
    async fn ping(&self) -> Result<PingReply>;

    /// Sends the start directive. The ack only confirms receipt; the real
    /// outcome arrives through the driver's event stream.
    async fn start(&self, handle: StreamHandle) -> Result<DriverAck>;

    /// Best-effort stop directive.
    async fn stop(&self);
}

/// Timeouts guarding the start path. Injectable so tests run fast.
#[derive(Debug, Clone)]
pub struct CoordinatorTimeouts {
    pub liveness: Duration,
    pub start_ack: Duration,
    /// Settle delay between receiver injection and the retry probe.
    pub inject_settle: Duration,
}

impl Default for CoordinatorTimeouts {
    fn default() -> Self {
        Self {
            liveness: Duration::from_millis(defaults::LIVENESS_TIMEOUT_MS),
            start_ack: Duration::from_millis(defaults::START_ACK_TIMEOUT_MS),
            inject_settle: Duration::from_millis(defaults::INJECT_SETTLE_MS),
        }
    }
}

/// Coordinator owning the capture session lifecycle.
///
/// At most one session is active; `start_capture` while active is a no-op
/// returning success, and `stop_capture` never fails from the caller's
/// perspective.
pub struct CaptureCoordinator {
    surfaces: Arc<dyn SurfaceDirectory>,
    driver: Arc<dyn DriverPort>,
    store: Arc<dyn SessionStore>,
    timeouts: CoordinatorTimeouts,
    session: Mutex<Option<Session>>,
    next_session_id: AtomicU64,
}

impl CaptureCoordinator {
    pub fn new(
        surfaces: Arc<dyn SurfaceDirectory>,
        driver: Arc<dyn DriverPort>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self::with_timeouts(surfaces, driver, store, CoordinatorTimeouts::default())
    }

    pub fn with_timeouts(
        surfaces: Arc<dyn SurfaceDirectory>,
        driver: Arc<dyn DriverPort>,
        store: Arc<dyn SessionStore>,
        timeouts: CoordinatorTimeouts,
    ) -> Self {
        Self {
            surfaces,
            driver,
            store,
            timeouts,
            session: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Returns the active session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// Starts a capture session on the active surface.
    ///
    /// Idempotent: when a session is already active this returns Ok without
    /// acquiring anything twice. Any failure leaves a clean not-recording
    /// state.
    pub async fn start_capture(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        let surface = self
            .surfaces
            .active_surface()
            .await
            .ok_or(TabscribeError::NoTargetSurface)?;
        if surface.is_privileged() {
            return Err(TabscribeError::UnsupportedSurface);
        }

        match self.start_on_surface(surface.id).await {
            Ok(()) => {
                let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
                *session = Some(Session {
                    id,
                    target_surface: surface.id,
                });
                Ok(())
            }
            Err(e) => {
                self.rollback(surface.id).await;
                Err(e)
            }
        }
    }

    /// The fallible middle of the start path; side effects are rolled back
    /// by the caller on error.
    async fn start_on_surface(&self, surface: SurfaceId) -> Result<()> {
        self.ensure_receiver(surface).await?;

        let handle = self.surfaces.media_stream_handle(surface).await?;

        self.driver.ensure_context().await?;

        // Listening visual state; delivery is best-effort.
        self.surfaces
            .notify(surface, OverlayCommand::StartTranscription)
            .await;

        tokio::time::timeout(self.timeouts.liveness, self.driver.ping())
            .await
            .map_err(|_| TabscribeError::LivenessTimeout {
                timeout_ms: self.timeouts.liveness.as_millis() as u64,
            })??;

        tokio::time::timeout(self.timeouts.start_ack, self.driver.start(handle))
            .await
            .map_err(|_| TabscribeError::StartAckTimeout {
                timeout_ms: self.timeouts.start_ack.as_millis() as u64,
            })??;

        self.store.set_recording(true)?;
        Ok(())
    }

    /// Install-if-absent receiver: probe, inject on failure, settle, re-probe.
    async fn ensure_receiver(&self, surface: SurfaceId) -> Result<()> {
        if self.surfaces.ping_receiver(surface).await.is_ok() {
            return Ok(());
        }

        self.surfaces
            .inject_receiver(surface)
            .await
            .map_err(|e| TabscribeError::ReceiverInjectionFailed {
                message: e.to_string(),
            })?;
        tokio::time::sleep(self.timeouts.inject_settle).await;

        self.surfaces
            .ping_receiver(surface)
            .await
            .map_err(|e| TabscribeError::ReceiverInjectionFailed {
                message: format!("receiver unresponsive after injection: {}", e),
            })
    }

    /// Best-effort unwind after a failed start.
    async fn rollback(&self, surface: SurfaceId) {
        self.driver.stop().await;
        self.surfaces
            .notify(surface, OverlayCommand::StopTranscription)
            .await;
        if let Err(e) = self.store.set_recording(false) {
            warn!("failed to clear recording flag during rollback: {}", e);
        }
    }

    /// Stops the active capture session.
    ///
    /// Always succeeds from the caller's perspective; internal failures are
    /// logged only. Stop while stopped is a safe no-op.
    pub async fn stop_capture(&self) {
        let mut session = self.session.lock().await;

        self.driver.stop().await;

        if let Some(active) = session.take() {
            self.surfaces
                .notify(active.target_surface, OverlayCommand::StopTranscription)
                .await;
        }

        if let Err(e) = self.store.set_recording(false) {
            warn!("failed to clear recording flag on stop: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl ControlHandler for CaptureCoordinator {
    async fn handle(&self, command: ControlCommand) -> CaptureResponse {
        match command {
            ControlCommand::StartCapture => match self.start_capture().await {
                Ok(()) => CaptureResponse::ok(),
                Err(e) => CaptureResponse::err(e.to_string()),
            },
            ControlCommand::StopCapture => {
                self.stop_capture().await;
                CaptureResponse::ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::surface::MockSurfaceDirectory;
    use crate::session::MemorySessionStore;
    use std::sync::atomic::AtomicUsize;

    /// Scriptable driver port for coordinator tests.
    struct MockDriverPort {
        ensure_calls: AtomicUsize,
        start_calls: AtomicUsize,
        stop_calls: AtomicUsize,
        ping_hangs: bool,
        start_hangs: bool,
    }

    impl MockDriverPort {
        fn new() -> Self {
            Self {
                ensure_calls: AtomicUsize::new(0),
                start_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
                ping_hangs: false,
                start_hangs: false,
            }
        }

        fn with_hanging_ping(mut self) -> Self {
            self.ping_hangs = true;
            self
        }

        fn with_hanging_start(mut self) -> Self {
            self.start_hangs = true;
            self
        }
    }

    #[async_trait::async_trait]
    impl DriverPort for MockDriverPort {
        async fn ensure_context(&self) -> Result<()> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn ping(&self) -> Result<PingReply> {
            if self.ping_hangs {
                std::future::pending::<()>().await;
            }
            Ok(PingReply::ready())
        }

        async fn start(&self, _handle: StreamHandle) -> Result<DriverAck> {
            if self.start_hangs {
                std::future::pending::<()>().await;
            }
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            Ok(DriverAck { received: true })
        }

        async fn stop(&self) {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_timeouts() -> CoordinatorTimeouts {
        CoordinatorTimeouts {
            liveness: Duration::from_millis(20),
            start_ack: Duration::from_millis(20),
            inject_settle: Duration::from_millis(1),
        }
    }

    fn coordinator_with(
        surfaces: MockSurfaceDirectory,
        driver: MockDriverPort,
    ) -> (
        CaptureCoordinator,
        Arc<MockSurfaceDirectory>,
        Arc<MockDriverPort>,
        Arc<MemorySessionStore>,
    ) {
        let surfaces = Arc::new(surfaces);
        let driver = Arc::new(driver);
        let store = Arc::new(MemorySessionStore::new());
        let coordinator = CaptureCoordinator::with_timeouts(
            surfaces.clone(),
            driver.clone(),
            store.clone(),
            fast_timeouts(),
        );
        (coordinator, surfaces, driver, store)
    }

    #[tokio::test]
    async fn test_start_capture_succeeds_on_valid_surface() {
        let (coordinator, surfaces, driver, store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com"),
            MockDriverPort::new(),
        );

        coordinator.start_capture().await.unwrap();

        assert!(coordinator.session().await.is_some());
        assert!(store.is_recording().unwrap());
        assert_eq!(driver.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(surfaces.stream_requests(), 1);
        assert!(
            surfaces
                .notifications()
                .contains(&(1, OverlayCommand::StartTranscription))
        );
    }

    #[tokio::test]
    async fn test_start_capture_is_idempotent() {
        let (coordinator, surfaces, driver, _store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com"),
            MockDriverPort::new(),
        );

        for _ in 0..3 {
            coordinator.start_capture().await.unwrap();
        }

        // Exactly one session, one stream acquisition, one start directive.
        let session = coordinator.session().await.unwrap();
        assert_eq!(session.id, 1);
        assert_eq!(surfaces.stream_requests(), 1);
        assert_eq!(driver.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_start_capture_without_surface_fails() {
        let (coordinator, _surfaces, _driver, store) =
            coordinator_with(MockSurfaceDirectory::empty(), MockDriverPort::new());

        let err = coordinator.start_capture().await.unwrap_err();
        assert!(matches!(err, TabscribeError::NoTargetSurface));
        assert!(coordinator.session().await.is_none());
        assert!(!store.is_recording().unwrap());
    }

    #[tokio::test]
    async fn test_privileged_page_fails_without_stream_acquisition() {
        let (coordinator, surfaces, driver, _store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "chrome://settings"),
            MockDriverPort::new(),
        );

        let err = coordinator.start_capture().await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot capture audio from this page");
        assert_eq!(surfaces.stream_requests(), 0);
        assert_eq!(driver.start_calls.load(Ordering::SeqCst), 0);
        assert!(coordinator.session().await.is_none());
    }

    #[tokio::test]
    async fn test_receiver_injected_when_ping_fails_once() {
        let (coordinator, _surfaces, _driver, _store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com").with_ping_failures(1),
            MockDriverPort::new(),
        );

        coordinator.start_capture().await.unwrap();
        assert!(coordinator.session().await.is_some());
    }

    #[tokio::test]
    async fn test_injection_failure_aborts_start() {
        let (coordinator, surfaces, _driver, store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com")
                .with_ping_failures(2)
                .with_inject_failure(),
            MockDriverPort::new(),
        );

        let err = coordinator.start_capture().await.unwrap_err();
        assert!(matches!(
            err,
            TabscribeError::ReceiverInjectionFailed { .. }
        ));
        assert_eq!(surfaces.stream_requests(), 0);
        assert!(!store.is_recording().unwrap());
    }

    #[tokio::test]
    async fn test_receiver_unresponsive_after_injection_aborts_start() {
        // Ping fails both before and after injection.
        let (coordinator, _surfaces, _driver, _store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com").with_ping_failures(2),
            MockDriverPort::new(),
        );

        let err = coordinator.start_capture().await.unwrap_err();
        assert!(matches!(
            err,
            TabscribeError::ReceiverInjectionFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_liveness_timeout_surfaces_distinct_error() {
        let (coordinator, _surfaces, _driver, store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com"),
            MockDriverPort::new().with_hanging_ping(),
        );

        let err = coordinator.start_capture().await.unwrap_err();
        assert!(matches!(err, TabscribeError::LivenessTimeout { .. }));
        assert!(coordinator.session().await.is_none());
        assert!(!store.is_recording().unwrap());
    }

    #[tokio::test]
    async fn test_start_ack_timeout_surfaces_distinct_error() {
        let (coordinator, _surfaces, _driver, _store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com"),
            MockDriverPort::new().with_hanging_start(),
        );

        let err = coordinator.start_capture().await.unwrap_err();
        assert!(matches!(err, TabscribeError::StartAckTimeout { .. }));
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back_listening_state() {
        let (coordinator, surfaces, driver, _store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com"),
            MockDriverPort::new().with_hanging_ping(),
        );

        let _ = coordinator.start_capture().await;

        let notes = surfaces.notifications();
        assert!(notes.contains(&(1, OverlayCommand::StartTranscription)));
        assert!(notes.contains(&(1, OverlayCommand::StopTranscription)));
        assert_eq!(driver.stop_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_capture_clears_session_and_flag() {
        let (coordinator, surfaces, driver, store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com"),
            MockDriverPort::new(),
        );

        coordinator.start_capture().await.unwrap();
        coordinator.stop_capture().await;

        assert!(coordinator.session().await.is_none());
        assert!(!store.is_recording().unwrap());
        assert_eq!(driver.stop_calls.load(Ordering::SeqCst), 1);
        assert!(
            surfaces
                .notifications()
                .contains(&(1, OverlayCommand::StopTranscription))
        );
    }

    #[tokio::test]
    async fn test_stop_while_stopped_is_a_no_op() {
        let (coordinator, _surfaces, _driver, store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com"),
            MockDriverPort::new(),
        );

        coordinator.stop_capture().await;
        coordinator.stop_capture().await;
        assert!(!store.is_recording().unwrap());
    }

    #[tokio::test]
    async fn test_restart_after_stop_creates_new_session() {
        let (coordinator, _surfaces, _driver, _store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "https://example.com"),
            MockDriverPort::new(),
        );

        coordinator.start_capture().await.unwrap();
        let first = coordinator.session().await.unwrap().id;
        coordinator.stop_capture().await;
        coordinator.start_capture().await.unwrap();
        let second = coordinator.session().await.unwrap().id;

        assert!(second > first);
    }

    #[tokio::test]
    async fn test_control_handler_maps_errors_to_response() {
        let (coordinator, _surfaces, _driver, _store) = coordinator_with(
            MockSurfaceDirectory::with_surface(1, "chrome://settings"),
            MockDriverPort::new(),
        );

        let response = coordinator.handle(ControlCommand::StartCapture).await;
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("Cannot capture audio from this page")
        );

        // Stop always acks.
        let response = coordinator.handle(ControlCommand::StopCapture).await;
        assert!(response.success);
    }
}
