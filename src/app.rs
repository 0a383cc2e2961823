//! Composition root: wires one instance of every context and spawns the
//! relay and overlay tasks.

use crate::capture::coordinator::{CaptureCoordinator, CoordinatorTimeouts};
use crate::capture::surface::{StreamHandle, SurfaceDirectory, SurfaceInfo};
use crate::config::Config;
use crate::driver::context::DriverHost;
use crate::driver::engine::{EngineLoader, EngineProvider};
use crate::driver::stream::StreamSource;
use crate::driver::InferenceDriver;
use crate::error::Result;
use crate::overlay::sink::{OverlaySink, OverlaySnapshot};
use crate::relay::protocol::{CaptureResponse, ControlCommand, OverlayCommand};
use crate::relay::router::Relay;
use crate::session::{SessionStore, SurfaceId};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Surface directory wrapper that also delivers overlay notifications to
/// the in-process presentation sink.
struct OverlayTap {
    inner: Arc<dyn SurfaceDirectory>,
    overlay: mpsc::Sender<OverlayCommand>,
}

#[async_trait::async_trait]
impl SurfaceDirectory for OverlayTap {
    async fn active_surface(&self) -> Option<SurfaceInfo> {
        self.inner.active_surface().await
    }

    async fn media_stream_handle(&self, surface: SurfaceId) -> Result<StreamHandle> {
        self.inner.media_stream_handle(surface).await
    }

    async fn ping_receiver(&self, surface: SurfaceId) -> Result<()> {
        self.inner.ping_receiver(surface).await
    }

    async fn inject_receiver(&self, surface: SurfaceId) -> Result<()> {
        self.inner.inject_receiver(surface).await
    }

    async fn notify(&self, surface: SurfaceId, command: OverlayCommand) {
        self.inner.notify(surface, command.clone()).await;
        let _ = self.overlay.send(command).await;
    }
}

/// The assembled pipeline.
///
/// External collaborators (browser plumbing, the model runtime, the audio
/// source, durable storage) come in through their traits; everything else
/// is built here.
pub struct App {
    relay: Arc<Relay>,
    overlay_state: watch::Receiver<OverlaySnapshot>,
}

impl App {
    pub async fn new(
        config: Config,
        surfaces: Arc<dyn SurfaceDirectory>,
        provider: Arc<dyn EngineProvider>,
        source: Arc<dyn StreamSource>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self::with_timeouts(
            config,
            surfaces,
            provider,
            source,
            store,
            CoordinatorTimeouts::default(),
        )
        .await
    }

    pub async fn with_timeouts(
        config: Config,
        surfaces: Arc<dyn SurfaceDirectory>,
        provider: Arc<dyn EngineProvider>,
        source: Arc<dyn StreamSource>,
        store: Arc<dyn SessionStore>,
        timeouts: CoordinatorTimeouts,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        let (overlay_tx, overlay_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(OverlaySnapshot::default());

        let loader = Arc::new(EngineLoader::new(
            provider,
            config.stt.model.clone(),
            event_tx.clone(),
        ));
        let driver = Arc::new(InferenceDriver::new(
            &config,
            loader,
            source,
            event_tx.clone(),
        ));
        let host = Arc::new(DriverHost::new(driver, event_tx));

        let tapped = Arc::new(OverlayTap {
            inner: surfaces,
            overlay: overlay_tx.clone(),
        });
        let coordinator = Arc::new(CaptureCoordinator::with_timeouts(
            tapped, host, store, timeouts,
        ));

        let relay = Arc::new(Relay::new(coordinator));
        relay.bind_overlay(overlay_tx).await;
        tokio::spawn(relay.clone().run(event_rx));

        let sink = OverlaySink::new(&config.overlay);
        tokio::spawn(sink.run(overlay_rx, state_tx));

        Self {
            relay,
            overlay_state: state_rx,
        }
    }

    /// Submits a control command, as a popup or shortcut would.
    pub async fn submit(&self, command: ControlCommand) -> CaptureResponse {
        self.relay.submit(command).await
    }

    /// The relay, for binding extra status listeners.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Current overlay render state; clone to observe from elsewhere.
    pub fn overlay_state(&self) -> watch::Receiver<OverlaySnapshot> {
        self.overlay_state.clone()
    }
}
