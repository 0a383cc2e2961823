//! Background relay: routes control commands, transcription and status events
//! between the isolated contexts.
//!
//! Control commands always produce a definite response. Transcription and
//! status routing is best-effort: a missing presentation surface or an absent
//! control listener silently drops the event.

use crate::relay::protocol::{CaptureResponse, ControlCommand, DriverEvent, OverlayCommand};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Handler trait for routing control commands to the capture coordinator.
#[async_trait::async_trait]
pub trait ControlHandler: Send + Sync {
    /// Handle a control command and return a definite response.
    async fn handle(&self, command: ControlCommand) -> CaptureResponse;
}

/// Cross-context message router.
pub struct Relay {
    control: Arc<dyn ControlHandler>,
    overlay: Mutex<Option<mpsc::Sender<OverlayCommand>>>,
    status_listeners: Mutex<Vec<mpsc::Sender<String>>>,
}

impl Relay {
    /// Creates a relay routing control commands to the given handler.
    pub fn new(control: Arc<dyn ControlHandler>) -> Self {
        Self {
            control,
            overlay: Mutex::new(None),
            status_listeners: Mutex::new(Vec::new()),
        }
    }

    /// Submits a control command; the caller always receives a definite
    /// success/failure.
    pub async fn submit(&self, command: ControlCommand) -> CaptureResponse {
        self.control.handle(command).await
    }

    /// Binds the presentation surface that receives transcription events.
    pub async fn bind_overlay(&self, tx: mpsc::Sender<OverlayCommand>) {
        *self.overlay.lock().await = Some(tx);
    }

    /// Unbinds the presentation surface; subsequent transcriptions are dropped.
    pub async fn unbind_overlay(&self) {
        *self.overlay.lock().await = None;
    }

    /// Registers a control surface interested in status updates.
    pub async fn add_status_listener(&self, tx: mpsc::Sender<String>) {
        self.status_listeners.lock().await.push(tx);
    }

    /// Forwards one driver event to its destination, best-effort.
    pub async fn forward(&self, event: DriverEvent) {
        match event {
            DriverEvent::TranscriptionResult { text } => {
                let overlay = self.overlay.lock().await.clone();
                match overlay {
                    Some(tx) => {
                        if tx
                            .send(OverlayCommand::ShowTranscription { text })
                            .await
                            .is_err()
                        {
                            debug!("presentation surface gone, dropping transcription");
                        }
                    }
                    None => debug!("no presentation surface bound, dropping transcription"),
                }
            }
            DriverEvent::StatusUpdate { status } => {
                let mut listeners = self.status_listeners.lock().await;
                // Drop listeners whose receiving side has closed.
                let mut alive = Vec::with_capacity(listeners.len());
                for tx in listeners.drain(..) {
                    if tx.send(status.clone()).await.is_ok() {
                        alive.push(tx);
                    }
                }
                *listeners = alive;
            }
        }
    }

    /// Consumes driver events until the channel closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<DriverEvent>) {
        while let Some(event) = events.recv().await {
            self.forward(event).await;
        }
    }
}
