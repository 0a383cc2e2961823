//! Inference execution context.
//!
//! The driver runs inside its own context task, created lazily on first use
//! and reused afterwards. The task speaks the driver command protocol:
//! pings answer immediately, start directives are acked on receipt and
//! executed in the background with failures surfaced as status updates.

use crate::capture::coordinator::DriverPort;
use crate::capture::surface::StreamHandle;
use crate::driver::InferenceDriver;
use crate::error::{Result, TabscribeError};
use crate::relay::protocol::{DriverAck, DriverCommand, DriverEvent, PingReply};
use std::sync::Arc;
use tokio::sync::{OnceCell, mpsc, oneshot};
use tracing::error;

enum HostReply {
    Pong(PingReply),
    Ack(DriverAck),
}

struct HostRequest {
    command: DriverCommand,
    reply: oneshot::Sender<HostReply>,
}

/// Hosts the inference driver in a lazily created context task.
pub struct DriverHost {
    driver: Arc<InferenceDriver>,
    events: mpsc::Sender<DriverEvent>,
    channel: OnceCell<mpsc::Sender<HostRequest>>,
}

impl DriverHost {
    pub fn new(driver: Arc<InferenceDriver>, events: mpsc::Sender<DriverEvent>) -> Self {
        Self {
            driver,
            events,
            channel: OnceCell::new(),
        }
    }

    /// Create-if-absent: concurrent callers share one context task.
    async fn context(&self) -> &mpsc::Sender<HostRequest> {
        self.channel
            .get_or_init(|| async {
                let (tx, rx) = mpsc::channel(16);
                tokio::spawn(Self::serve(rx, self.driver.clone(), self.events.clone()));
                tx
            })
            .await
    }

    async fn serve(
        mut requests: mpsc::Receiver<HostRequest>,
        driver: Arc<InferenceDriver>,
        events: mpsc::Sender<DriverEvent>,
    ) {
        while let Some(HostRequest { command, reply }) = requests.recv().await {
            match command {
                DriverCommand::Ping => {
                    let pong = if driver.is_engine_loaded() {
                        PingReply::ready()
                    } else {
                        PingReply::ok()
                    };
                    let _ = reply.send(HostReply::Pong(pong));
                }
                DriverCommand::StartRecording { stream_id } => {
                    // Ack receipt before the (possibly slow) start; the real
                    // outcome travels through the event stream.
                    let _ = reply.send(HostReply::Ack(DriverAck { received: true }));
                    let driver = driver.clone();
                    let events = events.clone();
                    tokio::spawn(async move {
                        if let Err(e) =
                            driver.start_recording(StreamHandle::new(stream_id)).await
                        {
                            error!(error = %e, "recording failed to start");
                            let _ = events
                                .send(DriverEvent::StatusUpdate {
                                    status: format!("Error: {}", e),
                                })
                                .await;
                        }
                    });
                }
                DriverCommand::StopRecording => {
                    driver.stop_recording().await;
                    let _ = reply.send(HostReply::Ack(DriverAck { received: true }));
                }
            }
        }
    }

    async fn request(&self, command: DriverCommand) -> Result<HostReply> {
        let (tx, rx) = oneshot::channel();
        self.context()
            .await
            .send(HostRequest { command, reply: tx })
            .await
            .map_err(|_| TabscribeError::ChannelClosed {
                context: "driver context".to_string(),
            })?;
        rx.await.map_err(|_| TabscribeError::ChannelClosed {
            context: "driver context reply".to_string(),
        })
    }
}

#[async_trait::async_trait]
impl DriverPort for DriverHost {
    async fn ensure_context(&self) -> Result<()> {
        self.context().await;
        Ok(())
    }

    async fn ping(&self) -> Result<PingReply> {
        match self.request(DriverCommand::Ping).await? {
            HostReply::Pong(pong) => Ok(pong),
            HostReply::Ack(_) => Err(TabscribeError::Other(
                "unexpected reply to ping".to_string(),
            )),
        }
    }

    async fn start(&self, handle: StreamHandle) -> Result<DriverAck> {
        let command = DriverCommand::StartRecording {
            stream_id: handle.stream_id,
        };
        match self.request(command).await? {
            HostReply::Ack(ack) => Ok(ack),
            HostReply::Pong(_) => Err(TabscribeError::Other(
                "unexpected reply to start".to_string(),
            )),
        }
    }

    async fn stop(&self) {
        // No context means nothing was ever started.
        if self.channel.initialized() {
            let _ = self.request(DriverCommand::StopRecording).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::driver::engine::{EngineLoader, MockEngine, MockEngineProvider};
    use crate::driver::stream::MockStreamSource;
    use std::time::Duration;

    fn host_with(
        engine: MockEngine,
        source: MockStreamSource,
    ) -> (DriverHost, mpsc::Receiver<DriverEvent>) {
        let config = Config::default();
        let (tx, rx) = mpsc::channel(64);
        let provider = Arc::new(MockEngineProvider::new(Arc::new(engine)));
        let loader = Arc::new(EngineLoader::new(
            provider,
            config.stt.model.clone(),
            tx.clone(),
        ));
        let driver = Arc::new(InferenceDriver::new(
            &config,
            loader,
            Arc::new(source),
            tx.clone(),
        ));
        (DriverHost::new(driver, tx), rx)
    }

    async fn wait_for_status(rx: &mut mpsc::Receiver<DriverEvent>, needle: &str) -> String {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("timed out waiting for status")
                .expect("event channel closed");
            if let DriverEvent::StatusUpdate { status } = event {
                if status.contains(needle) {
                    return status;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_ping_reports_ok_before_engine_load() {
        let (host, _rx) = host_with(MockEngine::new(), MockStreamSource::with_frames(vec![]));
        assert_eq!(host.ping().await.unwrap().status, "ok");
    }

    #[tokio::test]
    async fn test_ping_reports_ready_after_start() {
        let (source, _frames) = MockStreamSource::piped();
        let (host, _rx) = host_with(MockEngine::new(), source);

        host.start(StreamHandle::new("s-1")).await.unwrap();
        // The start runs in the background; wait for the engine to load.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(host.ping().await.unwrap().status, "ready");
        host.stop().await;
    }

    #[tokio::test]
    async fn test_start_acks_receipt_immediately() {
        let (source, _frames) = MockStreamSource::piped();
        let (host, _rx) = host_with(MockEngine::new(), source);

        let ack = host.start(StreamHandle::new("s-1")).await.unwrap();
        assert!(ack.received);
        host.stop().await;
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_as_status_update() {
        let (host, mut rx) = host_with(MockEngine::new(), MockStreamSource::without_audio_track());

        let ack = host.start(StreamHandle::new("s-1")).await.unwrap();
        assert!(ack.received);

        let status = wait_for_status(&mut rx, "Error:").await;
        assert!(status.contains("No audio tracks found in stream"));
    }

    #[tokio::test]
    async fn test_stop_without_context_is_a_no_op() {
        let (host, _rx) = host_with(MockEngine::new(), MockStreamSource::with_frames(vec![]));
        host.stop().await;
    }

    #[tokio::test]
    async fn test_ensure_context_is_idempotent() {
        let (host, _rx) = host_with(MockEngine::new(), MockStreamSource::with_frames(vec![]));
        host.ensure_context().await.unwrap();
        host.ensure_context().await.unwrap();
        assert_eq!(host.ping().await.unwrap().status, "ok");
    }
}
