//! Delivery-order guarantees under concurrent inference, and stop-time
//! flush semantics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tabscribe::capture::surface::{MockSurfaceDirectory, StreamHandle};
use tabscribe::driver::engine::{DecodeOptions, EngineLoader, MockEngineProvider};
use tabscribe::driver::stream::MockStreamSource;
use tabscribe::{
    App, Config, ControlCommand, DriverEvent, FileSessionStore, InferenceDriver, InferenceEngine,
    Result, TabscribeError,
};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Engine whose response and latency are keyed by the first sample of the
/// chunk, making concurrent completion order fully scriptable.
struct KeyedEngine {
    entries: Mutex<HashMap<u64, (Duration, String)>>,
}

impl KeyedEngine {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn on(self, key: u64, text: &str, delay: Duration) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(key, (delay, text.to_string()));
        self
    }
}

#[async_trait::async_trait]
impl InferenceEngine for KeyedEngine {
    async fn transcribe(&self, samples: &[f32], _options: &DecodeOptions) -> Result<String> {
        let key = samples[0].round() as u64;
        let entry = self.entries.lock().unwrap().get(&key).cloned();
        match entry {
            Some((delay, text)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(text)
            }
            None => Err(TabscribeError::Inference {
                message: format!("unscripted chunk key {}", key),
            }),
        }
    }
}

/// 12-sample window, 6-sample overlap, 4-sample residual floor.
fn small_config() -> Config {
    let mut config = Config::default();
    config.audio.sample_rate = 4;
    config.audio.chunk_window_secs = 3;
    config
}

fn ramp(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32).collect()
}

#[tokio::test]
async fn test_overlay_lines_appear_in_chunk_order() {
    // Chunks are keyed 0, 6, 12 by extraction; the first completes last.
    let engine = Arc::new(
        KeyedEngine::new()
            .on(0, "the first sentence", Duration::from_millis(120))
            .on(6, "the second sentence", Duration::ZERO)
            .on(12, "the third sentence", Duration::from_millis(30)),
    );
    let dir = TempDir::new().unwrap();
    let surfaces = Arc::new(MockSurfaceDirectory::with_surface(
        1,
        "https://example.com",
    ));
    let store = Arc::new(FileSessionStore::new(dir.path().join("session.json")));
    let (source, frames) = MockStreamSource::piped();
    let app = App::new(
        small_config(),
        surfaces,
        Arc::new(MockEngineProvider::new(engine)),
        Arc::new(source),
        store,
    )
    .await;

    let response = app.submit(ControlCommand::StartCapture).await;
    assert!(response.success, "start failed: {:?}", response.error);

    frames.send(ramp(24)).await.unwrap();

    let mut state = app.overlay_state();
    for _ in 0..100 {
        if state.borrow().lines.len() == 3 {
            break;
        }
        tokio::time::timeout(Duration::from_secs(2), state.changed())
            .await
            .expect("timed out waiting for overlay lines")
            .expect("overlay state channel closed");
    }

    let lines: Vec<String> = state.borrow().lines.iter().map(|l| l.text.clone()).collect();
    assert_eq!(
        lines,
        vec![
            "the first sentence",
            "the second sentence",
            "the third sentence"
        ]
    );
}

fn driver_fixture(
    engine: Arc<dyn InferenceEngine>,
) -> (
    InferenceDriver,
    mpsc::Sender<Vec<f32>>,
    mpsc::Receiver<DriverEvent>,
) {
    let config = small_config();
    let (event_tx, event_rx) = mpsc::channel(64);
    let loader = Arc::new(EngineLoader::new(
        Arc::new(MockEngineProvider::new(engine)),
        config.stt.model.clone(),
        event_tx.clone(),
    ));
    let (source, frames) = MockStreamSource::piped();
    let driver = InferenceDriver::new(&config, loader, Arc::new(source), event_tx);
    (driver, frames, event_rx)
}

fn transcriptions(rx: &mut mpsc::Receiver<DriverEvent>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let DriverEvent::TranscriptionResult { text } = event {
            out.push(text);
        }
    }
    out
}

#[tokio::test]
async fn test_stop_delivers_residual_but_not_in_flight_results() {
    // One slow chunk in flight at stop time; the 6-sample residual is the
    // only result that may be delivered afterwards.
    let engine = Arc::new(
        KeyedEngine::new()
            .on(0, "a result that arrives too late", Duration::from_millis(300))
            .on(6, "the final residual", Duration::ZERO),
    );
    let (driver, frames, mut events) = driver_fixture(engine);

    driver
        .start_recording(StreamHandle::new("s-1"))
        .await
        .unwrap();
    frames.send(ramp(12)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    driver.stop_recording().await;

    assert_eq!(
        transcriptions(&mut events),
        vec!["the final residual".to_string()]
    );
}

#[tokio::test]
async fn test_stop_without_residual_delivers_nothing() {
    let engine = Arc::new(KeyedEngine::new().on(
        0,
        "a result that arrives too late",
        Duration::from_millis(300),
    ));
    let (driver, frames, mut events) = driver_fixture(engine);

    driver
        .start_recording(StreamHandle::new("s-1"))
        .await
        .unwrap();
    // Three samples: below the four-sample residual floor.
    frames.send(ramp(3)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    driver.stop_recording().await;

    assert!(transcriptions(&mut events).is_empty());
}
