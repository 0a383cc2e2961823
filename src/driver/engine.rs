//! Speech-to-text engine abstraction and single-flight loading.
//!
//! The engine is expensive to initialize, so the loader memoizes it behind a
//! [`tokio::sync::OnceCell`]: concurrent starts share one load, and a failed
//! load leaves the cell empty so the next start retries from scratch.

use crate::defaults;
use crate::error::{Result, TabscribeError};
use crate::relay::protocol::DriverEvent;
use std::sync::Arc;
use tokio::sync::{OnceCell, mpsc};
use tracing::{info, warn};

/// Decoding parameters passed to every transcription call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    /// Model-internal chunking window, seconds.
    pub chunk_length_s: u32,
    /// Model-internal stride, seconds.
    pub stride_length_s: u32,
    pub return_timestamps: bool,
    pub language: String,
    pub task: String,
}

impl DecodeOptions {
    pub fn for_language(language: impl Into<String>) -> Self {
        Self {
            chunk_length_s: 30,
            stride_length_s: 5,
            return_timestamps: false,
            language: language.into(),
            task: "transcribe".to_string(),
        }
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::for_language(defaults::DEFAULT_LANGUAGE)
    }
}

/// A loaded speech-to-text engine.
#[async_trait::async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Transcribes one chunk of 16 kHz mono samples.
    async fn transcribe(&self, samples: &[f32], options: &DecodeOptions) -> Result<String>;
}

impl std::fmt::Debug for dyn InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InferenceEngine")
    }
}

/// Source of engines, in preference order.
#[async_trait::async_trait]
pub trait EngineProvider: Send + Sync {
    /// Loads the model from the local cache.
    async fn load_local(&self, model: &str) -> Result<Arc<dyn InferenceEngine>>;

    /// Fetches and loads the model from the remote registry.
    async fn load_remote(&self, model: &str) -> Result<Arc<dyn InferenceEngine>>;
}

/// Memoizing engine loader with local-then-remote fallback.
pub struct EngineLoader {
    provider: Arc<dyn EngineProvider>,
    model: String,
    cell: OnceCell<Arc<dyn InferenceEngine>>,
    events: mpsc::Sender<DriverEvent>,
}

impl EngineLoader {
    pub fn new(
        provider: Arc<dyn EngineProvider>,
        model: impl Into<String>,
        events: mpsc::Sender<DriverEvent>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            cell: OnceCell::new(),
            events,
        }
    }

    /// True once an engine has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Returns the engine, loading it on first use.
    ///
    /// Concurrent callers share one in-flight load. On failure the cell
    /// stays empty, so a later call retries.
    pub async fn get(&self) -> Result<Arc<dyn InferenceEngine>> {
        self.cell
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    async fn load(&self) -> Result<Arc<dyn InferenceEngine>> {
        self.report(format!("Loading model {}...", self.model)).await;

        let engine = match self.provider.load_local(&self.model).await {
            Ok(engine) => {
                info!(model = %self.model, "loaded model from local cache");
                engine
            }
            Err(local_err) => {
                warn!(model = %self.model, error = %local_err, "local model load failed, fetching remote");
                self.report("Local model unavailable, downloading...").await;
                self.provider.load_remote(&self.model).await.map_err(|remote_err| {
                    TabscribeError::ModelLoadFailed {
                        message: format!("local: {}; remote: {}", local_err, remote_err),
                    }
                })?
            }
        };

        self.report("Model loaded").await;
        Ok(engine)
    }

    /// Best-effort status line for control surfaces.
    async fn report(&self, status: impl Into<String>) {
        let _ = self
            .events
            .send(DriverEvent::StatusUpdate {
                status: status.into(),
            })
            .await;
    }
}

/// Mock engine whose responses are scripted per call.
///
/// Calls pop from the script in order; once the script is exhausted, calls
/// return an empty string. A per-call delay lets tests stage slow inference.
pub struct MockEngine {
    script: std::sync::Mutex<std::collections::VecDeque<MockCall>>,
    calls: std::sync::atomic::AtomicUsize,
}

struct MockCall {
    delay: std::time::Duration,
    result: std::result::Result<String, String>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Engine answering every call with the given texts, in order.
    pub fn with_responses<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let engine = Self::new();
        for text in texts {
            engine.push_response(text);
        }
        engine
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.push_call(std::time::Duration::ZERO, Ok(text.into()));
    }

    pub fn push_delayed(&self, text: impl Into<String>, delay: std::time::Duration) {
        self.push_call(delay, Ok(text.into()));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.push_call(std::time::Duration::ZERO, Err(message.into()));
    }

    fn push_call(&self, delay: std::time::Duration, result: std::result::Result<String, String>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(MockCall { delay, result });
    }

    /// Number of transcription calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl InferenceEngine for MockEngine {
    async fn transcribe(&self, _samples: &[f32], _options: &DecodeOptions) -> Result<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let call = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match call {
            Some(call) => {
                if !call.delay.is_zero() {
                    tokio::time::sleep(call.delay).await;
                }
                call.result
                    .map_err(|message| TabscribeError::Inference { message })
            }
            None => Ok(String::new()),
        }
    }
}

/// Mock provider with switchable local/remote failure and load counters.
pub struct MockEngineProvider {
    engine: Arc<dyn InferenceEngine>,
    local_fails: bool,
    remote_fails: bool,
    local_loads: std::sync::atomic::AtomicUsize,
    remote_loads: std::sync::atomic::AtomicUsize,
}

impl MockEngineProvider {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            local_fails: false,
            remote_fails: false,
            local_loads: std::sync::atomic::AtomicUsize::new(0),
            remote_loads: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_local_failure(mut self) -> Self {
        self.local_fails = true;
        self
    }

    pub fn with_remote_failure(mut self) -> Self {
        self.remote_fails = true;
        self
    }

    pub fn local_loads(&self) -> usize {
        self.local_loads.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn remote_loads(&self) -> usize {
        self.remote_loads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EngineProvider for MockEngineProvider {
    async fn load_local(&self, model: &str) -> Result<Arc<dyn InferenceEngine>> {
        self.local_loads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.local_fails {
            return Err(TabscribeError::ModelLoadFailed {
                message: format!("{} not in local cache", model),
            });
        }
        Ok(self.engine.clone())
    }

    async fn load_remote(&self, model: &str) -> Result<Arc<dyn InferenceEngine>> {
        self.remote_loads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.remote_fails {
            return Err(TabscribeError::ModelLoadFailed {
                message: format!("failed to fetch {}", model),
            });
        }
        Ok(self.engine.clone())
    }
}
