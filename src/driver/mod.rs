//! Streaming inference driver: buffers captured audio, extracts overlapping
//! chunks, runs bounded-concurrency transcription, and emits accepted text in
//! chunk order.

pub mod buffer;
pub mod context;
pub mod engine;
pub mod filter;
pub mod resequencer;
pub mod stream;

pub use buffer::ChunkBuffer;
pub use context::DriverHost;
pub use engine::{
    DecodeOptions, EngineLoader, EngineProvider, InferenceEngine, MockEngine, MockEngineProvider,
};
pub use filter::AcceptanceFilter;
pub use resequencer::Resequencer;
pub use stream::{AudioStream, MockStreamSource, StreamSource};

use crate::capture::surface::StreamHandle;
use crate::config::Config;
use crate::defaults;
use crate::error::Result;
use crate::relay::protocol::DriverEvent;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{Mutex, Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Driver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initializing,
    Ready,
    Listening,
    /// Engine load failed; the next start retries from scratch.
    Failed,
}

/// Result of one dispatched chunk, tagged with its extraction order.
enum ChunkOutcome {
    /// Inference finished; `text` is `None` for rejected or failed chunks.
    Done { seq: u64, text: Option<String> },
    /// Extraction has stopped. Only the residual sequence number, if any,
    /// may still be delivered; everything else in flight is discarded.
    Flushed { residual: Option<u64> },
}

/// Everything an inference task needs, cloned per dispatch.
#[derive(Clone)]
struct DispatchContext {
    engine: Arc<dyn InferenceEngine>,
    filter: AcceptanceFilter,
    options: DecodeOptions,
    limiter: Arc<Semaphore>,
    outcomes: mpsc::Sender<ChunkOutcome>,
}

struct ActiveRun {
    stop_tx: Option<oneshot::Sender<()>>,
    listen: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

/// The inference driver.
///
/// Owns the chunking parameters and the engine loader; each recording run
/// spawns a listen loop (frame intake and chunk extraction) and a forwarder
/// (order restoration and event emission). The frame path never awaits
/// inference.
pub struct InferenceDriver {
    loader: Arc<EngineLoader>,
    source: Arc<dyn StreamSource>,
    filter: AcceptanceFilter,
    options: DecodeOptions,
    events: mpsc::Sender<DriverEvent>,
    window: usize,
    overlap: usize,
    min_residual: usize,
    limiter: Arc<Semaphore>,
    state: Arc<StdMutex<DriverState>>,
    run: Mutex<Option<ActiveRun>>,
}

impl InferenceDriver {
    pub fn new(
        config: &Config,
        loader: Arc<EngineLoader>,
        source: Arc<dyn StreamSource>,
        events: mpsc::Sender<DriverEvent>,
    ) -> Self {
        Self {
            loader,
            source,
            filter: AcceptanceFilter::new(
                defaults::MIN_ACCEPTED_CHARS,
                &config.stt.filler_phrases,
            ),
            options: DecodeOptions::for_language(config.stt.language.as_str()),
            events,
            window: config.audio.chunk_window_samples(),
            overlap: config.audio.overlap_samples(),
            min_residual: config.audio.min_residual_samples(),
            limiter: Arc::new(Semaphore::new(config.stt.max_concurrent_inference)),
            state: Arc::new(StdMutex::new(DriverState::Uninitialized)),
            run: Mutex::new(None),
        }
    }

    pub fn state(&self) -> DriverState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True once the engine has been loaded; drives the `ready`/`ok` ping
    /// distinction.
    pub fn is_engine_loaded(&self) -> bool {
        self.loader.is_loaded()
    }

    fn set_state(&self, state: DriverState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Begins a recording run on the given stream.
    ///
    /// Idempotent while listening. Loads the engine on first use; a load
    /// failure leaves the driver in `Failed` and is retried by the next
    /// start.
    pub async fn start_recording(&self, handle: StreamHandle) -> Result<()> {
        let mut run = self.run.lock().await;
        if let Some(active) = run.as_ref() {
            if !active.listen.is_finished() {
                return Ok(());
            }
            // Previous run ended naturally; reap it.
            *run = None;
        }

        if !self.loader.is_loaded() {
            self.set_state(DriverState::Initializing);
        }
        let engine = match self.loader.get().await {
            Ok(engine) => engine,
            Err(e) => {
                self.set_state(DriverState::Failed);
                return Err(e);
            }
        };
        self.set_state(DriverState::Ready);

        let stream = self.source.open(&handle).await?;

        let (outcome_tx, outcome_rx) = mpsc::channel(64);
        let (stop_tx, stop_rx) = oneshot::channel();
        let forwarder = tokio::spawn(Self::forward(outcome_rx, self.events.clone()));
        let ctx = DispatchContext {
            engine,
            filter: self.filter.clone(),
            options: self.options.clone(),
            limiter: self.limiter.clone(),
            outcomes: outcome_tx,
        };
        let listen = tokio::spawn(Self::listen(
            stream,
            stop_rx,
            ctx,
            self.window,
            self.overlap,
            self.min_residual,
            self.state.clone(),
        ));

        self.set_state(DriverState::Listening);
        *run = Some(ActiveRun {
            stop_tx: Some(stop_tx),
            listen,
            forwarder,
        });
        Ok(())
    }

    /// Ends the recording run, flushing the residual.
    ///
    /// Returns after the forwarder has settled, so every event that will be
    /// delivered has been. Stop while stopped is a no-op.
    pub async fn stop_recording(&self) {
        let mut run = self.run.lock().await;
        let Some(mut active) = run.take() else {
            return;
        };
        if let Some(stop) = active.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Err(e) = active.listen.await {
            warn!(error = %e, "listen loop panicked");
        }
        if let Err(e) = active.forwarder.await {
            warn!(error = %e, "forwarder panicked");
        }
    }

    /// Frame intake and chunk extraction. Runs until stopped or the stream
    /// ends, then flushes the residual.
    async fn listen(
        mut stream: AudioStream,
        mut stop_rx: oneshot::Receiver<()>,
        ctx: DispatchContext,
        window: usize,
        overlap: usize,
        min_residual: usize,
        state: Arc<StdMutex<DriverState>>,
    ) {
        let mut buffer = ChunkBuffer::new(window, overlap);
        let mut next_seq: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                frame = stream.next_frame() => match frame {
                    Some(frame) => {
                        buffer.push(&frame);
                        while let Some(chunk) = buffer.extract() {
                            Self::dispatch(&ctx, next_seq, chunk);
                            next_seq += 1;
                        }
                    }
                    None => break,
                }
            }
        }

        // The flush marker must reach the forwarder before the residual
        // result can, so post-stop in-flight results are provably discarded.
        let residual = buffer.take_residual(min_residual);
        let residual_seq = residual.as_ref().map(|_| next_seq);
        let _ = ctx
            .outcomes
            .send(ChunkOutcome::Flushed {
                residual: residual_seq,
            })
            .await;
        if let Some(samples) = residual {
            debug!(samples = samples.len(), "flushing residual");
            Self::dispatch(&ctx, next_seq, samples);
        }

        *state.lock().unwrap_or_else(|e| e.into_inner()) = DriverState::Ready;
    }

    /// Spawns one bounded-concurrency inference task; never blocks the
    /// frame path.
    fn dispatch(ctx: &DispatchContext, seq: u64, samples: Vec<f32>) {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = ctx.limiter.acquire_owned().await else {
                return;
            };
            let text = match ctx.engine.transcribe(&samples, &ctx.options).await {
                Ok(raw) => {
                    let accepted = ctx.filter.accept(&raw);
                    if accepted.is_none() {
                        debug!(seq, raw = %raw, "rejected model output");
                    }
                    accepted
                }
                Err(e) => {
                    warn!(seq, error = %e, "chunk inference failed");
                    None
                }
            };
            let _ = ctx.outcomes.send(ChunkOutcome::Done { seq, text }).await;
        });
    }

    /// Restores chunk order and emits transcription events. After the flush
    /// marker, only the residual result passes through.
    async fn forward(mut outcomes: mpsc::Receiver<ChunkOutcome>, events: mpsc::Sender<DriverEvent>) {
        let mut resequencer = Resequencer::new();
        let mut flushed: Option<Option<u64>> = None;

        while let Some(outcome) = outcomes.recv().await {
            match outcome {
                ChunkOutcome::Done { seq, text } => match flushed {
                    None => {
                        match text {
                            Some(text) => resequencer.push(seq, text),
                            None => resequencer.skip(seq),
                        }
                        for text in resequencer.drain_ready() {
                            let _ = events.send(DriverEvent::TranscriptionResult { text }).await;
                        }
                    }
                    Some(residual) => {
                        if residual == Some(seq) {
                            if let Some(text) = text {
                                let _ =
                                    events.send(DriverEvent::TranscriptionResult { text }).await;
                            }
                        } else {
                            debug!(seq, "discarding in-flight result after stop");
                        }
                    }
                },
                ChunkOutcome::Flushed { residual } => {
                    resequencer.reset();
                    flushed = Some(residual);
                }
            }
        }
    }
}
