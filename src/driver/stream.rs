//! Audio stream acquisition seam.
//!
//! A [`StreamHandle`] is redeemed for a frame stream: 16 kHz mono f32
//! samples in arbitrary-sized frames. The stream ends when the underlying
//! capture ends; the driver treats that as a stop request.

use crate::capture::surface::StreamHandle;
use crate::error::{Result, TabscribeError};
use tokio::sync::mpsc;

/// An open capture stream.
#[derive(Debug)]
pub struct AudioStream {
    frames: mpsc::Receiver<Vec<f32>>,
}

impl AudioStream {
    pub fn new(frames: mpsc::Receiver<Vec<f32>>) -> Self {
        Self { frames }
    }

    /// Next frame, or `None` when the capture has ended.
    pub async fn next_frame(&mut self) -> Option<Vec<f32>> {
        self.frames.recv().await
    }
}

/// Redeems stream handles for audio streams.
#[async_trait::async_trait]
pub trait StreamSource: Send + Sync {
    async fn open(&self, handle: &StreamHandle) -> Result<AudioStream>;
}

enum MockStream {
    /// Fixed frames delivered in order, then end-of-stream.
    Frames(Vec<Vec<f32>>),
    /// Caller-driven stream; frames arrive through the paired sender.
    Piped(Option<mpsc::Receiver<Vec<f32>>>),
    /// The capture had no audio track.
    NoAudioTrack,
}

/// Mock stream source for driver tests.
pub struct MockStreamSource {
    stream: std::sync::Mutex<MockStream>,
    opened: std::sync::Mutex<Vec<String>>,
}

impl MockStreamSource {
    /// Source yielding the given frames and then ending naturally.
    pub fn with_frames(frames: Vec<Vec<f32>>) -> Self {
        Self {
            stream: std::sync::Mutex::new(MockStream::Frames(frames)),
            opened: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Source whose frames are pushed by the test through the sender.
    /// Dropping the sender ends the stream.
    pub fn piped() -> (Self, mpsc::Sender<Vec<f32>>) {
        let (tx, rx) = mpsc::channel(64);
        let source = Self {
            stream: std::sync::Mutex::new(MockStream::Piped(Some(rx))),
            opened: std::sync::Mutex::new(Vec::new()),
        };
        (source, tx)
    }

    /// Source failing acquisition with a missing audio track.
    pub fn without_audio_track() -> Self {
        Self {
            stream: std::sync::Mutex::new(MockStream::NoAudioTrack),
            opened: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Stream ids opened so far, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl StreamSource for MockStreamSource {
    async fn open(&self, handle: &StreamHandle) -> Result<AudioStream> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle.stream_id.clone());

        let mut stream = self.stream.lock().unwrap_or_else(|e| e.into_inner());
        match &mut *stream {
            MockStream::Frames(frames) => {
                let (tx, rx) = mpsc::channel(frames.len().max(1));
                for frame in frames.drain(..) {
                    let _ = tx.try_send(frame);
                }
                Ok(AudioStream::new(rx))
            }
            MockStream::Piped(rx) => rx.take().map(AudioStream::new).ok_or_else(|| {
                TabscribeError::StreamAcquisition {
                    message: "stream already consumed".to_string(),
                }
            }),
            MockStream::NoAudioTrack => Err(TabscribeError::NoAudioTrack),
        }
    }
}
