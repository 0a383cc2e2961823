//! Accumulating sample buffer with fixed-window extraction and overlap.
//!
//! Frames append to the tail; once a full window is buffered, the window is
//! extracted and the front half is discarded, so consecutive chunks share a
//! half-window of context. Word fragments cut at a boundary reappear intact
//! in the next chunk.

/// Sample buffer feeding the inference dispatch loop.
#[derive(Debug)]
pub struct ChunkBuffer {
    samples: Vec<f32>,
    window: usize,
    overlap: usize,
}

impl ChunkBuffer {
    /// Creates a buffer extracting `window`-sample chunks and retaining
    /// `overlap` trailing samples of each.
    pub fn new(window: usize, overlap: usize) -> Self {
        assert!(overlap < window, "overlap must be smaller than the window");
        Self {
            samples: Vec::with_capacity(window * 2),
            window,
            overlap,
        }
    }

    /// Appends one frame of samples.
    pub fn push(&mut self, frame: &[f32]) {
        self.samples.extend_from_slice(frame);
    }

    /// Buffered sample count.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Extracts the next full window, if one is buffered.
    ///
    /// The returned chunk is exactly `window` samples; the buffer keeps the
    /// trailing `overlap` samples of the window plus anything after it.
    pub fn extract(&mut self) -> Option<Vec<f32>> {
        if self.samples.len() < self.window {
            return None;
        }
        let chunk = self.samples[..self.window].to_vec();
        self.samples.drain(..self.window - self.overlap);
        Some(chunk)
    }

    /// Drains whatever remains, returning it when at least `min_samples`
    /// long. Shorter residuals are discarded either way.
    pub fn take_residual(&mut self, min_samples: usize) -> Option<Vec<f32>> {
        let residual = std::mem::take(&mut self.samples);
        if residual.len() >= min_samples {
            Some(residual)
        } else {
            None
        }
    }

    /// Discards all buffered samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
