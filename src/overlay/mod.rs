//! Transcript presentation: line board and the overlay state task.

pub mod board;
pub mod sink;

pub use board::{LinePhase, TranscriptBoard, TranscriptLine};
pub use sink::{OverlaySink, OverlaySnapshot, SnapshotLine};
