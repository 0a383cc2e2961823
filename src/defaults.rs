//! Default configuration constants for tabscribe.
//!
//! Shared across configuration types and the pipeline itself so the
//! chunking, filtering and overlay behavior stay consistent.

/// Audio sample rate in Hz.
///
/// 16kHz is the standard input rate for Whisper-family models; the capture
/// subsystem is responsible for delivering mono f32 frames at this rate.
pub const SAMPLE_RATE: u32 = 16_000;

/// Chunk window duration in seconds.
///
/// Each inference pass sees this much audio. 3 seconds keeps latency low
/// enough for live captions while giving the model usable context.
pub const CHUNK_WINDOW_SECS: u32 = 3;

/// Chunk window size in samples.
pub const CHUNK_WINDOW_SAMPLES: usize = (SAMPLE_RATE * CHUNK_WINDOW_SECS) as usize;

/// Samples retained after each chunk extraction (half the window).
///
/// Keeping the trailing half of the window avoids cutting words at chunk
/// boundaries; the next chunk re-reads them.
pub const OVERLAP_SAMPLES: usize = CHUNK_WINDOW_SAMPLES / 2;

/// Minimum residual buffer length worth a final inference pass at stop time.
pub const MIN_RESIDUAL_SAMPLES: usize = SAMPLE_RATE as usize;

/// Minimum accepted transcription length in characters.
///
/// One- and two-character results are noise or punctuation fragments.
pub const MIN_ACCEPTED_CHARS: usize = 3;

/// Filler phrases rejected case-insensitively wherever they appear.
///
/// Whisper hallucinates these on silence and music: the affirmation that
/// closes narrated videos, and captioning credits.
pub const FILLER_PHRASES: &[&str] = &["thank you", "subtitle"];

/// Maximum transcript lines shown at once; oldest is evicted first.
pub const MAX_TRANSCRIPT_LINES: usize = 3;

/// Line time-to-live in milliseconds; removal is unconditional.
pub const LINE_TTL_MS: u64 = 10_000;

/// Age in milliseconds at which a line enters its fading phase.
pub const LINE_FADE_MS: u64 = 8_000;

/// Liveness-probe timeout for the inference context, in milliseconds.
pub const LIVENESS_TIMEOUT_MS: u64 = 2_000;

/// Start-acknowledgment timeout for the inference context, in milliseconds.
pub const START_ACK_TIMEOUT_MS: u64 = 5_000;

/// Settle delay after injecting the overlay receiver, in milliseconds.
pub const INJECT_SETTLE_MS: u64 = 100;

/// Default speech-to-text model identifier.
pub const DEFAULT_MODEL: &str = "whisper-tiny.en";

/// Default transcription language.
pub const DEFAULT_LANGUAGE: &str = "english";

/// Maximum inference tasks running concurrently per driver.
///
/// Chunks keep accumulating while inference runs; two in flight absorbs
/// jitter without letting a slow model pile up unbounded work.
pub const MAX_CONCURRENT_INFERENCE: usize = 2;
