//! Bounded transcript board with per-line aging.
//!
//! Lines enter at the bottom and leave three ways: evicted by newer lines
//! beyond the capacity, faded after the fade threshold, expired after the
//! TTL. Timing uses `tokio::time::Instant` so tests can drive the clock.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Visual phase of a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePhase {
    Fresh,
    /// Past the fade threshold, not yet expired.
    Fading,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub text: String,
    pub added_at: Instant,
}

/// Rolling window of recent transcript lines.
#[derive(Debug)]
pub struct TranscriptBoard {
    lines: VecDeque<TranscriptLine>,
    max_lines: usize,
    ttl: Duration,
    fade_after: Duration,
}

impl TranscriptBoard {
    pub fn new(max_lines: usize, ttl: Duration, fade_after: Duration) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines + 1),
            max_lines,
            ttl,
            fade_after,
        }
    }

    /// Appends a line, evicting the oldest beyond the capacity.
    pub fn add(&mut self, text: impl Into<String>, now: Instant) {
        self.lines.push_back(TranscriptLine {
            text: text.into(),
            added_at: now,
        });
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    /// Removes lines past the TTL.
    pub fn expire(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.lines.retain(|line| now - line.added_at < ttl);
    }

    /// Current lines with their phases, oldest first.
    pub fn lines(&self, now: Instant) -> Vec<(&TranscriptLine, LinePhase)> {
        self.lines
            .iter()
            .map(|line| {
                let phase = if now - line.added_at >= self.fade_after {
                    LinePhase::Fading
                } else {
                    LinePhase::Fresh
                };
                (line, phase)
            })
            .collect()
    }

    /// Empty board; the presentation layer shows its placeholder.
    pub fn is_idle(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Earliest instant at which a line changes phase or expires.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.lines
            .iter()
            .map(|line| {
                let fade_at = line.added_at + self.fade_after;
                if now < fade_at {
                    fade_at
                } else {
                    line.added_at + self.ttl
                }
            })
            .min()
    }
}
