//! Presentation sink: consumes overlay commands, ages the transcript board,
//! and publishes render state on a watch channel.
//!
//! The sink is the only writer of overlay state. Rendering is someone
//! else's job; whatever is on the watch channel is what should be on
//! screen.

use crate::config::OverlayConfig;
use crate::overlay::board::{LinePhase, TranscriptBoard};
use crate::relay::protocol::OverlayCommand;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::debug;

/// One renderable transcript line.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotLine {
    pub text: String,
    pub phase: LinePhase,
}

/// Render state published by the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySnapshot {
    pub visible: bool,
    pub lines: Vec<SnapshotLine>,
    /// No lines to show; the placeholder state.
    pub idle: bool,
}

impl Default for OverlaySnapshot {
    fn default() -> Self {
        Self {
            visible: false,
            lines: Vec::new(),
            idle: true,
        }
    }
}

/// Overlay state machine.
///
/// Visibility is the conjunction of two switches: `enabled` (the user
/// toggle, on by default) and `active` (a capture session is running).
/// Transcriptions arriving while not visible are dropped.
pub struct OverlaySink {
    board: TranscriptBoard,
    enabled: bool,
    active: bool,
}

impl OverlaySink {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            board: TranscriptBoard::new(
                config.max_lines,
                Duration::from_millis(config.line_ttl_ms),
                Duration::from_millis(config.fade_after_ms),
            ),
            enabled: true,
            active: false,
        }
    }

    fn visible(&self) -> bool {
        self.enabled && self.active
    }

    fn apply(&mut self, command: OverlayCommand, now: Instant) {
        match command {
            OverlayCommand::Ping => {}
            OverlayCommand::StartTranscription => {
                self.active = true;
                self.board.clear();
            }
            OverlayCommand::StopTranscription => {
                self.active = false;
                self.board.clear();
            }
            OverlayCommand::ShowTranscription { text } => {
                if self.visible() {
                    self.board.add(text, now);
                } else {
                    debug!("overlay hidden, dropping transcript line");
                }
            }
            OverlayCommand::ToggleOverlay { enabled } => {
                self.enabled = enabled;
            }
        }
    }

    fn snapshot(&self, now: Instant) -> OverlaySnapshot {
        OverlaySnapshot {
            visible: self.visible(),
            lines: self
                .board
                .lines(now)
                .into_iter()
                .map(|(line, phase)| SnapshotLine {
                    text: line.text.clone(),
                    phase,
                })
                .collect(),
            idle: self.board.is_idle(),
        }
    }

    /// Consumes commands until the channel closes, publishing a fresh
    /// snapshot after every command and every line-age transition.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<OverlayCommand>,
        state: watch::Sender<OverlaySnapshot>,
    ) {
        loop {
            let deadline = self.board.next_deadline(Instant::now());
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command, Instant::now()),
                    None => break,
                },
                _ = Self::sleep_until_opt(deadline) => {
                    self.board.expire(Instant::now());
                }
            }
            let _ = state.send(self.snapshot(Instant::now()));
        }
    }

    async fn sleep_until_opt(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
