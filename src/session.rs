//! Capture session record and durable recording state.
//!
//! A `Session` exists while exactly one capture is active. It is owned and
//! mutated only by the capture coordinator; everything else reads it. The
//! `isRecording` flag is additionally persisted through a `SessionStore` so
//! a control surface can restore its toggle position after reloading.

use crate::error::{Result, TabscribeError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifier of a capturable browsing surface (a tab).
pub type SurfaceId = u32;

/// One logical start-to-stop capture lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Monotonic id, unique per coordinator lifetime.
    pub id: u64,
    /// Surface whose audio is captured and which receives the transcript.
    pub target_surface: SurfaceId,
}

/// Durable key-value store for the `isRecording` flag.
pub trait SessionStore: Send + Sync {
    /// Persist the recording flag.
    fn set_recording(&self, recording: bool) -> Result<()>;

    /// Read the recording flag; absent state reads as `false`.
    fn is_recording(&self) -> Result<bool>;
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct StoredState {
    #[serde(rename = "isRecording", default)]
    is_recording: bool,
}

/// File-backed session store writing a small JSON document.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Creates a store persisting to the given path. The file is created on
    /// first write; a missing file reads as not recording.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default store location, `~/.local/share/tabscribe/session.json`.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("tabscribe")
            .join("session.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn set_recording(&self, recording: bool) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TabscribeError::SessionStore {
                message: format!("failed to create {}: {}", parent.display(), e),
            })?;
        }
        let state = StoredState {
            is_recording: recording,
        };
        let json = serde_json::to_string(&state).map_err(|e| TabscribeError::SessionStore {
            message: format!("serialize failed: {}", e),
        })?;
        std::fs::write(&self.path, json).map_err(|e| TabscribeError::SessionStore {
            message: format!("write to {} failed: {}", self.path.display(), e),
        })
    }

    fn is_recording(&self) -> Result<bool> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(TabscribeError::SessionStore {
                    message: format!("read from {} failed: {}", self.path.display(), e),
                });
            }
        };
        let state: StoredState =
            serde_json::from_str(&contents).map_err(|e| TabscribeError::SessionStore {
                message: format!("parse failed: {}", e),
            })?;
        Ok(state.is_recording)
    }
}

/// In-memory session store for tests and degraded mode.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    recording: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn set_recording(&self, recording: bool) -> Result<()> {
        self.recording.store(recording, Ordering::SeqCst);
        Ok(())
    }

    fn is_recording(&self) -> Result<bool> {
        Ok(self.recording.load(Ordering::SeqCst))
    }
}
