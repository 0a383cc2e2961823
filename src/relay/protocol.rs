//! JSON message contract between the isolated execution contexts.
//!
//! Every message is a structured record with an `action` discriminator and
//! camelCase wire names. Control commands expect a definite response; driver
//! events and overlay commands are fire-and-forget.

use serde::{Deserialize, Serialize};

/// Commands sent by a control surface to the capture coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlCommand {
    /// Begin capturing the active surface.
    StartCapture,
    /// End the active capture session.
    StopCapture,
}

/// Definite response to a control command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl CaptureResponse {
    /// Successful response.
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Failed response carrying a human-readable message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Commands sent by the coordinator to the inference context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DriverCommand {
    /// Liveness probe.
    Ping,
    /// Begin buffering and transcribing the stream. Acked immediately;
    /// the real outcome arrives via status/transcription events.
    StartRecording { stream_id: String },
    /// Stop buffering; flush the residual if long enough.
    StopRecording,
}

/// Receipt acknowledgment for a driver command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverAck {
    pub received: bool,
}

/// Reply to a liveness probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingReply {
    /// `"ready"` once the engine is loaded, `"ok"` before.
    pub status: String,
}

impl PingReply {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    pub fn ready() -> Self {
        Self {
            status: "ready".to_string(),
        }
    }
}

/// Events emitted by the inference driver, routed through the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum DriverEvent {
    /// Accepted transcription text for one chunk.
    TranscriptionResult { text: String },
    /// Human-readable progress/status line for control surfaces.
    StatusUpdate { status: String },
}

/// Commands delivered to the presentation surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OverlayCommand {
    /// Liveness probe for the receiver script.
    Ping,
    /// Enter the listening visual state.
    StartTranscription,
    /// Exit the listening state and clear lines.
    StopTranscription,
    /// Render one transcript line.
    ShowTranscription { text: String },
    /// Show or hide the overlay outright.
    ToggleOverlay { enabled: bool },
}
