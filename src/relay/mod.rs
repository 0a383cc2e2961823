//! Cross-context message relay: wire protocol and router.

pub mod protocol;
pub mod router;

pub use protocol::{
    CaptureResponse, ControlCommand, DriverAck, DriverCommand, DriverEvent, OverlayCommand,
    PingReply,
};
pub use router::{ControlHandler, Relay};
