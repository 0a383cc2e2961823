//! Capture coordination: surface resolution and session lifecycle.

pub mod coordinator;
pub mod surface;

pub use coordinator::{CaptureCoordinator, CoordinatorTimeouts, DriverPort};
pub use surface::{MockSurfaceDirectory, StreamHandle, SurfaceDirectory, SurfaceInfo};
