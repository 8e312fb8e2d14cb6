pub mod api;
pub mod config;
pub mod directory;
pub mod error;
pub mod grid;
pub mod picker;
pub mod quality;
pub mod session;
pub mod state;
pub mod transport;
pub mod wall;
pub mod websocket;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{TransportKind, WallConfig};
pub use directory::{CameraDirectory, DirectoryPoller, HttpCameraDirectory, StaticDirectory};
pub use error::WallError;
pub use grid::GridSize;
pub use quality::{BitrateLevel, QualityPolicy, QualityPreset, StreamSettings};
pub use session::{RetryPolicy, SessionEvent, SessionState, StreamSession};
pub use state::AppState;
pub use transport::{HttpMediaTransport, MediaTransport, SimulatedTransport, Telemetry};
pub use wall::{
    spawn_session_pump, SharedWall, SlotView, StalePolicy, VideoWall, WallEvent, WallOptions,
    WallSnapshot,
};
