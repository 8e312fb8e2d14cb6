pub mod cameras;
pub mod validation;

pub use cameras::{Camera, CameraPage, CameraProtocol, CameraStatus};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
