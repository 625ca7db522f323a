//! Camera collaborator contract (§6) and the Dahua digest-auth reference
//! implementation the default configuration uses.

pub mod camera;
pub mod dahua;
pub mod error;

pub use camera::{Camera, RemoteRecording};
pub use dahua::{DahuaCamera, DahuaConfig};
pub use error::{CameraError, CameraResult};
