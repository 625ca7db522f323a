//! The directory state store: per-group `state.json`, the process-wide
//! `camera_state.json` connect/disconnect log and watermark, and the
//! cross-process file lock both are built on (§3, §5, §6).

pub mod camera_state;
pub mod directory_state;
pub mod error;
pub mod lock;

pub use camera_state::{CameraState, CameraStateDocument, ConnectionEvent, ConnectionEventType};
pub use directory_state::{DirectoryState, StateDocument};
pub use error::{StateError, StateResult};
pub use lock::FileLock;
