//! External collaborator contracts (§6): the video-platform uploader and the
//! human-notification channel. Both are narrow async traits the core
//! consumes; the bundled implementations here (YouTube, ntfy.sh) are
//! reference collaborators, not part of the specified core itself.

pub mod error;
pub mod ntfy;
pub mod playlist_map;
pub mod uploader;

pub use error::{PlatformError, PlatformResult};
pub use ntfy::{NotificationAction, NotificationChannel, NtfyChannel};
pub use playlist_map::PlaylistMap;
pub use uploader::{VideoPlatformUploader, YoutubeUploader};
