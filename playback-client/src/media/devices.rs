use crate::media::LocalStream;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRequest {
    pub audio: bool,
    pub video: bool,
}

impl MediaRequest {
    pub fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }

    pub fn video_only() -> Self {
        Self {
            audio: false,
            video: true,
        }
    }
}

/// Capture seam. `None` means the user refused permission (or the device is
/// missing); callers treat it as an absent stream, never as an error.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, request: MediaRequest) -> Option<LocalStream>;

    async fn get_display_media(&self) -> Option<LocalStream>;
}
