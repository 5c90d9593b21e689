use crate::media::{LocalStream, MediaDevices, MediaRequest, TrackKind, TrackSource};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

/// 20 ms of Opus silence.
const OPUS_SILENCE: &[u8] = &[0xf8, 0xff, 0xfe];

/// VP8 key frame header for a 16x16 picture with an empty first partition.
const VP8_BLANK: &[u8] = &[0x10, 0x00, 0x00, 0x9d, 0x01, 0x2a, 0x10, 0x00, 0x10, 0x00];

/// The frame synthetic capture produces for a track of `kind`, and how often.
pub fn synthetic_frame(kind: TrackKind) -> (&'static [u8], Duration) {
    match kind {
        TrackKind::Audio => (OPUS_SILENCE, Duration::from_millis(20)),
        TrackKind::Video => (VP8_BLANK, Duration::from_millis(33)),
    }
}

/// Hardware-free capture: every request yields fresh live tracks unless the
/// source has been denied.
#[derive(Debug, Default)]
pub struct SyntheticDevices {
    deny_microphone: AtomicBool,
    deny_camera: AtomicBool,
    deny_screen: AtomicBool,
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, source: TrackSource, denied: bool) {
        let flag = match source {
            TrackSource::Microphone => &self.deny_microphone,
            TrackSource::Camera => &self.deny_camera,
            TrackSource::Screen => &self.deny_screen,
        };
        flag.store(denied, Ordering::SeqCst);
    }

    fn is_denied(&self, source: TrackSource) -> bool {
        match source {
            TrackSource::Microphone => self.deny_microphone.load(Ordering::SeqCst),
            TrackSource::Camera => self.deny_camera.load(Ordering::SeqCst),
            TrackSource::Screen => self.deny_screen.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn get_user_media(&self, request: MediaRequest) -> Option<LocalStream> {
        let mut sources = Vec::new();
        if request.audio {
            sources.push(TrackSource::Microphone);
        }
        if request.video {
            sources.push(TrackSource::Camera);
        }

        // Like a browser prompt, one refused source fails the whole request.
        if sources.is_empty() || sources.iter().any(|s| self.is_denied(*s)) {
            info!(?request, "User media denied");
            return None;
        }
        Some(LocalStream::capture(&sources))
    }

    async fn get_display_media(&self) -> Option<LocalStream> {
        if self.is_denied(TrackSource::Screen) {
            info!("Display media denied");
            return None;
        }
        Some(LocalStream::capture(&[TrackSource::Screen]))
    }
}
