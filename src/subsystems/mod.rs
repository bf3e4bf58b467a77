//! Resetters that apply a profile's settings to the video and audio pipelines
//!
//! The pipelines themselves are collaborators behind [`VideoPipeline`] and
//! [`AudioPipeline`]; the headless implementations here validate parameters
//! the way a real backend would and are used for dry runs and tests.

pub mod audio;
pub mod video;

pub use audio::{AudioPipeline, HeadlessAudio, apply_monitoring_device, reset_audio};
pub use video::{HeadlessVideo, VideoPipeline, reset_video};

/// Outcome of a video pipeline reset. Exactly one per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitResult {
    Success,
    ModuleNotFound,
    NotSupported,
    InvalidParam,
    CurrentlyActive,
    Fail,
}

impl InitResult {
    pub fn is_success(self) -> bool {
        self == InitResult::Success
    }
}
