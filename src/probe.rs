//! Host capability probes consumed during defaults installation and video reset

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::constants::encoders;

/// Primary display size in logical pixels plus its scale factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f64,
}

impl DisplayGeometry {
    #[cfg(test)]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    /// Physical pixel size of the display
    pub fn pixel_size(&self) -> (u32, u32) {
        let ratio = if self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        };
        (
            (self.width as f64 * ratio) as u32,
            (self.height as f64 * ratio) as u32,
        )
    }
}

pub trait DisplayProbe {
    /// `None` when no display is attached
    fn primary_display(&self) -> Option<DisplayGeometry>;
}

pub trait EncoderProbe {
    fn encoder_available(&self, encoder_id: &str) -> bool;

    /// Every encoder id known to be available, for logging
    fn encoder_ids(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Everything defaults installation needs to ask the host
pub trait CapabilityProbe: DisplayProbe + EncoderProbe {}

impl<T: DisplayProbe + EncoderProbe> CapabilityProbe for T {}

/// Probe answering from a fixed display and the encoders detected on this machine
#[derive(Debug, Clone)]
pub struct HostProbe {
    display: Option<DisplayGeometry>,
    encoders: HashSet<String>,
}

impl HostProbe {
    pub fn new(display: Option<DisplayGeometry>, encoders: HashSet<String>) -> Self {
        Self { display, encoders }
    }

    /// Detect encoders available on the running host
    pub fn detect(display: Option<DisplayGeometry>) -> Self {
        let mut found = HashSet::new();
        found.insert(encoders::AAC_FALLBACK.to_string());
        found.insert("obs_x264".to_string());

        if Path::new("/dev/nvidiactl").exists() || Path::new("/dev/nvidia0").exists() {
            found.insert(encoders::NVENC_ID.to_string());
            found.insert("ffmpeg_hevc_nvenc".to_string());
        }
        if cfg!(target_os = "macos") {
            found.insert("CoreAudio_AAC".to_string());
            found.insert("com.apple.videotoolbox.videoencoder.ave.avc".to_string());
        }
        if Path::new("/dev/dri/renderD128").exists() {
            found.insert("ffmpeg_vaapi".to_string());
        }

        debug!(count = found.len(), "Detected host encoders");
        Self::new(display, found)
    }
}

impl DisplayProbe for HostProbe {
    fn primary_display(&self) -> Option<DisplayGeometry> {
        self.display
    }
}

impl EncoderProbe for HostProbe {
    fn encoder_available(&self, encoder_id: &str) -> bool {
        self.encoders.contains(encoder_id)
    }

    fn encoder_ids(&self) -> Vec<String> {
        self.encoders.iter().cloned().collect()
    }
}

/// Log the encoder list the way the startup log always has
pub fn log_encoders<P: EncoderProbe + ?Sized>(probe: &P) {
    let (mut audio, mut video): (Vec<String>, Vec<String>) = probe
        .encoder_ids()
        .into_iter()
        .partition(|id| id.to_ascii_lowercase().contains("aac") || id.contains("opus"));
    video.sort_unstable();
    audio.sort_unstable();

    info!("Available Encoders:");
    info!("  Video Encoders:");
    for id in &video {
        info!("\t- {id}");
    }
    info!("  Audio Encoders:");
    for id in &audio {
        info!("\t- {id}");
    }
}

/// Parse `WIDTHxHEIGHT`
pub fn parse_display_size(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size_applies_device_ratio() {
        let display = DisplayGeometry {
            width: 1440,
            height: 900,
            device_pixel_ratio: 2.0,
        };
        assert_eq!(display.pixel_size(), (2880, 1800));
    }

    #[test]
    fn test_pixel_size_ignores_nonsense_ratio() {
        let display = DisplayGeometry {
            width: 1920,
            height: 1080,
            device_pixel_ratio: 0.0,
        };
        assert_eq!(display.pixel_size(), (1920, 1080));
    }

    #[test]
    fn test_parse_display_size() {
        assert_eq!(parse_display_size("3840x2160"), Some((3840, 2160)));
        assert_eq!(parse_display_size("1280X720"), Some((1280, 720)));
        assert_eq!(parse_display_size("0x720"), None);
        assert_eq!(parse_display_size("wide"), None);
    }

    #[test]
    fn test_host_probe_always_has_software_aac() {
        let probe = HostProbe::detect(None);
        assert!(probe.encoder_available(encoders::AAC_FALLBACK));
        assert!(probe.primary_display().is_none());
    }
}
