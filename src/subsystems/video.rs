use tracing::{info, warn};

use super::InitResult;
use crate::config::ConfigStore;
use crate::constants::video;
use crate::events::{EventBus, LifecycleEvent};

/// Scaling algorithm. Discriminants are the values persisted in profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleType {
    Disable = 0,
    Point = 1,
    Bicubic = 2,
    Bilinear = 3,
    Lanczos = 4,
    Area = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Nv12,
    I420,
    I444,
    P010,
    I010,
    P216,
    P416,
    Bgra,
}

impl VideoFormat {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "NV12" => Self::Nv12,
            "I420" => Self::I420,
            "I444" => Self::I444,
            "P010" => Self::P010,
            "I010" => Self::I010,
            "P216" => Self::P216,
            "P416" => Self::P416,
            "RGB" | "BGRA" => Self::Bgra,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Cs601,
    Cs709,
    Srgb,
    Cs2100Pq,
    Cs2100Hlg,
}

impl ColorSpace {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "601" => Self::Cs601,
            "709" => Self::Cs709,
            "sRGB" => Self::Srgb,
            "2100PQ" => Self::Cs2100Pq,
            "2100HLG" => Self::Cs2100Hlg,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    Partial,
    Full,
}

/// Everything the video pipeline needs for a reset
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub graphics_module: String,
    pub fps_num: u32,
    pub fps_den: u32,
    pub base_width: u32,
    pub base_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub output_format: VideoFormat,
    pub colorspace: ColorSpace,
    pub range: ColorRange,
    pub adapter: u32,
    pub gpu_conversion: bool,
    pub scale_type: ScaleType,
}

impl VideoInfo {
    /// Read video settings from the active profile plus the user config
    /// (renderer and adapter are per-machine, not per-profile)
    pub fn from_config(profile: &ConfigStore, user: &ConfigStore) -> Self {
        let (fps_num, fps_den) = config_fps(profile);

        let format_token = profile.get_str("Video", "ColorFormat").unwrap_or("NV12");
        let output_format = VideoFormat::parse(format_token).unwrap_or_else(|| {
            warn!(format = format_token, "Unknown color format, using NV12");
            VideoFormat::Nv12
        });
        let space_token = profile.get_str("Video", "ColorSpace").unwrap_or("709");
        let colorspace = ColorSpace::parse(space_token).unwrap_or_else(|| {
            warn!(space = space_token, "Unknown color space, using 709");
            ColorSpace::Cs709
        });
        let range = match profile.get_str("Video", "ColorRange") {
            Some(r) if r.eq_ignore_ascii_case("Full") => ColorRange::Full,
            _ => ColorRange::Partial,
        };

        Self {
            graphics_module: user
                .get_str("Video", "Renderer")
                .unwrap_or(video::DEFAULT_RENDERER)
                .to_string(),
            fps_num,
            fps_den,
            base_width: read_u32(profile, "BaseCX"),
            base_height: read_u32(profile, "BaseCY"),
            output_width: read_u32(profile, "OutputCX"),
            output_height: read_u32(profile, "OutputCY"),
            output_format,
            colorspace,
            range,
            adapter: user
                .get_uint("Video", "AdapterIdx")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            gpu_conversion: true,
            scale_type: ScaleType::Bicubic,
        }
    }
}

fn read_u32(store: &ConfigStore, key: &str) -> u32 {
    store
        .get_uint("Video", key)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

/// Frame rate as a fraction, from whichever FPS representation is selected
pub fn config_fps(store: &ConfigStore) -> (u32, u32) {
    let read = |key: &str| store.get_uint("Video", key).and_then(|v| u32::try_from(v).ok());
    match store.get_uint("Video", "FPSType").unwrap_or(0) {
        1 => (read("FPSInt").unwrap_or(30), 1),
        2 => (read("FPSNum").unwrap_or(30), read("FPSDen").unwrap_or(1)),
        _ => common_fps(store.get_str("Video", "FPSCommon").unwrap_or("30")),
    }
}

fn common_fps(token: &str) -> (u32, u32) {
    match token.trim() {
        "10" => (10, 1),
        "20" => (20, 1),
        "24 NTSC" => (24000, 1001),
        "25" | "25 PAL" => (25, 1),
        "29.97" => (30000, 1001),
        "48" => (48, 1),
        "50 PAL" => (50, 1),
        "59.94" => (60000, 1001),
        "60" => (60, 1),
        _ => (30, 1),
    }
}

pub trait VideoPipeline {
    /// Whether any output (stream, recording, replay buffer) is running
    fn output_active(&self) -> bool;

    fn reset_video(&mut self, info: &VideoInfo) -> InitResult;
}

/// Apply the profile's video settings. A running output makes this a no-op
/// that reports [`InitResult::CurrentlyActive`]. Failure codes are returned as-is.
pub fn reset_video(
    profile: &ConfigStore,
    user: &ConfigStore,
    pipeline: &mut dyn VideoPipeline,
    events: &mut EventBus,
) -> InitResult {
    if pipeline.output_active() {
        warn!("Video reset requested while an output is active");
        return InitResult::CurrentlyActive;
    }

    let info = VideoInfo::from_config(profile, user);
    let result = pipeline.reset_video(&info);

    if result.is_success() {
        info!(
            renderer = %info.graphics_module,
            base = %format!("{}x{}", info.base_width, info.base_height),
            output = %format!("{}x{}", info.output_width, info.output_height),
            fps = %format!("{}/{}", info.fps_num, info.fps_den),
            "Video reset"
        );
        events.publish(LifecycleEvent::CanvasResized {
            width: info.base_width,
            height: info.base_height,
        });
        events.publish(LifecycleEvent::OutputResized {
            width: info.output_width,
            height: info.output_height,
        });
    } else {
        warn!(result = ?result, "Video reset failed");
    }
    result
}

/// Video backend that validates parameters without touching a GPU
#[derive(Debug, Default)]
pub struct HeadlessVideo {
    pub outputs_active: bool,
    pub current: Option<VideoInfo>,
}

impl HeadlessVideo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoPipeline for HeadlessVideo {
    fn output_active(&self) -> bool {
        self.outputs_active
    }

    fn reset_video(&mut self, info: &VideoInfo) -> InitResult {
        if !video::KNOWN_RENDERERS.contains(&info.graphics_module.as_str()) {
            return InitResult::ModuleNotFound;
        }
        let dims = [
            info.base_width,
            info.base_height,
            info.output_width,
            info.output_height,
        ];
        if dims.iter().any(|&d| d == 0 || d > video::MAX_DIMENSION) {
            return InitResult::InvalidParam;
        }
        if info.fps_num == 0 || info.fps_den == 0 {
            return InitResult::InvalidParam;
        }
        self.current = Some(info.clone());
        InitResult::Success
    }
}
