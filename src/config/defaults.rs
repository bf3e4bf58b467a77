//! Baseline values for every recognized profile key
//!
//! Static defaults come from [`DEFAULTS`]; the rest are computed from the
//! primary display, the host's encoders and the user's recording directory.
//! All of them land in the store's defaults layer, so user values always win.
//! The only user-layer writes are the canvas and output resolutions, which are
//! pinned once so later changes to this computation never resize an existing
//! canvas.

use anyhow::{Result, bail};
use tracing::{debug, info};

use super::LegacyFlags;
use super::store::{ConfigStore, ConfigValue};
use crate::constants::{audio, encoders, video};
use crate::probe::{CapabilityProbe, EncoderProbe};

/// Typed default value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
    Uint(u64),
    Bool(bool),
    Double(f64),
}

impl From<DefaultValue> for ConfigValue {
    fn from(value: DefaultValue) -> Self {
        match value {
            DefaultValue::Str(v) => ConfigValue::String(v.to_string()),
            DefaultValue::Int(v) => ConfigValue::Int(v),
            DefaultValue::Uint(v) => ConfigValue::Uint(v),
            DefaultValue::Bool(v) => ConfigValue::Bool(v),
            DefaultValue::Double(v) => ConfigValue::Double(v),
        }
    }
}

use DefaultValue::{Bool, Double, Int, Str, Uint};

/// `(section, key, default)` for every key with a fixed default
pub const DEFAULTS: &[(&str, &str, DefaultValue)] = &[
    ("Output", "Mode", Str("Simple")),
    ("Output", "FilenameFormatting", Str("%CCYY-%MM-%DD %hh-%mm-%ss")),
    ("Output", "DelayEnable", Bool(false)),
    ("Output", "DelaySec", Uint(20)),
    ("Output", "DelayPreserve", Bool(true)),
    ("Output", "Reconnect", Bool(true)),
    ("Output", "RetryDelay", Uint(2)),
    ("Output", "MaxRetries", Uint(25)),
    ("Output", "BindIP", Str("default")),
    ("Output", "IPFamily", Str("IPv4+IPv6")),
    ("Output", "NewSocketLoopEnable", Bool(false)),
    ("Output", "LowLatencyEnable", Bool(false)),
    ("Stream1", "IgnoreRecommended", Bool(false)),
    ("Stream1", "EnableMultitrackVideo", Bool(false)),
    ("Stream1", "MultitrackVideoMaximumAggregateBitrateAuto", Bool(true)),
    ("Stream1", "MultitrackVideoMaximumVideoTracksAuto", Bool(true)),
    ("SimpleOutput", "RecFormat2", Str(video::DEFAULT_CONTAINER)),
    ("SimpleOutput", "VBitrate", Uint(6000)),
    ("SimpleOutput", "ABitrate", Uint(160)),
    ("SimpleOutput", "UseAdvanced", Bool(false)),
    ("SimpleOutput", "Preset", Str("veryfast")),
    ("SimpleOutput", "NVENCPreset2", Str("p5")),
    ("SimpleOutput", "RecQuality", Str("Stream")),
    ("SimpleOutput", "RecRB", Bool(false)),
    ("SimpleOutput", "RecRBTime", Int(20)),
    ("SimpleOutput", "RecRBSize", Int(512)),
    ("SimpleOutput", "RecRBPrefix", Str("Replay")),
    ("SimpleOutput", "StreamAudioEncoder", Str("aac")),
    ("SimpleOutput", "RecAudioEncoder", Str("aac")),
    ("SimpleOutput", "RecTracks", Uint(1 << 0)),
    ("AdvOut", "ApplyServiceSettings", Bool(true)),
    ("AdvOut", "UseRescale", Bool(false)),
    ("AdvOut", "TrackIndex", Uint(1)),
    ("AdvOut", "VodTrackIndex", Uint(2)),
    ("AdvOut", "Encoder", Str("obs_x264")),
    ("AdvOut", "RecType", Str("Standard")),
    ("AdvOut", "RecFormat2", Str(video::DEFAULT_CONTAINER)),
    ("AdvOut", "RecUseRescale", Bool(false)),
    ("AdvOut", "RecTracks", Uint(1 << 0)),
    ("AdvOut", "RecEncoder", Str("none")),
    ("AdvOut", "FLVTrack", Uint(1)),
    ("AdvOut", "StreamMultiTrackAudioMixes", Uint(1)),
    ("AdvOut", "FFOutputToFile", Bool(true)),
    ("AdvOut", "FFExtension", Str("mp4")),
    ("AdvOut", "FFVBitrate", Uint(6000)),
    ("AdvOut", "FFVGOPSize", Uint(250)),
    ("AdvOut", "FFUseRescale", Bool(false)),
    ("AdvOut", "FFIgnoreCompat", Bool(false)),
    ("AdvOut", "FFABitrate", Uint(160)),
    ("AdvOut", "FFAudioMixes", Uint(1)),
    ("AdvOut", "Track1Bitrate", Uint(160)),
    ("AdvOut", "Track2Bitrate", Uint(160)),
    ("AdvOut", "Track3Bitrate", Uint(160)),
    ("AdvOut", "Track4Bitrate", Uint(160)),
    ("AdvOut", "Track5Bitrate", Uint(160)),
    ("AdvOut", "Track6Bitrate", Uint(160)),
    ("AdvOut", "RecSplitFileTime", Uint(15)),
    ("AdvOut", "RecSplitFileSize", Uint(2048)),
    ("AdvOut", "RecRB", Bool(false)),
    ("AdvOut", "RecRBTime", Uint(20)),
    ("AdvOut", "RecRBSize", Int(512)),
    ("Video", "FPSType", Uint(0)),
    ("Video", "FPSCommon", Str("30")),
    ("Video", "FPSInt", Uint(30)),
    ("Video", "FPSNum", Uint(30)),
    ("Video", "FPSDen", Uint(1)),
    ("Video", "ScaleType", Str("bicubic")),
    ("Video", "ColorFormat", Str("NV12")),
    ("Video", "ColorSpace", Str("709")),
    ("Video", "ColorRange", Str("Partial")),
    ("Video", "SdrWhiteLevel", Uint(300)),
    ("Video", "HdrNominalPeakLevel", Uint(1000)),
    ("Audio", "MonitoringDeviceId", Str("default")),
    ("Audio", "MonitoringDeviceName", Str("Default")),
    ("Audio", "SampleRate", Uint(48000)),
    ("Audio", "ChannelSetup", Str("Stereo")),
    ("Audio", "MeterDecayRate", Double(audio::METER_DECAY_FAST)),
    ("Audio", "PeakMeterType", Uint(0)),
];

/// Keys whose defaults are computed rather than listed in [`DEFAULTS`]
#[cfg(test)]
pub const COMPUTED_KEYS: &[(&str, &str)] = &[
    ("SimpleOutput", "FilePath"),
    ("AdvOut", "RecFilePath"),
    ("AdvOut", "FFFilePath"),
    ("Video", "BaseCX"),
    ("Video", "BaseCY"),
    ("Video", "OutputCX"),
    ("Video", "OutputCY"),
    ("SimpleOutput", "StreamEncoder"),
    ("SimpleOutput", "RecEncoder"),
    ("AdvOut", "AudioEncoder"),
    ("AdvOut", "RecAudioEncoder"),
];

/// Every key this installer knows about
#[cfg(test)]
pub fn recognized_keys() -> impl Iterator<Item = (&'static str, &'static str)> {
    DEFAULTS
        .iter()
        .map(|(section, key, _)| (*section, *key))
        .chain(COMPUTED_KEYS.iter().copied())
}

/// What installation did besides filling the defaults layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultsReport {
    pub base: (u32, u32),
    pub output: (u32, u32),
    /// Resolutions were written to the user layer and need saving
    pub pinned: bool,
}

pub struct DefaultsInstaller {
    legacy: LegacyFlags,
    recording_path: String,
}

impl DefaultsInstaller {
    pub fn new(legacy: LegacyFlags, recording_path: impl Into<String>) -> Self {
        Self {
            legacy,
            recording_path: recording_path.into(),
        }
    }

    /// Install every default. Fails only when no display is attached.
    pub fn install(
        &self,
        store: &mut ConfigStore,
        probe: &dyn CapabilityProbe,
    ) -> Result<DefaultsReport> {
        let Some(display) = probe.primary_display() else {
            bail!("There appears to be no monitors");
        };

        for (section, key, value) in DEFAULTS {
            store.set_default(section, key, *value);
        }
        for (section, key) in [
            ("SimpleOutput", "FilePath"),
            ("AdvOut", "RecFilePath"),
            ("AdvOut", "FFFilePath"),
        ] {
            store.set_default(section, key, self.recording_path.as_str());
        }

        let (cx, cy) = base_resolution(display.pixel_size(), &self.legacy);
        let (out_cx, out_cy) = default_output_resolution(cx, cy);
        let pinned_base = pin_resolution(store, "BaseCX", "BaseCY", cx, cy);
        let pinned_output = pin_resolution(store, "OutputCX", "OutputCY", out_cx, out_cy);

        self.install_encoder_defaults(store, probe);

        info!(
            base = %format!("{cx}x{cy}"),
            output = %format!("{out_cx}x{out_cy}"),
            pinned = pinned_base || pinned_output,
            "Installed profile defaults"
        );
        Ok(DefaultsReport {
            base: (cx, cy),
            output: (out_cx, out_cy),
            pinned: pinned_base || pinned_output,
        })
    }

    /// Encoder defaults chosen by probing in preference order
    pub fn install_encoder_defaults<P: EncoderProbe + ?Sized>(
        &self,
        store: &mut ConfigStore,
        probe: &P,
    ) {
        let use_hardware =
            probe.encoder_available(encoders::NVENC_ID) && !self.legacy.pre23_defaults;
        let video_encoder = if use_hardware {
            encoders::SIMPLE_NVENC
        } else {
            encoders::SIMPLE_X264
        };
        store.set_default("SimpleOutput", "StreamEncoder", video_encoder);
        store.set_default("SimpleOutput", "RecEncoder", video_encoder);

        let aac = encoders::AAC_PREFERENCE
            .iter()
            .copied()
            .find(|id| probe.encoder_available(id))
            .unwrap_or(encoders::AAC_FALLBACK);
        store.set_default("AdvOut", "AudioEncoder", aac);
        store.set_default("AdvOut", "RecAudioEncoder", aac);

        debug!(video = video_encoder, audio = aac, "Selected default encoders");
    }
}

/// Base canvas: the display's pixel size, capped to 1080p for new users
pub fn base_resolution((cx, cy): (u32, u32), legacy: &LegacyFlags) -> (u32, u32) {
    let modern = video::MODERN_BASE_WIDTH as u64 * video::MODERN_BASE_HEIGHT as u64;
    if !legacy.pre19_defaults && cx as u64 * cy as u64 > modern {
        (video::MODERN_BASE_WIDTH, video::MODERN_BASE_HEIGHT)
    } else {
        (cx, cy)
    }
}

/// Walk the scale factors until the pixel count fits in 720p. When none
/// fits, the last factor's result is used.
pub fn default_output_resolution(cx: u32, cy: u32) -> (u32, u32) {
    let (mut scale_cx, mut scale_cy) = (cx, cy);
    for factor in video::SCALE_FACTORS {
        if scale_cx as u64 * scale_cy as u64 <= video::MAX_DEFAULT_OUTPUT_PIXELS {
            break;
        }
        scale_cx = (cx as f64 / factor) as u32;
        scale_cy = (cy as f64 / factor) as u32;
    }
    (scale_cx, scale_cy)
}

fn pin_resolution(
    store: &mut ConfigStore,
    key_cx: &str,
    key_cy: &str,
    cx: u32,
    cy: u32,
) -> bool {
    store.set_default("Video", key_cx, cx);
    store.set_default("Video", key_cy, cy);

    if store.has_user_value("Video", key_cx) && store.has_user_value("Video", key_cy) {
        return false;
    }
    store.set("Video", key_cx, cx);
    store.set("Video", key_cy, cy);
    true
}
