//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// On-disk layout of the configuration root
pub mod config {
    /// Directory under the platform config dir
    pub const APP_DIR: &str = "broadcast-studio";

    /// Directory next to the executable used in portable mode
    pub const PORTABLE_DIR: &str = "config";

    /// Global user configuration file
    pub const USER_FILENAME: &str = "user.ini";

    /// Per-profile configuration file
    pub const PROFILE_FILENAME: &str = "basic.ini";

    /// Per-profile streaming service file
    pub const SERVICE_FILENAME: &str = "service.json";

    /// Profiles live in `<root>/basic/profiles/<dir>/`
    pub const PROFILES_DIR: &str = "basic/profiles";

    /// Scene collections live in `<root>/basic/scenes/<file>.json`
    pub const SCENES_DIR: &str = "basic/scenes";

    /// Per-user plugin directory
    pub const PLUGINS_DIR: &str = "plugins";

    /// Extension used for the temporary file during a safe save
    pub const TMP_EXTENSION: &str = "tmp";

    /// Name used when nothing has been persisted yet
    pub const DEFAULT_ENTITY_NAME: &str = "Untitled";
}

/// Canvas and scaling constants
pub mod video {
    /// Base canvas used for new users on displays larger than this
    pub const MODERN_BASE_WIDTH: u32 = 1920;
    pub const MODERN_BASE_HEIGHT: u32 = 1080;

    /// Default output resolution may not exceed this pixel count
    pub const MAX_DEFAULT_OUTPUT_PIXELS: u64 = 1280 * 720;

    /// Downscale factors tried in order when picking the default output size
    pub const SCALE_FACTORS: [f64; 11] = [
        1.0,
        1.25,
        1.0 / 0.75,
        1.5,
        1.0 / 0.6,
        1.75,
        2.0,
        2.25,
        2.5,
        2.75,
        3.0,
    ];

    /// Largest texture edge any backend accepts
    pub const MAX_DIMENSION: u32 = 16384;

    /// Renderer used when the user config does not name one
    #[cfg(target_os = "windows")]
    pub const DEFAULT_RENDERER: &str = "d3d11";
    #[cfg(not(target_os = "windows"))]
    pub const DEFAULT_RENDERER: &str = "opengl";

    /// Renderers the headless pipeline knows how to "load"
    pub const KNOWN_RENDERERS: &[&str] = &["opengl", "d3d11", "metal"];

    /// Recording container default
    #[cfg(target_os = "macos")]
    pub const DEFAULT_CONTAINER: &str = "hybrid_mov";
    #[cfg(not(target_os = "macos"))]
    pub const DEFAULT_CONTAINER: &str = "hybrid_mp4";
}

/// Audio constants
pub mod audio {
    /// Sample rates accepted by the audio pipeline
    pub const SUPPORTED_SAMPLE_RATES: &[u32] = &[44100, 48000];

    /// Fast meter decay rate (dB per second)
    pub const METER_DECAY_FAST: f64 = 23.53;
}

/// Encoder identifiers used for capability probing and defaults
pub mod encoders {
    /// Hardware H.264 encoder probed for simple-output defaults
    pub const NVENC_ID: &str = "ffmpeg_nvenc";

    /// Simple-output encoder tokens
    pub const SIMPLE_NVENC: &str = "nvenc";
    pub const SIMPLE_X264: &str = "x264";

    /// AAC encoders in preference order, before the universal fallback
    pub const AAC_PREFERENCE: &[&str] = &["CoreAudio_AAC", "libfdk_aac"];

    /// Software AAC encoder that is always present
    pub const AAC_FALLBACK: &str = "ffmpeg_aac";
}

/// Extension module classification
pub mod modules {
    /// Core modules shipped with the application, `|` separated.
    /// Overridden at build time through the `CORE_MODULES` environment variable.
    pub const DEFAULT_CORE_MODULES: &str = "obs-ffmpeg|obs-outputs|obs-x264|obs-filters|\
        obs-transitions|image-source|text-freetype2|rtmp-services|linux-capture|\
        linux-pulseaudio|linux-v4l2|vlc-video|frontend-tools|obs-websocket";

    /// First-party modules that let external code drive the application
    pub const UNSAFE_MODULES: &[&str] = &[
        "frontend-tools", // Scripting
        "obs-websocket",  // Remote control
    ];

    /// Manifest extension inside a module binary directory
    pub const MANIFEST_EXTENSION: &str = "json";

    /// Placeholder replaced with a module id in per-user search paths
    pub const MODULE_PLACEHOLDER: &str = "%module%";

    /// Environment pair that adds one extra search path
    pub const PLUGINS_PATH_ENV: &str = "BROADCAST_PLUGINS_PATH";
    pub const PLUGINS_DATA_PATH_ENV: &str = "BROADCAST_PLUGINS_DATA_PATH";
}

/// Streaming service constants
pub mod service {
    /// Service type used when none is saved or the saved one is unavailable
    pub const DEFAULT_TYPE: &str = "rtmp_common";
}

/// Scene collection document constants
pub mod scenes {
    /// Scene created inside a brand-new collection
    pub const DEFAULT_SCENE_NAME: &str = "Scene";
}

/// Log markers
pub mod log {
    pub const STARTUP_SEPARATOR: &str =
        "==== Startup complete ===============================================";
}
