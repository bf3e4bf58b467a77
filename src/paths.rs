//! Filesystem roots for configuration, bundled modules and recordings

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::config::{APP_DIR, PORTABLE_DIR};

/// Directory (next to the executable) holding bundled module manifests
const BUNDLED_MODULES_DIR: &str = "modules";

#[derive(Debug, Clone, PartialEq)]
pub struct AppPaths {
    pub config_root: PathBuf,
    pub module_dir: PathBuf,
    pub recording_path: PathBuf,
    pub portable: bool,
}

impl AppPaths {
    /// Resolve roots. Explicit directories win; portable mode keeps
    /// configuration next to the executable.
    pub fn resolve(
        config_dir: Option<PathBuf>,
        module_dir: Option<PathBuf>,
        portable: bool,
    ) -> Result<Self> {
        let exe_dir = || -> Result<PathBuf> {
            let exe = std::env::current_exe().context("Failed to locate the running executable")?;
            Ok(exe
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")))
        };

        let config_root = match config_dir {
            Some(dir) => dir,
            None if portable => exe_dir()?.join(PORTABLE_DIR),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR),
        };
        let module_dir = match module_dir {
            Some(dir) => dir,
            None => exe_dir()?.join(BUNDLED_MODULES_DIR),
        };
        let recording_path = dirs::video_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let paths = Self {
            config_root,
            module_dir,
            recording_path,
            portable,
        };
        info!(
            config = %paths.config_root.display(),
            modules = %paths.module_dir.display(),
            portable,
            "Resolved application paths"
        );
        Ok(paths)
    }
}
