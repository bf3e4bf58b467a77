//! Extension module policy and discovery
//!
//! - **Classification**: which module ids are core and which are first-party
//!   but unsafe, taken from build configuration
//! - **Allow list**: what may load for a given safety mode
//! - **Loader**: walks search paths for `<id>.json` manifests

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::bootstrap::BootstrapError;
use crate::constants::config::PLUGINS_DIR;
use crate::constants::modules::{
    DEFAULT_CORE_MODULES, MANIFEST_EXTENSION, MODULE_PLACEHOLDER, PLUGINS_DATA_PATH_ENV,
    PLUGINS_PATH_ENV, UNSAFE_MODULES,
};

/// Build-time split of bundled modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleClassification {
    core: BTreeSet<String>,
    unsafe_first_party: BTreeSet<String>,
}

impl ModuleClassification {
    /// Classification compiled into this binary (`CORE_MODULES` at build time)
    pub fn from_build_config() -> Result<Self, BootstrapError> {
        Self::parse(
            option_env!("CORE_MODULES").unwrap_or(DEFAULT_CORE_MODULES),
            UNSAFE_MODULES,
        )
    }

    /// Split a `|` separated bundled-module list. Ids also named in
    /// `unsafe_ids` are unsafe; the rest are core.
    pub fn parse(list: &str, unsafe_ids: &[&str]) -> Result<Self, BootstrapError> {
        let mut core = BTreeSet::new();
        let mut unsafe_first_party = BTreeSet::new();

        for id in list.split('|').map(str::trim).filter(|id| !id.is_empty()) {
            if unsafe_ids.contains(&id) {
                unsafe_first_party.insert(id.to_string());
            } else {
                core.insert(id.to_string());
            }
        }

        if core.is_empty() && unsafe_first_party.is_empty() {
            return Err(BootstrapError::ModuleClassification(
                "bundled module list is empty".to_string(),
            ));
        }
        Ok(Self {
            core,
            unsafe_first_party,
        })
    }

    #[cfg(test)]
    pub fn core(&self) -> &BTreeSet<String> {
        &self.core
    }

    #[cfg(test)]
    pub fn unsafe_first_party(&self) -> &BTreeSet<String> {
        &self.unsafe_first_party
    }

    /// Every bundled module, regardless of safety
    pub fn bundled(&self) -> BTreeSet<String> {
        self.core.union(&self.unsafe_first_party).cloned().collect()
    }

    /// Modules permitted to load.
    ///
    /// The third-party switch always admits every bundled module, so with
    /// both flags set the unsafe first-party modules load alongside core.
    pub fn allow_list(&self, safe_mode: bool, disallow_third_party: bool) -> AllowList {
        match (safe_mode, disallow_third_party) {
            (false, false) => AllowList::Unrestricted,
            (_, true) => AllowList::Only(self.bundled()),
            (true, false) => AllowList::Only(self.core.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    Unrestricted,
    Only(BTreeSet<String>),
}

impl AllowList {
    pub fn permits(&self, id: &str) -> bool {
        match self {
            AllowList::Unrestricted => true,
            AllowList::Only(ids) => ids.contains(id),
        }
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, AllowList::Only(_))
    }
}

/// A binary/data directory pair. Either may contain `%module%`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSearchPath {
    pub bin: String,
    pub data: String,
}

impl ModuleSearchPath {
    pub fn new(bin: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            data: data.into(),
        }
    }

    /// The directory modules are installed in
    pub fn bundled(module_dir: &Path) -> Self {
        let bin = module_dir.to_string_lossy().into_owned();
        let data = module_dir
            .join("data")
            .join(MODULE_PLACEHOLDER)
            .to_string_lossy()
            .into_owned();
        Self { bin, data }
    }

    fn bin_for(&self, id: &str) -> PathBuf {
        PathBuf::from(self.bin.replace(MODULE_PLACEHOLDER, id))
    }

    fn data_for(&self, id: &str) -> PathBuf {
        PathBuf::from(self.data.replace(MODULE_PLACEHOLDER, id))
    }

    /// Module ids discoverable under this path, sorted
    fn discover(&self) -> Vec<String> {
        let mut ids = Vec::new();

        if let Some((prefix, _)) = self.bin.split_once(MODULE_PLACEHOLDER) {
            // One directory per module: <prefix><id>/...
            for entry in read_dir_sorted(Path::new(prefix)) {
                if !entry.is_dir() {
                    continue;
                }
                if let Some(id) = entry.file_name().and_then(|n| n.to_str()) {
                    ids.push(id.to_string());
                }
            }
        } else {
            for entry in read_dir_sorted(Path::new(&self.bin)) {
                if entry.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION) {
                    continue;
                }
                if let Some(id) = entry.file_stem().and_then(|n| n.to_str()) {
                    ids.push(id.to_string());
                }
            }
        }
        ids
    }
}

fn read_dir_sorted(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => {
            let mut paths: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
            paths.sort();
            paths
        }
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Module search path not readable");
            Vec::new()
        }
    }
}

/// Search paths beyond the bundled directory: the environment pair (when both
/// are set) and, outside portable mode, the per-user plugin directory
pub fn extra_module_paths(
    env_bin: Option<String>,
    env_data: Option<String>,
    config_root: &Path,
    portable: bool,
) -> Vec<ModuleSearchPath> {
    let mut paths = Vec::new();

    if let (Some(bin), Some(data)) = (env_bin, env_data)
        && !bin.is_empty()
        && !data.is_empty()
    {
        paths.push(ModuleSearchPath::new(
            bin,
            format!("{data}/{MODULE_PLACEHOLDER}"),
        ));
    }

    if portable {
        return paths;
    }

    let user_dir = config_root.join(PLUGINS_DIR).join(MODULE_PLACEHOLDER);
    paths.push(ModuleSearchPath::new(
        user_dir.join("bin").to_string_lossy(),
        user_dir.join("data").to_string_lossy(),
    ));
    paths
}

/// [`extra_module_paths`] using the process environment
pub fn extra_module_paths_from_env(config_root: &Path, portable: bool) -> Vec<ModuleSearchPath> {
    extra_module_paths(
        std::env::var(PLUGINS_PATH_ENV).ok(),
        std::env::var(PLUGINS_DATA_PATH_ENV).ok(),
        config_root,
        portable,
    )
}

/// Contents of `<id>.json` inside a module's binary directory
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ModuleManifest {
    #[serde(default)]
    pub description: String,

    /// Streaming service types this module registers
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModule {
    pub id: String,
    pub data_dir: PathBuf,
    pub manifest: ModuleManifest,
}

/// Result of one loading pass. `failed` is complete only once the pass returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleLoadReport {
    pub loaded: Vec<LoadedModule>,
    pub failed: Vec<String>,
}

impl ModuleLoadReport {
    #[cfg(test)]
    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded.iter().any(|m| m.id == id)
    }

    /// Whether some loaded module registers the service type
    pub fn provides_service(&self, service: &str) -> bool {
        self.loaded
            .iter()
            .any(|m| m.manifest.services.iter().any(|s| s == service))
    }
}

pub trait ModuleLoader {
    /// Load every permitted module found on `paths`. A module that fails is
    /// recorded and the pass continues.
    fn load_all(&mut self, allow: &AllowList, paths: &[ModuleSearchPath]) -> ModuleLoadReport;
}

/// Loads modules described by JSON manifests on disk
#[derive(Debug, Default)]
pub struct FsModuleLoader;

impl FsModuleLoader {
    pub fn new() -> Self {
        Self
    }

    fn load_one(path: &ModuleSearchPath, id: &str) -> anyhow::Result<LoadedModule> {
        use anyhow::Context;

        let manifest_path = path
            .bin_for(id)
            .join(format!("{id}.{MANIFEST_EXTENSION}"));
        let text = fs::read_to_string(&manifest_path)
            .with_context(|| format!("Failed to read manifest {:?}", manifest_path))?;
        let manifest: ModuleManifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest {:?}", manifest_path))?;

        Ok(LoadedModule {
            id: id.to_string(),
            data_dir: path.data_for(id),
            manifest,
        })
    }
}

impl ModuleLoader for FsModuleLoader {
    fn load_all(&mut self, allow: &AllowList, paths: &[ModuleSearchPath]) -> ModuleLoadReport {
        let mut report = ModuleLoadReport::default();
        let mut seen = BTreeSet::new();

        for path in paths {
            debug!(bin = %path.bin, data = %path.data, "Scanning module path");
            for id in path.discover() {
                // First path that provides an id wins
                if !seen.insert(id.clone()) {
                    continue;
                }
                if !allow.permits(&id) {
                    info!(module = %id, "Skipping module outside the allow list");
                    continue;
                }
                match Self::load_one(path, &id) {
                    Ok(module) => {
                        debug!(module = %id, description = %module.manifest.description, "Loaded module");
                        report.loaded.push(module);
                    }
                    Err(e) => {
                        warn!(module = %id, error = %format!("{e:#}"), "Failed to load module");
                        report.failed.push(id);
                    }
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Module loading finished"
        );
        report
    }
}
