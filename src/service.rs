//! Streaming service bound to the active profile (`service.json`)

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::write_atomic;
use crate::constants::config::SERVICE_FILENAME;
use crate::constants::service::DEFAULT_TYPE;
use crate::modules::ModuleLoadReport;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl ServiceConfig {
    fn default_service() -> Self {
        Self {
            kind: DEFAULT_TYPE.to_string(),
            settings: Map::new(),
        }
    }
}

fn service_path(profile_dir: &Path) -> PathBuf {
    profile_dir.join(SERVICE_FILENAME)
}

fn load(path: &Path) -> Result<ServiceConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))
}

/// Bind the profile's saved service, or create and save the default one when
/// the saved service is missing, unreadable, or provided by no loaded module
pub fn init_service(profile_dir: &Path, modules: &ModuleLoadReport) -> Result<ServiceConfig> {
    let path = service_path(profile_dir);

    if path.exists() {
        match load(&path) {
            Ok(service) if modules.provides_service(&service.kind) => {
                info!(service = %service.kind, "Loaded streaming service");
                return Ok(service);
            }
            Ok(service) => {
                warn!(service = %service.kind, "Saved service type is not registered, using default")
            }
            Err(e) => warn!(error = %format!("{e:#}"), "Saved service is unusable, using default"),
        }
    }

    if !modules.provides_service(DEFAULT_TYPE) {
        bail!("No loaded module registers the '{DEFAULT_TYPE}' service");
    }

    let service = ServiceConfig::default_service();
    let json = serde_json::to_vec_pretty(&service)?;
    write_atomic(&path, &json)?;
    info!(service = %service.kind, path = %path.display(), "Created default streaming service");
    Ok(service)
}
