//! Named configuration bundles: profiles and scene collections
//!
//! Both registries resolve "which one to activate" with the same precedence:
//! an explicitly requested name that exists, then the name persisted from the
//! previous session, then a brand-new entity named after the persisted name.

pub mod collection;
pub mod profile;

pub use collection::{ActiveCollection, SceneCollectionRegistry};
pub use profile::{ActiveProfile, ProfileRegistry};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::config::DEFAULT_ENTITY_NAME;
use crate::events::{EventBus, LifecycleEvent};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to open {kind} storage at {path:?}: {source}")]
    Storage {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load {kind} '{name}': {reason}")]
    Load {
        kind: &'static str,
        name: String,
        reason: String,
    },
}

/// Whether activating a freshly created entity announces it to subscribers.
///
/// `Suppress` keeps the long-standing behavior: only entities that existed
/// before this session produce list/changed notifications.
// TODO: confirm with product whether newly created entities should announce themselves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreationNotifications {
    #[default]
    Suppress,
    Emit,
}

/// A store of uniquely named entities that can be looked up or created
pub trait Registry {
    type Entry: Clone;

    /// Human-readable kind, used in logs and errors
    const KIND: &'static str;

    fn find(&self, name: &str) -> Option<&Self::Entry>;

    fn create(&mut self, name: &str) -> Result<Self::Entry, RegistryError>;
}

/// Result of resolution: the entry and whether it was created just now
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<E> {
    pub entry: E,
    pub created: bool,
}

/// Pick the entity to activate: requested (if it exists) > persisted (if it
/// exists) > newly created under the persisted name. An empty persisted name
/// stands for the default name.
pub fn resolve<R: Registry>(
    registry: &mut R,
    requested: Option<&str>,
    persisted: &str,
) -> Result<Resolved<R::Entry>, RegistryError> {
    if let Some(name) = requested.filter(|n| !n.trim().is_empty()) {
        match registry.find(name) {
            Some(entry) => {
                info!(kind = R::KIND, name = %name, "Using requested entity");
                return Ok(Resolved {
                    entry: entry.clone(),
                    created: false,
                });
            }
            None => warn!(kind = R::KIND, name = %name, "Requested entity does not exist"),
        }
    }

    let name = if persisted.trim().is_empty() {
        DEFAULT_ENTITY_NAME
    } else {
        persisted
    };

    if let Some(entry) = registry.find(name) {
        info!(kind = R::KIND, name = %name, "Using persisted entity");
        return Ok(Resolved {
            entry: entry.clone(),
            created: false,
        });
    }

    info!(kind = R::KIND, name = %name, "Creating new entity");
    let entry = registry.create(name)?;
    Ok(Resolved {
        entry,
        created: true,
    })
}

/// Publish the activation notifications, in order, unless the entity was
/// created just now and creation notifications are suppressed
pub fn announce_activation(
    events: &mut EventBus,
    sequence: Vec<LifecycleEvent>,
    created: bool,
    policy: CreationNotifications,
) -> bool {
    if created && policy == CreationNotifications::Suppress {
        return false;
    }
    for event in sequence {
        events.publish(event);
    }
    true
}

/// Filesystem-safe name: anything outside `[A-Za-z0-9 _-]` becomes `_`
pub(crate) fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        DEFAULT_ENTITY_NAME.to_string()
    } else {
        cleaned
    }
}

/// First `<dir>/<stem><suffix>` (then `<stem> 2<suffix>`, ...) that does not exist
pub(crate) fn unused_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{stem}{suffix}"));
    let mut n = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{stem} {n}{suffix}"));
        n += 1;
    }
    candidate
}

/// Create (if needed) and list a storage directory
pub(crate) fn open_storage(
    kind: &'static str,
    dir: &Path,
) -> Result<Vec<fs::DirEntry>, RegistryError> {
    let storage_err = |source| RegistryError::Storage {
        kind,
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(storage_err)?;
    let mut entries = fs::read_dir(dir)
        .map_err(storage_err)?
        .filter_map(|e| e.ok())
        .collect::<Vec<_>>();
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}
