//! Profile registry
//!
//! A profile is a directory under `basic/profiles/` holding `basic.ini`
//! (whose `[General] Name` is the profile name) and `service.json`.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{Registry, RegistryError, open_storage, sanitize_file_name, unused_path};
use crate::config::ConfigStore;
use crate::constants::config::{PROFILE_FILENAME, PROFILES_DIR};
use crate::events::LifecycleEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub name: String,
    pub dir: PathBuf,
}

impl ProfileEntry {
    pub fn config_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILENAME)
    }
}

/// The profile currently bound to the session
#[derive(Debug)]
pub struct ActiveProfile {
    pub entry: ProfileEntry,
    pub config: ConfigStore,
}

impl ActiveProfile {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn dir(&self) -> &Path {
        &self.entry.dir
    }
}

pub struct ProfileRegistry {
    dir: PathBuf,
    profiles: Vec<ProfileEntry>,
}

impl ProfileRegistry {
    /// Open (creating if needed) the profile storage under `config_root`
    pub fn open(config_root: &Path) -> Result<Self, RegistryError> {
        let dir = config_root.join(PROFILES_DIR);
        let mut profiles = Vec::new();

        for entry in open_storage(Self::KIND, &dir)? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let config_path = path.join(PROFILE_FILENAME);
            if !config_path.is_file() {
                debug!(dir = %path.display(), "Skipping profile directory without basic.ini");
                continue;
            }
            match ConfigStore::load(&config_path) {
                Ok(store) => {
                    let name = store
                        .get_str("General", "Name")
                        .map(str::to_string)
                        .unwrap_or_else(|| entry.file_name().to_string_lossy().into_owned());
                    if profiles.iter().any(|p: &ProfileEntry| p.name == name) {
                        warn!(profile = %name, dir = %path.display(), "Duplicate profile name, ignoring");
                        continue;
                    }
                    profiles.push(ProfileEntry { name, dir: path });
                }
                Err(e) => warn!(dir = %path.display(), error = %e, "Unreadable profile, ignoring"),
            }
        }

        info!(count = profiles.len(), "Found profiles");
        Ok(Self { dir, profiles })
    }

    #[cfg(test)]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    /// Load the profile's config into an active slot
    pub fn activate(&self, entry: &ProfileEntry) -> Result<ActiveProfile, RegistryError> {
        let config = ConfigStore::load(entry.config_path()).map_err(|e| RegistryError::Load {
            kind: Self::KIND,
            name: entry.name.clone(),
            reason: format!("{e:#}"),
        })?;
        info!(profile = %entry.name, "Activated profile");
        Ok(ActiveProfile {
            entry: entry.clone(),
            config,
        })
    }

    /// Events announcing an activated profile, in publish order
    pub fn activation_events(entry: &ProfileEntry) -> Vec<LifecycleEvent> {
        vec![
            LifecycleEvent::ProfileListChanged,
            LifecycleEvent::ProfileChanged {
                name: entry.name.clone(),
            },
        ]
    }
}

impl Registry for ProfileRegistry {
    type Entry = ProfileEntry;
    const KIND: &'static str = "profile";

    fn find(&self, name: &str) -> Option<&ProfileEntry> {
        self.profiles.iter().find(|p| p.name == name)
    }

    fn create(&mut self, name: &str) -> Result<ProfileEntry, RegistryError> {
        let dir = unused_path(&self.dir, &sanitize_file_name(name), "");
        let storage_err = |source| RegistryError::Storage {
            kind: Self::KIND,
            path: dir.clone(),
            source,
        };
        std::fs::create_dir_all(&dir).map_err(storage_err)?;

        let mut store = ConfigStore::load(dir.join(PROFILE_FILENAME)).map_err(|e| {
            RegistryError::Load {
                kind: Self::KIND,
                name: name.to_string(),
                reason: format!("{e:#}"),
            }
        })?;
        store.set("General", "Name", name);
        store.save_safe().map_err(|e| RegistryError::Load {
            kind: Self::KIND,
            name: name.to_string(),
            reason: format!("{e:#}"),
        })?;

        let entry = ProfileEntry {
            name: name.to_string(),
            dir,
        };
        info!(profile = %name, dir = %entry.dir.display(), "Created profile");
        self.profiles.push(entry.clone());
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::resolve;
    use std::fs;

    fn write_profile(root: &Path, dir: &str, name: &str) {
        let path = root.join(PROFILES_DIR).join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(
            path.join(PROFILE_FILENAME),
            format!("[General]\nName={name}\n[Video]\nBaseCX=1280\n"),
        )
        .unwrap();
    }

    #[test]
    fn test_open_lists_existing_profiles() {
        let root = tempfile::tempdir().unwrap();
        write_profile(root.path(), "Gaming", "Gaming");
        write_profile(root.path(), "pod", "Podcast Setup");
        fs::create_dir_all(root.path().join(PROFILES_DIR).join("empty")).unwrap();

        let registry = ProfileRegistry::open(root.path()).unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["Gaming", "Podcast Setup"]);
    }

    #[test]
    fn test_open_creates_storage_directory() {
        let root = tempfile::tempdir().unwrap();
        let registry = ProfileRegistry::open(root.path()).unwrap();
        assert_eq!(registry.names().count(), 0);
        assert!(root.path().join(PROFILES_DIR).is_dir());
    }

    #[test]
    fn test_open_fails_when_storage_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("basic")).unwrap();
        fs::write(root.path().join(PROFILES_DIR), "not a directory").unwrap();

        let err = ProfileRegistry::open(root.path()).err().unwrap();
        assert!(matches!(err, RegistryError::Storage { .. }));
    }

    #[test]
    fn test_create_writes_named_config() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = ProfileRegistry::open(root.path()).unwrap();

        let entry = registry.create("Live: Main").unwrap();

        assert_eq!(entry.name, "Live: Main");
        assert!(entry.dir.ends_with("Live_ Main"));
        let store = ConfigStore::load(entry.config_path()).unwrap();
        assert_eq!(store.get_str("General", "Name"), Some("Live: Main"));
        assert!(registry.find("Live: Main").is_some());
    }

    #[test]
    fn test_resolve_without_persisted_name_reuses_default_on_disk() {
        let root = tempfile::tempdir().unwrap();

        let mut registry = ProfileRegistry::open(root.path()).unwrap();
        let first = resolve(&mut registry, None, "").unwrap();
        assert!(first.created);

        let mut registry = ProfileRegistry::open(root.path()).unwrap();
        let second = resolve(&mut registry, None, "").unwrap();

        assert!(!second.created);
        assert_eq!(second.entry, first.entry);
        assert_eq!(fs::read_dir(root.path().join(PROFILES_DIR)).unwrap().count(), 1);
    }

    #[test]
    fn test_profile_name_with_line_break_reloads_intact() {
        let root = tempfile::tempdir().unwrap();
        let mut registry = ProfileRegistry::open(root.path()).unwrap();
        registry.create("Main\n[Video]").unwrap();

        let registry = ProfileRegistry::open(root.path()).unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Main [Video]"]);
    }

    #[test]
    fn test_activate_loads_profile_config() {
        let root = tempfile::tempdir().unwrap();
        write_profile(root.path(), "Gaming", "Gaming");
        let mut registry = ProfileRegistry::open(root.path()).unwrap();

        let resolved = resolve(&mut registry, Some("Gaming"), "Other").unwrap();
        let active = registry.activate(&resolved.entry).unwrap();

        assert!(!resolved.created);
        assert_eq!(active.name(), "Gaming");
        assert_eq!(active.config.get_uint("Video", "BaseCX"), Some(1280));
    }

    #[test]
    fn test_activation_events_order() {
        let entry = ProfileEntry {
            name: "Gaming".to_string(),
            dir: PathBuf::from("/tmp/Gaming"),
        };
        assert_eq!(
            ProfileRegistry::activation_events(&entry),
            vec![
                LifecycleEvent::ProfileListChanged,
                LifecycleEvent::ProfileChanged {
                    name: "Gaming".to_string()
                },
            ]
        );
    }
}
