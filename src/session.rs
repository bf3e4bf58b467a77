use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::ConfigStore;
use crate::registry::{ActiveCollection, ActiveProfile};

/// Process-wide session state, threaded through bootstrap by value.
/// Only one stage holds it mutably at a time.
#[derive(Debug)]
pub struct SessionState {
    /// Global `user.ini`
    pub user_config: ConfigStore,

    pub profile: Option<ActiveProfile>,
    pub collection: Option<ActiveCollection>,

    /// Set once the UI is visible; saves before this point are skipped so a
    /// half-initialized session never overwrites good files
    pub loaded: bool,

    /// Modules that failed during the loading pass
    pub failed_modules: Vec<String>,
}

impl SessionState {
    pub fn new(user_config: ConfigStore) -> Self {
        Self {
            user_config,
            profile: None,
            collection: None,
            loaded: false,
            failed_modules: Vec::new(),
        }
    }

    /// Profile name remembered from the previous session
    pub fn persisted_profile(&self) -> String {
        self.user_config
            .get_str("Basic", "Profile")
            .unwrap_or_default()
            .to_string()
    }

    /// Scene collection name remembered from the previous session
    pub fn persisted_collection(&self) -> String {
        self.user_config
            .get_str("Basic", "SceneCollection")
            .unwrap_or_default()
            .to_string()
    }

    /// Make `profile` active and remember it for the next session
    pub fn set_profile(&mut self, profile: ActiveProfile) {
        self.user_config.set("Basic", "Profile", profile.name());
        info!(profile = %profile.name(), "Profile is now active");
        self.profile = Some(profile);
    }

    /// Make `collection` active and remember it for the next session
    pub fn set_collection(&mut self, collection: ActiveCollection) {
        self.user_config
            .set("Basic", "SceneCollection", collection.name());
        info!(collection = %collection.name(), "Scene collection is now active");
        self.collection = Some(collection);
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Save user config, profile and scene collection. Returns false (and
    /// writes nothing) until the session has finished loading.
    pub fn save(&self) -> Result<bool> {
        if !self.loaded {
            debug!("Session not loaded yet, skipping save");
            return Ok(false);
        }

        self.user_config
            .save_safe()
            .context("Failed to save user config")?;
        if let Some(profile) = &self.profile {
            profile
                .config
                .save_safe()
                .with_context(|| format!("Failed to save profile '{}'", profile.name()))?;
        }
        if let Some(collection) = &self.collection {
            collection
                .save()
                .with_context(|| format!("Failed to save scene collection '{}'", collection.name()))?;
        }
        info!("Session saved");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::config::USER_FILENAME;
    use crate::registry::profile::ProfileEntry;
    use std::path::Path;

    fn session_at(dir: &Path) -> SessionState {
        SessionState::new(ConfigStore::load(dir.join(USER_FILENAME)).unwrap())
    }

    fn profile_at(dir: &Path, name: &str) -> ActiveProfile {
        let mut config = ConfigStore::new();
        config.set_path(dir.join("basic.ini"));
        ActiveProfile {
            entry: ProfileEntry {
                name: name.to_string(),
                dir: dir.to_path_buf(),
            },
            config,
        }
    }

    #[test]
    fn test_persisted_names_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_at(dir.path());
        assert_eq!(session.persisted_profile(), "");
        assert_eq!(session.persisted_collection(), "");
    }

    #[test]
    fn test_set_profile_remembers_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(dir.path());

        session.set_profile(profile_at(dir.path(), "Gaming"));

        assert_eq!(session.persisted_profile(), "Gaming");
        assert_eq!(session.profile.as_ref().map(|p| p.name()), Some("Gaming"));
    }

    #[test]
    fn test_save_is_gated_on_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_at(dir.path());
        session.set_profile(profile_at(dir.path(), "Gaming"));

        assert!(!session.save().unwrap());
        assert!(!dir.path().join(USER_FILENAME).exists());

        session.mark_loaded();
        assert!(session.save().unwrap());
        let saved = ConfigStore::load(dir.path().join(USER_FILENAME)).unwrap();
        assert_eq!(saved.get_str("Basic", "Profile"), Some("Gaming"));
        assert!(dir.path().join("basic.ini").exists());
    }
}
