//! Configuration management
//!
//! - **store**: sectioned key/value store with a defaults layer and atomic save
//! - **migration**: one-way upgrades of legacy profile keys
//! - **defaults**: set-if-absent baseline values for every recognized key

pub mod defaults;
pub mod migration;
pub mod store;

pub use defaults::DefaultsInstaller;
pub use migration::MigrationEngine;
pub use store::{ConfigStore, write_atomic};

/// Flags in the user config marking installs that predate newer defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyFlags {
    /// Keep the display's native base resolution even above 1080p
    pub pre19_defaults: bool,
    /// Prefer software encoders over hardware ones
    pub pre23_defaults: bool,
    /// Enable both Twitch chat extensions
    pub pre24_1_defaults: bool,
}

impl LegacyFlags {
    pub fn from_user_config(user: &ConfigStore) -> Self {
        Self {
            pre19_defaults: user.get_bool("General", "Pre19Defaults").unwrap_or(false),
            pre23_defaults: user.get_bool("General", "Pre23Defaults").unwrap_or(false),
            pre24_1_defaults: user.get_bool("General", "Pre24.1Defaults").unwrap_or(false),
        }
    }
}
