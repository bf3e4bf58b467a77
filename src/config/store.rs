//! Sectioned key/value configuration store backed by an INI-like text file
//!
//! Values are stored as text and typed by the reader. Every store has two
//! layers: user values (persisted) and defaults (in memory only, installed at
//! startup). Reads fall back from the user layer to the defaults layer.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::config::TMP_EXTENSION;

/// A typed configuration value, rendered to text when stored
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Uint(u64),
    Bool(bool),
    Double(f64),
}

impl ConfigValue {
    fn render(&self) -> String {
        match self {
            ConfigValue::String(s) => s.clone(),
            ConfigValue::Int(v) => v.to_string(),
            ConfigValue::Uint(v) => v.to_string(),
            ConfigValue::Bool(v) => v.to_string(),
            ConfigValue::Double(v) => v.to_string(),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<u64> for ConfigValue {
    fn from(value: u64) -> Self {
        ConfigValue::Uint(value)
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        ConfigValue::Uint(value as u64)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Double(value)
    }
}

/// Parse a boolean the way the config files have always written them
pub fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        raw.parse::<i64>().ok().map(|v| v != 0)
    }
}

#[derive(Debug, Clone, Default)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }
}

/// Ordered sections of key/value pairs. `(section, key)` is unique per layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    sections: Vec<Section>,
    defaults: Vec<Section>,
}

impl ConfigStore {
    /// Empty store that is not bound to any file
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the store at `path`. A missing file yields an empty store bound to
    /// that path; any other read failure is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, starting empty");
                Self::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config from {:?}", path));
            }
        };
        store.path = Some(path);
        Ok(store)
    }

    /// Parse INI text. Comment lines (`;` or `#`), lines without `=`, and keys
    /// before the first section header are ignored.
    pub fn parse(text: &str) -> Self {
        let mut store = Self::new();
        let mut current: Option<usize> = None;

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = Some(section_index(&mut store.sections, name.trim()));
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!(line = line_no + 1, "Ignoring config line without '='");
                continue;
            };
            match current {
                Some(idx) => store.sections[idx].set(key.trim(), value.trim().to_string()),
                None => warn!(line = line_no + 1, "Ignoring config key outside of a section"),
            }
        }
        store
    }

    /// Render the user layer as INI text
    pub fn to_ini_string(&self) -> String {
        let mut out = String::new();
        for section in self.sections.iter().filter(|s| !s.entries.is_empty()) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }

    /// Write to `<file>.tmp`, flush it to disk, then rename over the real file.
    /// A crash at any point leaves the previous file intact.
    pub fn save_safe(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .context("Config store is not bound to a file")?;

        write_atomic(path, self.to_ini_string().as_bytes())?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn has_user_value(&self, section: &str, key: &str) -> bool {
        self.user_value(section, key).is_some()
    }

    pub fn user_value(&self, section: &str, key: &str) -> Option<&str> {
        find_section(&self.sections, section).and_then(|s| s.get(key))
    }

    pub fn default_value(&self, section: &str, key: &str) -> Option<&str> {
        find_section(&self.defaults, section).and_then(|s| s.get(key))
    }

    /// Effective raw value: user layer first, then defaults
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.user_value(section, key)
            .or_else(|| self.default_value(section, key))
    }

    pub fn get_str(&self, section: &str, key: &str) -> Option<&str> {
        self.value(section, key)
    }

    pub fn get_uint(&self, section: &str, key: &str) -> Option<u64> {
        self.value(section, key).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_bool(&self, section: &str, key: &str) -> Option<bool> {
        self.value(section, key).and_then(parse_bool)
    }

    /// Set a user value. Line breaks become spaces so the value stays on
    /// its own line when saved.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<ConfigValue>) {
        let idx = section_index(&mut self.sections, section);
        self.sections[idx].set(key, single_line(value.into().render()));
    }

    /// Set a value in the defaults layer. User values are never touched.
    pub fn set_default(&mut self, section: &str, key: &str, value: impl Into<ConfigValue>) {
        let idx = section_index(&mut self.defaults, section);
        self.defaults[idx].set(key, single_line(value.into().render()));
    }

    /// Remove a user value, returning whether one existed
    pub fn remove(&mut self, section: &str, key: &str) -> bool {
        self.sections
            .iter_mut()
            .find(|s| s.name == section)
            .map(|s| s.remove(key))
            .unwrap_or(false)
    }
}

#[cfg(test)]
impl ConfigStore {
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn get_int(&self, section: &str, key: &str) -> Option<i64> {
        self.value(section, key).and_then(|v| v.trim().parse().ok())
    }

    pub fn get_double(&self, section: &str, key: &str) -> Option<f64> {
        self.value(section, key).and_then(|v| v.trim().parse().ok())
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }
}

fn single_line(value: String) -> String {
    if !value.contains(['\n', '\r']) {
        return value;
    }
    warn!("Replacing line breaks in config value");
    value.replace(['\r', '\n'], " ")
}

fn find_section<'a>(sections: &'a [Section], name: &str) -> Option<&'a Section> {
    sections.iter().find(|s| s.name == name)
}

fn section_index(sections: &mut Vec<Section>, name: &str) -> usize {
    match sections.iter().position(|s| s.name == name) {
        Some(idx) => idx,
        None => {
            sections.push(Section::new(name));
            sections.len() - 1
        }
    }
}

/// Replace `path` with `contents` via a temporary sibling and a rename
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let tmp_path = tmp_path_for(path);
    {
        let mut file =
            File::create(&tmp_path).with_context(|| format!("Failed to create {:?}", tmp_path))?;
        file.write_all(contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        file.sync_all()
            .with_context(|| format!("Failed to flush {:?}", tmp_path))?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move {:?} into place", tmp_path))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(TMP_EXTENSION);
    PathBuf::from(name)
}
