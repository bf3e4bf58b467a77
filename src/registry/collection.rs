//! Scene collection registry
//!
//! Each collection is a JSON document under `basic/scenes/`. Only the header
//! fields this crate needs are typed; everything else in the document is kept
//! verbatim so saving never drops data written by other components.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{Registry, RegistryError, open_storage, sanitize_file_name, unused_path};
use crate::config::write_atomic;
use crate::constants::config::SCENES_DIR;
use crate::constants::scenes::DEFAULT_SCENE_NAME;
use crate::events::LifecycleEvent;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SceneRef {
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SceneCollectionDocument {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub current_scene: String,

    #[serde(default)]
    pub current_program_scene: String,

    #[serde(default)]
    pub scene_order: Vec<SceneRef>,

    #[serde(default)]
    pub sources: Vec<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SceneCollectionDocument {
    /// A new collection with a single empty scene selected everywhere
    pub fn new_default(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current_scene: DEFAULT_SCENE_NAME.to_string(),
            current_program_scene: DEFAULT_SCENE_NAME.to_string(),
            scene_order: vec![SceneRef {
                name: DEFAULT_SCENE_NAME.to_string(),
            }],
            sources: vec![json!({
                "name": DEFAULT_SCENE_NAME,
                "id": "scene",
                "settings": { "items": [] },
            })],
            extra: Map::new(),
        }
    }

    fn first_scene(&self) -> &str {
        self.scene_order
            .first()
            .map(|s| s.name.as_str())
            .unwrap_or_default()
    }

    /// Scene shown on the program output
    pub fn program_scene(&self) -> &str {
        if !self.current_program_scene.is_empty() {
            &self.current_program_scene
        } else if !self.current_scene.is_empty() {
            &self.current_scene
        } else {
            self.first_scene()
        }
    }

    /// Scene shown in the preview
    pub fn preview_scene(&self) -> &str {
        if !self.current_scene.is_empty() {
            &self.current_scene
        } else {
            self.first_scene()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionEntry {
    pub name: String,
    pub file: PathBuf,
}

/// The scene collection currently bound to the session
#[derive(Debug)]
pub struct ActiveCollection {
    pub entry: CollectionEntry,
    pub document: SceneCollectionDocument,
}

impl ActiveCollection {
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn save(&self) -> anyhow::Result<()> {
        write_document(&self.entry.file, &self.document)?;
        debug!(collection = %self.entry.name, "Saved scene collection");
        Ok(())
    }
}

/// Name-only view used while scanning, so a huge document is not fully typed
#[derive(Deserialize)]
struct CollectionHeader {
    #[serde(default)]
    name: String,
}

pub struct SceneCollectionRegistry {
    dir: PathBuf,
    collections: Vec<CollectionEntry>,
}

impl SceneCollectionRegistry {
    /// Open (creating if needed) the scene collection storage under `config_root`
    pub fn open(config_root: &Path) -> Result<Self, RegistryError> {
        let dir = config_root.join(SCENES_DIR);
        let mut collections = Vec::new();

        for entry in open_storage(Self::KIND, &dir)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") || !path.is_file() {
                continue;
            }
            let header = fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|text| Ok(serde_json::from_str::<CollectionHeader>(&text)?));
            let header = match header {
                Ok(header) => header,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Malformed scene collection, ignoring");
                    continue;
                }
            };

            let name = if header.name.is_empty() {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                header.name
            };
            if collections.iter().any(|c: &CollectionEntry| c.name == name) {
                warn!(collection = %name, file = %path.display(), "Duplicate collection name, ignoring");
                continue;
            }
            collections.push(CollectionEntry { name, file: path });
        }

        info!(count = collections.len(), "Found scene collections");
        Ok(Self { dir, collections })
    }

    #[cfg(test)]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(|c| c.name.as_str())
    }

    /// Parse the collection's document into an active slot
    pub fn activate(&self, entry: &CollectionEntry) -> Result<ActiveCollection, RegistryError> {
        let load_err = |reason: String| RegistryError::Load {
            kind: Self::KIND,
            name: entry.name.clone(),
            reason,
        };
        let text = fs::read_to_string(&entry.file).map_err(|e| load_err(e.to_string()))?;
        let mut document: SceneCollectionDocument =
            serde_json::from_str(&text).map_err(|e| load_err(e.to_string()))?;
        if document.name.is_empty() {
            document.name = entry.name.clone();
        }

        info!(
            collection = %entry.name,
            scenes = document.scene_order.len(),
            "Activated scene collection"
        );
        Ok(ActiveCollection {
            entry: entry.clone(),
            document,
        })
    }

    /// Events announcing an activated collection, in publish order
    pub fn activation_events(collection: &ActiveCollection) -> Vec<LifecycleEvent> {
        vec![
            LifecycleEvent::SceneCollectionListChanged,
            LifecycleEvent::SceneCollectionChanged {
                name: collection.entry.name.clone(),
            },
            LifecycleEvent::SceneChanged {
                scene: collection.document.program_scene().to_string(),
            },
            LifecycleEvent::PreviewSceneChanged {
                scene: collection.document.preview_scene().to_string(),
            },
        ]
    }
}

impl Registry for SceneCollectionRegistry {
    type Entry = CollectionEntry;
    const KIND: &'static str = "scene collection";

    fn find(&self, name: &str) -> Option<&CollectionEntry> {
        self.collections.iter().find(|c| c.name == name)
    }

    fn create(&mut self, name: &str) -> Result<CollectionEntry, RegistryError> {
        let file = unused_path(&self.dir, &sanitize_file_name(name), ".json");
        let document = SceneCollectionDocument::new_default(name);
        write_document(&file, &document).map_err(|e| RegistryError::Load {
            kind: Self::KIND,
            name: name.to_string(),
            reason: format!("{e:#}"),
        })?;

        let entry = CollectionEntry {
            name: name.to_string(),
            file,
        };
        info!(collection = %name, file = %entry.file.display(), "Created scene collection");
        self.collections.push(entry.clone());
        Ok(entry)
    }
}

fn write_document(path: &Path, document: &SceneCollectionDocument) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(document)?;
    write_atomic(path, &json)
}
