//! Durable view state: where the user was reading, per collection.
//!
//! Offsets are a best-effort affordance. A store that cannot be read starts
//! empty and a failed write is logged by the caller; neither affects the
//! conversation itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub trait ViewStateStore: Send + Sync {
    fn load_offset(&self, collection: &str) -> Option<u32>;
    fn save_offset(&self, collection: &str, offset: u32) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ViewStateFile {
    #[serde(default)]
    scroll_offsets: BTreeMap<String, u32>,
}

/// Offsets persisted as a small JSON file, rewritten on every save.
pub struct JsonFileViewState {
    path: PathBuf,
    state: RwLock<ViewStateFile>,
}

impl JsonFileViewState {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match read_state(&path) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable view state");
                ViewStateFile::default()
            }
        };
        Self {
            path,
            state: RwLock::new(state),
        }
    }
}

fn read_state(path: &Path) -> Result<ViewStateFile> {
    if !path.exists() {
        return Ok(ViewStateFile::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read view state: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse view state: {}", path.display()))
}

impl ViewStateStore for JsonFileViewState {
    fn load_offset(&self, collection: &str) -> Option<u32> {
        self.state
            .read()
            .unwrap()
            .scroll_offsets
            .get(collection)
            .copied()
    }

    fn save_offset(&self, collection: &str, offset: u32) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.scroll_offsets.insert(collection.to_string(), offset);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }
        let json = serde_json::to_string_pretty(&*state)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write view state: {}", self.path.display()))?;
        Ok(())
    }
}

/// Offsets kept in memory only.
#[derive(Default)]
pub struct MemoryViewState {
    offsets: RwLock<BTreeMap<String, u32>>,
}

impl MemoryViewState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewStateStore for MemoryViewState {
    fn load_offset(&self, collection: &str) -> Option<u32> {
        self.offsets.read().unwrap().get(collection).copied()
    }

    fn save_offset(&self, collection: &str, offset: u32) -> Result<()> {
        self.offsets
            .write()
            .unwrap()
            .insert(collection.to_string(), offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn offsets_are_kept_per_collection_and_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state").join("view-state.json");

        let store = JsonFileViewState::open(&path);
        assert_eq!(store.load_offset("alpha"), None);
        store.save_offset("alpha", 120).unwrap();
        store.save_offset("beta", 7).unwrap();
        store.save_offset("alpha", 300).unwrap();

        let reopened = JsonFileViewState::open(&path);
        assert_eq!(reopened.load_offset("alpha"), Some(300));
        assert_eq!(reopened.load_offset("beta"), Some(7));
        assert_eq!(reopened.load_offset("gamma"), None);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("view-state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileViewState::open(&path);
        assert_eq!(store.load_offset("alpha"), None);
        store.save_offset("alpha", 1).unwrap();
        assert_eq!(JsonFileViewState::open(&path).load_offset("alpha"), Some(1));
    }
}
