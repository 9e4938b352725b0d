//! Config file persistence
//!
//! `ConfigStore` is the boundary to wherever the interaction and physical
//! config files live. `JsonFileStore` keeps them as pretty JSON in one
//! directory; `MemoryStore` keeps them in memory for tests and dry runs.

use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFileKind {
    Interaction,
    Physical,
}

impl ConfigFileKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            ConfigFileKind::Interaction => "InteractionConfig.json",
            ConfigFileKind::Physical => "PhysicalConfig.json",
        }
    }
}

/// Load and save raw config file contents
pub trait ConfigStore: Send + Sync {
    /// File contents, or `None` if the file does not exist
    fn load(&self, kind: ConfigFileKind) -> Result<Option<String>>;

    fn save(&self, kind: ConfigFileKind, contents: &str) -> Result<()>;
}

/// Config files in a directory on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: ConfigFileKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

fn map_io(err: std::io::Error, path: &Path) -> Error {
    if err.kind() == ErrorKind::PermissionDenied {
        Error::FileAccess(path.display().to_string())
    } else {
        Error::Io(err)
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self, kind: ConfigFileKind) -> Result<Option<String>> {
        let path = self.path_for(kind);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(map_io(e, &path)),
        }
    }

    fn save(&self, kind: ConfigFileKind, contents: &str) -> Result<()> {
        let path = self.path_for(kind);
        std::fs::create_dir_all(&self.dir).map_err(|e| map_io(e, &self.dir))?;
        std::fs::write(&path, contents).map_err(|e| map_io(e, &path))?;
        debug!(path = %path.display(), "Config file saved");
        Ok(())
    }
}

/// In-memory store. `read_only` makes every save fail with a file access
/// error.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<ConfigFileKind, String>>,
    read_only: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            read_only: true,
        }
    }

    pub fn with_file(self, kind: ConfigFileKind, contents: impl Into<String>) -> Self {
        self.files.lock().insert(kind, contents.into());
        self
    }

    pub fn contents(&self, kind: ConfigFileKind) -> Option<String> {
        self.files.lock().get(&kind).cloned()
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self, kind: ConfigFileKind) -> Result<Option<String>> {
        Ok(self.files.lock().get(&kind).cloned())
    }

    fn save(&self, kind: ConfigFileKind, contents: &str) -> Result<()> {
        if self.read_only {
            return Err(Error::FileAccess(kind.file_name().to_string()));
        }
        self.files.lock().insert(kind, contents.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_none() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = JsonFileStore::new(temp_dir.path());
        assert!(store.load(ConfigFileKind::Interaction).unwrap().is_none());
    }

    #[test]
    fn test_save_creates_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = JsonFileStore::new(temp_dir.path().join("nested").join("touchfree"));

        store.save(ConfigFileKind::Physical, "{}").unwrap();
        assert_eq!(store.load(ConfigFileKind::Physical).unwrap().as_deref(), Some("{}"));
        assert!(store.path_for(ConfigFileKind::Physical).ends_with("PhysicalConfig.json"));
    }

    #[test]
    fn test_read_only_memory_store() {
        let store = MemoryStore::read_only();
        let err = store.save(ConfigFileKind::Interaction, "{}").unwrap_err();
        assert!(matches!(err, Error::FileAccess(_)));
    }
}
