//! Filesystem-backed artifact and property stores.
//!
//! Layout under a state root:
//!
//! ```text
//! <root>/steps/<step_id>/artifacts/index.json     ordered list of { name, file, created_at }
//! <root>/steps/<step_id>/artifacts/<digest>.log   one file per artifact
//! <root>/properties.json                          { key: { value, source } }
//! ```
//!
//! Artifacts belong to one step execution; properties are shared by every
//! execution using the same root.
//!
//! Artifact names are free text ("warnings (3)"), so files are named by the
//! first 16 hex chars of the name's SHA-256. Every write goes to a temp file in
//! the target directory and is renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::*;

const STEPS_DIR: &str = "steps";
const INDEX_FILE: &str = "index.json";
const PROPERTIES_FILE: &str = "properties.json";

fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> StorageResult<()> {
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a JSON file, returning `T::default()` when it does not exist yet.
fn read_json_or_default<T>(path: &Path) -> StorageResult<T>
where
    T: Default + for<'de> Deserialize<'de>,
{
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// FsArtifactStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    name: String,
    file: String,
    created_at: DateTime<Utc>,
}

/// Artifact store writing one file per artifact under `<root>/artifacts/`.
#[derive(Debug)]
pub struct FsArtifactStore {
    dir: PathBuf,
    index_lock: Mutex<()>,
}

impl FsArtifactStore {
    /// Create a store rooted at `root`. Creates `root/artifacts/` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = root.as_ref().join("artifacts");
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            index_lock: Mutex::new(()),
        })
    }

    /// Store for one step execution under `<state_root>/steps/<step_id>/`.
    pub fn for_step(state_root: impl AsRef<Path>, step_id: &str) -> StorageResult<Self> {
        if step_id.is_empty() || step_id.contains(['/', '\\']) || step_id.starts_with('.') {
            return Err(StorageError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid step id {:?}", step_id),
            )));
        }
        Self::new(state_root.as_ref().join(STEPS_DIR).join(step_id))
    }

    /// Directory holding the artifact files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(name: &str) -> String {
        let hex = hex::encode(Sha256::digest(name.as_bytes()));
        format!("{}.log", &hex[..16])
    }

    fn read_index(&self) -> StorageResult<Vec<IndexEntry>> {
        read_json_or_default(&self.dir.join(INDEX_FILE))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn add_artifact(&self, name: &str, content: &str) -> StorageResult<()> {
        let _guard = self
            .index_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let file = Self::file_name(name);
        write_atomic(&self.dir, &self.dir.join(&file), content.as_bytes())?;

        let mut index = self.read_index()?;
        let entry = IndexEntry {
            name: name.to_string(),
            file,
            created_at: Utc::now(),
        };
        match index.iter_mut().find(|e| e.name == name) {
            Some(existing) => *existing = entry,
            None => index.push(entry),
        }
        let bytes = serde_json::to_vec_pretty(&index)?;
        write_atomic(&self.dir, &self.dir.join(INDEX_FILE), &bytes)?;

        debug!(artifact = %name, bytes = content.len(), "Stored artifact");
        Ok(())
    }

    async fn get_artifact(&self, name: &str) -> StorageResult<Artifact> {
        let index = self.read_index()?;
        let entry = index
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| StorageError::ArtifactNotFound {
                name: name.to_string(),
            })?;
        let content = fs::read_to_string(self.dir.join(&entry.file))?;
        Ok(Artifact {
            name: entry.name,
            content,
            created_at: entry.created_at,
        })
    }

    async fn list_artifacts(&self) -> StorageResult<Vec<String>> {
        Ok(self.read_index()?.into_iter().map(|e| e.name).collect())
    }
}

// ---------------------------------------------------------------------------
// FsPropertyStore
// ---------------------------------------------------------------------------

/// Property store persisted as a single JSON document.
///
/// Separate processes sharing a root see each other's properties, which is
/// how consecutive invocations in one composite run accumulate counters.
#[derive(Debug)]
pub struct FsPropertyStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FsPropertyStore {
    /// Create a store rooted at `root`. Creates `root` if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn path(&self) -> PathBuf {
        self.root.join(PROPERTIES_FILE)
    }

    fn load(&self) -> StorageResult<BTreeMap<String, Property>> {
        read_json_or_default(&self.path())
    }

    fn store(&self, properties: &BTreeMap<String, Property>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(properties)?;
        write_atomic(&self.root, &self.path(), &bytes)
    }
}

#[async_trait]
impl PropertyStore for FsPropertyStore {
    async fn get_property(&self, key: &str) -> StorageResult<Option<Property>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    async fn set(&self, key: &str, value: Value, source: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut properties = self.load()?;
        properties.insert(
            key.to_string(),
            Property {
                value,
                source: source.to_string(),
            },
        );
        self.store(&properties)
    }

    async fn increment(&self, key: &str, delta: i64, source: &str) -> StorageResult<i64> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut properties = self.load()?;
        let updated = incremented(key, properties.get(key).map(|p| &p.value), delta)?;
        properties.insert(
            key.to_string(),
            Property {
                value: Value::from(updated),
                source: source.to_string(),
            },
        );
        self.store(&properties)?;
        Ok(updated)
    }
}
