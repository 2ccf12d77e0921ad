//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryArtifactStore` and `MemoryPropertyStore` that satisfy the
//! trait contracts without touching the filesystem.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryArtifactStore
// ---------------------------------------------------------------------------

/// In-memory artifact store; a `Vec` keeps insertion order.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<Vec<Artifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of an artifact, `None` if absent.
    pub fn content(&self, name: &str) -> Option<String> {
        let artifacts = self.artifacts.lock().unwrap();
        artifacts
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.content.clone())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn add_artifact(&self, name: &str, content: &str) -> StorageResult<()> {
        let mut artifacts = self.artifacts.lock().unwrap();
        match artifacts.iter_mut().find(|a| a.name == name) {
            Some(existing) => *existing = Artifact::new(name, content),
            None => artifacts.push(Artifact::new(name, content)),
        }
        Ok(())
    }

    async fn get_artifact(&self, name: &str) -> StorageResult<Artifact> {
        let artifacts = self.artifacts.lock().unwrap();
        artifacts
            .iter()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| StorageError::ArtifactNotFound {
                name: name.to_string(),
            })
    }

    async fn list_artifacts(&self) -> StorageResult<Vec<String>> {
        let artifacts = self.artifacts.lock().unwrap();
        Ok(artifacts.iter().map(|a| a.name.clone()).collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryPropertyStore
// ---------------------------------------------------------------------------

/// In-memory property store backed by a `HashMap<key, Property>`.
#[derive(Debug, Default)]
pub struct MemoryPropertyStore {
    properties: Mutex<HashMap<String, Property>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a property before a step runs, as an earlier step would.
    pub fn with_property(self, key: &str, value: Value, source: &str) -> Self {
        self.properties.lock().unwrap().insert(
            key.to_string(),
            Property {
                value,
                source: source.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl PropertyStore for MemoryPropertyStore {
    async fn get_property(&self, key: &str) -> StorageResult<Option<Property>> {
        let properties = self.properties.lock().unwrap();
        Ok(properties.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value, source: &str) -> StorageResult<()> {
        let mut properties = self.properties.lock().unwrap();
        properties.insert(
            key.to_string(),
            Property {
                value,
                source: source.to_string(),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64, source: &str) -> StorageResult<i64> {
        // Single lock for the whole read-modify-write.
        let mut properties = self.properties.lock().unwrap();
        let updated = incremented(key, properties.get(key).map(|p| &p.value), delta)?;
        properties.insert(
            key.to_string(),
            Property {
                value: Value::from(updated),
                source: source.to_string(),
            },
        );
        Ok(updated)
    }
}
