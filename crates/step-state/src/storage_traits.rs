//! Storage trait definitions for build-step host state
//!
//! These traits define what a step may touch on its host:
//! - `ArtifactStore`: named text blobs attached to one step execution
//! - `PropertyStore`: named, typed values attached to a run and readable by
//!   later steps
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module; filesystem-backed stores live in `fs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ArtifactStore: step logs
// ---------------------------------------------------------------------------

/// A named blob of text stored for one step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Display name (e.g. "cppcheck.xml", "warnings (3)")
    pub name: String,
    /// Verbatim content
    pub content: String,
    /// When the artifact was stored
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Artifact storage for a step execution.
///
/// Guarantees:
/// - `get_artifact(name)` returns exactly the content last stored under `name`.
/// - `list_artifacts()` returns names in first-insertion order.
/// - Storing an existing name replaces its content and keeps its position.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `content` under `name`.
    async fn add_artifact(&self, name: &str, content: &str) -> StorageResult<()>;

    /// Retrieve an artifact. Returns `StorageError::ArtifactNotFound` if absent.
    async fn get_artifact(&self, name: &str) -> StorageResult<Artifact>;

    /// Names of all stored artifacts.
    async fn list_artifacts(&self) -> StorageResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// PropertyStore: run properties
// ---------------------------------------------------------------------------

/// A run property value together with the step that last set it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub value: Value,
    pub source: String,
}

/// Run-scoped property store shared by all steps of one run.
///
/// Steps of a run execute in the host's order, so a read-modify-write through
/// `increment` is never interleaved with another step touching the same key.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Look up a property with its source, `None` if unset.
    async fn get_property(&self, key: &str) -> StorageResult<Option<Property>>;

    /// Set a property, replacing any prior value.
    async fn set(&self, key: &str, value: Value, source: &str) -> StorageResult<()>;

    /// Property value, or `default` if unset.
    async fn get(&self, key: &str, default: Value) -> StorageResult<Value> {
        Ok(self
            .get_property(key)
            .await?
            .map(|p| p.value)
            .unwrap_or(default))
    }

    /// Add `delta` to a numeric property and return the new value.
    ///
    /// An unset or non-integer prior value counts as 0.
    async fn increment(&self, key: &str, delta: i64, source: &str) -> StorageResult<i64> {
        let prior = self.get_property(key).await?;
        let updated = incremented(key, prior.as_ref().map(|p| &p.value), delta)?;
        self.set(key, Value::from(updated), source).await?;
        Ok(updated)
    }
}

/// Value of counter `key` after adding `delta` to its `prior` value.
///
/// Unset, null and non-numeric values count as 0. Whole-number floats such
/// as `3.0` count as their integer value. Fractional numbers, numbers outside
/// the `i64` range and an overflowing sum are `StorageError::InvalidProperty`.
pub fn incremented(key: &str, prior: Option<&Value>, delta: i64) -> StorageResult<i64> {
    let invalid = |reason: String| StorageError::InvalidProperty {
        key: key.to_string(),
        reason,
    };

    let current = match prior {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i,
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                    f as i64
                }
                _ => return Err(invalid(format!("{} is not an integer counter", n))),
            },
        },
        _ => 0,
    };

    current
        .checked_add(delta)
        .ok_or_else(|| invalid(format!("{} + {} overflows", current, delta)))
}
