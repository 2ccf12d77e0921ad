//! Step-State: host-side state for build steps
//!
//! A build step never owns its storage. The orchestrator hands it the
//! collaborators defined here and the step calls into them:
//!
//! - `ArtifactStore`: named text blobs ("logs") attached to a step execution
//! - `PropertyStore`: named values attached to a run, visible to later steps
//!
//! `fakes` holds in-memory implementations for tests; `fs` holds
//! filesystem-backed implementations for standalone use.

mod error;
pub mod fakes;
pub mod fs;
pub mod storage_traits;

pub use error::StorageError;
pub use fs::{FsArtifactStore, FsPropertyStore};
pub use storage_traits::{
    incremented, Artifact, ArtifactStore, Property, PropertyStore, StorageResult,
};
