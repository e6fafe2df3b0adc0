//! Error types for reference resolution and manifest handling.

use std::error::Error as StdError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::reference::ChunkId;

/// Result type for registry and resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors that can occur while resolving a module reference.
///
/// `Clone` so a single failed chunk load can be reported to every caller
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The module id was never registered.
    #[error("Unknown module ID '{module_id}'")]
    UnknownModule { module_id: String },

    /// The module is registered but has no such export.
    #[error("Module '{module_id}' has no export named '{export_name}'")]
    UnknownExport {
        module_id: String,
        export_name: String,
    },

    /// The loader failed to load a required chunk.
    #[error("Failed to load chunk '{chunk_id}': {source}")]
    ChunkLoad {
        chunk_id: ChunkId,
        #[source]
        source: Arc<dyn StdError + Send + Sync>,
    },
}

impl ResolveError {
    pub(crate) fn unknown_module(module_id: &str) -> Self {
        ResolveError::UnknownModule {
            module_id: module_id.to_string(),
        }
    }

    pub(crate) fn unknown_export(module_id: &str, export_name: &str) -> Self {
        ResolveError::UnknownExport {
            module_id: module_id.to_string(),
            export_name: export_name.to_string(),
        }
    }

    pub(crate) fn chunk_load(
        chunk_id: ChunkId,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        ResolveError::ChunkLoad {
            chunk_id,
            source: Arc::from(source.into()),
        }
    }
}

/// Causes of a chunk load that never produced a loader result.
#[derive(Debug, Clone, Error)]
pub enum LoadInterrupted {
    #[error("load timed out after {0:?}")]
    TimedOut(Duration),

    #[error("load task ended without reporting a result")]
    Aborted,
}

/// Errors raised while reading or querying a bundler manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported manifest format '{}': expected .toml or .json", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("No client references registered for file '{0}'")]
    UnknownFile(String),

    #[error("File '{file_path}' has no client reference named '{export_name}'")]
    UnknownExport {
        file_path: String,
        export_name: String,
    },
}
