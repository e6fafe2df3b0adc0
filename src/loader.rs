//! Chunk Loaders
//!
//! The host environment decides what "loading a chunk" means (a network
//! fetch, a dynamic code load, ...). It plugs in through [`ChunkLoader`];
//! a load hands back the exports the chunk makes available, which the
//! resolver registers before the chunk counts as loaded.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;

use async_trait::async_trait;
use tracing::info;

use crate::reference::ChunkId;
use crate::registry::ChunkExport;

/// Failure reported by a loader; wrapped into `ResolveError::ChunkLoad`.
pub type LoadFailure = Box<dyn StdError + Send + Sync>;

/// Capability that loads a chunk's code.
///
/// Called at most once per chunk at a time; the resolver coalesces
/// concurrent requests and never calls it again after a successful load.
#[async_trait]
pub trait ChunkLoader<V>: Send + Sync {
    async fn load(&self, chunk_id: &ChunkId) -> Result<Vec<ChunkExport<V>>, LoadFailure>;
}

/// Loader backed by a fixed table of chunks.
///
/// Loading a chunk missing from the table fails.
#[derive(Debug, Clone)]
pub struct StaticLoader<V> {
    chunks: HashMap<ChunkId, Vec<ChunkExport<V>>>,
}

impl<V> StaticLoader<V> {
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
        }
    }

    /// Add a chunk that contributes no exports.
    pub fn with_empty_chunk(mut self, chunk_id: impl Into<ChunkId>) -> Self {
        self.chunks.entry(chunk_id.into()).or_default();
        self
    }

    /// Add an export to a chunk, creating the chunk if needed.
    pub fn with_export(mut self, chunk_id: impl Into<ChunkId>, export: ChunkExport<V>) -> Self {
        self.insert(chunk_id, export);
        self
    }

    pub fn insert(&mut self, chunk_id: impl Into<ChunkId>, export: ChunkExport<V>) {
        self.chunks.entry(chunk_id.into()).or_default().push(export);
    }

    /// Make a chunk known without giving it exports.
    pub fn insert_chunk(&mut self, chunk_id: impl Into<ChunkId>) {
        self.chunks.entry(chunk_id.into()).or_default();
    }

    pub fn contains_chunk(&self, chunk_id: &str) -> bool {
        self.chunks.contains_key(chunk_id)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

impl<V> Default for StaticLoader<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> ChunkLoader<V> for StaticLoader<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn load(&self, chunk_id: &ChunkId) -> Result<Vec<ChunkExport<V>>, LoadFailure> {
        match self.chunks.get(chunk_id) {
            Some(exports) => Ok(exports.clone()),
            None => Err(format!("no chunk named '{}'", chunk_id).into()),
        }
    }
}

/// Loader that delegates to an async closure.
pub struct FnLoader<F> {
    load: F,
}

impl<F> FnLoader<F> {
    pub fn new(load: F) -> Self {
        Self { load }
    }
}

#[async_trait]
impl<V, F, Fut> ChunkLoader<V> for FnLoader<F>
where
    V: Send + 'static,
    F: Fn(ChunkId) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<ChunkExport<V>>, LoadFailure>> + Send + 'static,
{
    async fn load(&self, chunk_id: &ChunkId) -> Result<Vec<ChunkExport<V>>, LoadFailure> {
        (self.load)(chunk_id.clone()).await
    }
}

/// Loader that only reports the load; chunks contribute no exports.
///
/// Useful when every export is registered up front.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLoader;

#[async_trait]
impl<V: Send + 'static> ChunkLoader<V> for LoggingLoader {
    async fn load(&self, chunk_id: &ChunkId) -> Result<Vec<ChunkExport<V>>, LoadFailure> {
        info!(chunk = %chunk_id, "chunk loaded");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_loader_returns_exports() {
        let loader = StaticLoader::new()
            .with_export("chu", ChunkExport::new("Clock.tsx", "Clock", "ClockComponent"))
            .with_empty_chunk("pika");

        let exports = loader.load(&ChunkId::from("chu")).await.unwrap();
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].module_id(), "Clock.tsx");
        assert_eq!(exports[0].export_name(), "Clock");

        let exports = loader.load(&ChunkId::from("pika")).await.unwrap();
        assert!(exports.is_empty());
        assert_eq!(loader.chunk_count(), 2);
    }

    #[tokio::test]
    async fn test_static_loader_unknown_chunk() {
        let loader: StaticLoader<&str> = StaticLoader::new();

        let err = loader.load(&ChunkId::from("pika")).await.unwrap_err();
        assert!(err.to_string().contains("pika"));
    }

    #[tokio::test]
    async fn test_fn_loader() {
        let loader = FnLoader::new(|chunk_id: ChunkId| async move {
            if chunk_id.as_str() == "broken" {
                return Err(LoadFailure::from("fetch failed"));
            }
            Ok(vec![ChunkExport::new(chunk_id.to_string(), "default", 1)])
        });

        let exports = loader.load(&ChunkId::from("pika")).await.unwrap();
        assert_eq!(exports[0].module_id(), "pika");

        let err = ChunkLoader::<i32>::load(&loader, &ChunkId::from("broken"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "fetch failed");
    }

    #[tokio::test]
    async fn test_logging_loader_contributes_nothing() {
        let exports = ChunkLoader::<()>::load(&LoggingLoader, &ChunkId::from("pika"))
            .await
            .unwrap();
        assert!(exports.is_empty());
    }
}
