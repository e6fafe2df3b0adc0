//! Module Reference Resolver
//!
//! Turns a [`ModuleReference`] back into the concrete export it stands for:
//!
//! 1. Every chunk the reference requires is loaded through the [`ChunkLoader`]
//! 2. The exports each chunk hands back are registered
//! 3. The `(module id, export name)` pair is looked up in the registry
//!
//! # Chunk Loading
//!
//! Each chunk is tracked in a state table:
//!
//! - **absent**: never loaded, or the last attempt failed
//! - **Loading**: a load task is running; callers subscribe to its outcome
//! - **Loaded**: exports registered; further loads are no-ops
//!
//! The first caller for an absent chunk spawns the load task; everyone else
//! (including concurrent `resolve` calls with overlapping chunk sets) waits on
//! the same watch channel, so the loader runs at most once per chunk. A failed
//! load is delivered to every waiter and the chunk returns to **absent**; there
//! is no internal retry. A load task that dies without reporting (a panicking
//! loader) fails its waiters with [`LoadInterrupted::Aborted`] and is discarded.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::error::{LoadInterrupted, ResolveError, ResolveResult};
use crate::loader::ChunkLoader;
use crate::reference::{ChunkId, ModuleReference};
use crate::registry::{ReferenceRegistry, SharedRegistry};

/// Resolver options.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Upper bound on a single chunk load. Default: none.
    pub load_timeout: Option<Duration>,
}

impl ResolveOptions {
    /// Options with no load timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail chunk loads that take longer than `timeout`.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }
}

/// Outcome slot of an in-flight load; `None` until the load task reports.
type LoadOutcome = Option<ResolveResult<()>>;

enum ChunkState {
    Loading(watch::Receiver<LoadOutcome>),
    Loaded,
}

type ChunkTable = Arc<Mutex<HashMap<ChunkId, ChunkState>>>;

/// Resolves module references against a registry, loading chunks on demand.
///
/// Requires a Tokio runtime: chunk loads run on spawned tasks so a dropped
/// `resolve` future never abandons a load other callers are waiting on.
pub struct Resolver<V> {
    registry: SharedRegistry<V>,
    loader: Arc<dyn ChunkLoader<V>>,
    chunks: ChunkTable,
    options: ResolveOptions,
}

impl<V> Resolver<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a resolver with default options.
    pub fn new(registry: SharedRegistry<V>, loader: impl ChunkLoader<V> + 'static) -> Self {
        Self::with_options(registry, loader, ResolveOptions::default())
    }

    /// Create a resolver with specific options.
    pub fn with_options(
        registry: SharedRegistry<V>,
        loader: impl ChunkLoader<V> + 'static,
        options: ResolveOptions,
    ) -> Self {
        Self::from_shared_loader(registry, Arc::new(loader), options)
    }

    /// Create a resolver around a loader the caller keeps a handle to.
    pub fn from_shared_loader(
        registry: SharedRegistry<V>,
        loader: Arc<dyn ChunkLoader<V>>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            registry,
            loader,
            chunks: Arc::new(Mutex::new(HashMap::new())),
            options,
        }
    }

    pub fn registry(&self) -> &SharedRegistry<V> {
        &self.registry
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Load a chunk, joining any load of it already in flight.
    ///
    /// A no-op once the chunk has loaded. Loader failures are returned as
    /// `ResolveError::ChunkLoad`.
    pub async fn load_chunk(&self, chunk_id: &ChunkId) -> ResolveResult<()> {
        match self.begin_load(chunk_id) {
            Some(outcome) => self.wait_for(chunk_id, outcome).await,
            None => Ok(()),
        }
    }

    /// Resolve a reference to its export.
    ///
    /// All required chunks are loaded (concurrently) before the registry is
    /// consulted. Any chunk failure fails the whole resolution.
    pub async fn resolve(&self, reference: &ModuleReference) -> ResolveResult<V> {
        debug!(
            reference = %reference,
            chunks = reference.chunks().len(),
            "resolving module reference"
        );

        // Start every load before waiting on any of them.
        let pending: Vec<_> = reference
            .chunks()
            .iter()
            .filter_map(|chunk_id| self.begin_load(chunk_id).map(|outcome| (chunk_id, outcome)))
            .collect();

        for (chunk_id, outcome) in pending {
            self.wait_for(chunk_id, outcome).await?;
        }

        self.registry
            .lookup(reference.module_id(), reference.export_name())
    }

    /// Check if a chunk has finished loading
    pub fn is_loaded(&self, chunk_id: &str) -> bool {
        matches!(self.chunks.lock().get(chunk_id), Some(ChunkState::Loaded))
    }

    /// Sorted ids of all loaded chunks.
    pub fn loaded_chunks(&self) -> Vec<ChunkId> {
        let mut loaded: Vec<ChunkId> = self
            .chunks
            .lock()
            .iter()
            .filter(|(_, state)| matches!(state, ChunkState::Loaded))
            .map(|(chunk_id, _)| chunk_id.clone())
            .collect();
        loaded.sort();
        loaded
    }

    /// Subscribe to the chunk's load, starting one if none is running.
    ///
    /// Returns `None` if the chunk is already loaded.
    fn begin_load(&self, chunk_id: &ChunkId) -> Option<watch::Receiver<LoadOutcome>> {
        let mut chunks = self.chunks.lock();
        match chunks.get(chunk_id) {
            Some(ChunkState::Loaded) => return None,
            // A closed channel means the load task died with nobody waiting on it.
            Some(ChunkState::Loading(outcome)) if outcome.has_changed().is_err() => {
                warn!(chunk = %chunk_id, "discarding load that ended without a result");
            }
            Some(ChunkState::Loading(outcome)) => {
                trace!(chunk = %chunk_id, "joining in-flight load");
                return Some(outcome.clone());
            }
            None => {}
        }

        let (sender, outcome) = watch::channel(None);
        chunks.insert(chunk_id.clone(), ChunkState::Loading(outcome.clone()));
        drop(chunks);

        self.spawn_load(chunk_id.clone(), sender);
        Some(outcome)
    }

    fn spawn_load(&self, chunk_id: ChunkId, sender: watch::Sender<LoadOutcome>) {
        let loader = Arc::clone(&self.loader);
        let registry = Arc::clone(&self.registry);
        let chunks = Arc::clone(&self.chunks);
        let timeout = self.options.load_timeout;

        tokio::spawn(async move {
            let result = run_load(loader.as_ref(), &registry, &chunk_id, timeout).await;

            // The table is updated before waiters wake, so a caller that sees
            // the outcome and loads again observes the new state.
            {
                let mut chunks = chunks.lock();
                if result.is_ok() {
                    chunks.insert(chunk_id, ChunkState::Loaded);
                } else {
                    chunks.remove(&chunk_id);
                }
            }

            // Nobody may be listening any more; the table already holds the result.
            let _ = sender.send(Some(result));
        });
    }

    async fn wait_for(
        &self,
        chunk_id: &ChunkId,
        mut outcome: watch::Receiver<LoadOutcome>,
    ) -> ResolveResult<()> {
        let reported = match outcome.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };

        match reported {
            Some(result) => result,
            None => {
                // Load task dropped its sender without reporting (panic or runtime shutdown).
                warn!(chunk = %chunk_id, "chunk load ended without a result");
                self.forget_if_current(chunk_id, &outcome);
                Err(ResolveError::chunk_load(
                    chunk_id.clone(),
                    LoadInterrupted::Aborted,
                ))
            }
        }
    }

    /// Drop a stale `Loading` entry so a later call can start a fresh load.
    fn forget_if_current(&self, chunk_id: &ChunkId, outcome: &watch::Receiver<LoadOutcome>) {
        let mut chunks = self.chunks.lock();
        let stale = matches!(
            chunks.get(chunk_id),
            Some(ChunkState::Loading(current)) if current.same_channel(outcome)
        );
        if stale {
            chunks.remove(chunk_id);
        }
    }
}

async fn run_load<V>(
    loader: &dyn ChunkLoader<V>,
    registry: &ReferenceRegistry<V>,
    chunk_id: &ChunkId,
    timeout: Option<Duration>,
) -> ResolveResult<()>
where
    V: Send + 'static,
{
    debug!(chunk = %chunk_id, "loading chunk");

    let load = loader.load(chunk_id);
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, load).await {
            Ok(result) => result,
            Err(_) => {
                warn!(chunk = %chunk_id, ?limit, "chunk load timed out");
                return Err(ResolveError::chunk_load(
                    chunk_id.clone(),
                    LoadInterrupted::TimedOut(limit),
                ));
            }
        },
        None => load.await,
    };

    let exports = result.map_err(|source| {
        warn!(chunk = %chunk_id, error = %source, "chunk load failed");
        ResolveError::chunk_load(chunk_id.clone(), source)
    })?;

    let count = exports.len();
    for export in exports {
        registry.register_export(export);
    }

    debug!(chunk = %chunk_id, exports = count, "chunk loaded");
    Ok(())
}

impl<V> fmt::Debug for Resolver<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chunks = self.chunks.lock();
        let loaded = chunks
            .values()
            .filter(|state| matches!(state, ChunkState::Loaded))
            .count();
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("loaded_chunks", &loaded)
            .field("in_flight", &(chunks.len() - loaded))
            .field("options", &self.options)
            .finish()
    }
}
