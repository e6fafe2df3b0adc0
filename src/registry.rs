//! Reference Registry
//!
//! Maps `(module id, export name)` to concrete exported values. Entries are
//! inserted at process start or when a chunk load hands back its exports, and
//! live for the lifetime of the registry.
//!
//! # Design
//!
//! - Lock-free module table via DashMap, each module holding its exports
//! - Exports are either ready values or deferred thunks memoized on first lookup
//! - Last write wins for a repeated `(module id, export name)` key
//!
//! # Example
//!
//! ```
//! use modref::{ReferenceRegistry, ResolveError};
//!
//! let registry = ReferenceRegistry::new();
//! registry.register("Clock.tsx", "Clock", "ClockComponent");
//!
//! assert_eq!(registry.lookup("Clock.tsx", "Clock").unwrap(), "ClockComponent");
//! assert!(matches!(
//!     registry.lookup("Clock.tsx", "Watch"),
//!     Err(ResolveError::UnknownExport { .. })
//! ));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::trace;

use crate::error::{ResolveError, ResolveResult};

/// A value produced on first lookup and cached afterwards.
pub struct Deferred<V> {
    value: OnceLock<V>,
    init: Box<dyn Fn() -> V + Send + Sync>,
}

impl<V> Deferred<V> {
    fn get(&self) -> &V {
        self.value.get_or_init(|| (self.init)())
    }

    /// Whether the thunk has already run.
    pub fn is_evaluated(&self) -> bool {
        self.value.get().is_some()
    }
}

/// An exported value, or a thunk producing it.
pub enum Export<V> {
    Ready(V),
    Deferred(Arc<Deferred<V>>),
}

impl<V> Export<V> {
    pub fn ready(value: V) -> Self {
        Export::Ready(value)
    }

    /// Wrap a thunk; it runs at most once, on the first lookup that reaches it.
    ///
    /// The thunk may look up other exports but never its own key: re-entering
    /// its own cell panics or deadlocks.
    pub fn deferred(init: impl Fn() -> V + Send + Sync + 'static) -> Self {
        Export::Deferred(Arc::new(Deferred {
            value: OnceLock::new(),
            init: Box::new(init),
        }))
    }

    fn value(&self) -> &V {
        match self {
            Export::Ready(value) => value,
            Export::Deferred(deferred) => deferred.get(),
        }
    }
}

impl<V: Clone> Clone for Export<V> {
    fn clone(&self) -> Self {
        match self {
            Export::Ready(value) => Export::Ready(value.clone()),
            Export::Deferred(deferred) => Export::Deferred(Arc::clone(deferred)),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Export<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Export::Deferred(deferred) => f
                .debug_struct("Deferred")
                .field("value", &deferred.value.get())
                .finish(),
        }
    }
}

/// One export contributed by a loaded chunk.
#[derive(Clone, Debug)]
pub struct ChunkExport<V> {
    module_id: String,
    export_name: String,
    export: Export<V>,
}

impl<V> ChunkExport<V> {
    pub fn new(module_id: impl Into<String>, export_name: impl Into<String>, value: V) -> Self {
        Self::from_export(module_id, export_name, Export::ready(value))
    }

    pub fn deferred(
        module_id: impl Into<String>,
        export_name: impl Into<String>,
        init: impl Fn() -> V + Send + Sync + 'static,
    ) -> Self {
        Self::from_export(module_id, export_name, Export::deferred(init))
    }

    pub fn from_export(
        module_id: impl Into<String>,
        export_name: impl Into<String>,
        export: Export<V>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            export_name: export_name.into(),
            export,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn export_name(&self) -> &str {
        &self.export_name
    }
}

/// Registry of module exports.
///
/// Safe to share across threads; every lookup observes all registrations that
/// completed before it.
pub struct ReferenceRegistry<V> {
    /// Module id -> export name -> export
    modules: DashMap<String, HashMap<String, Export<V>>>,
}

impl<V> ReferenceRegistry<V> {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            modules: DashMap::new(),
        }
    }

    /// Insert or overwrite an export.
    pub fn register(&self, module_id: impl Into<String>, export_name: impl Into<String>, value: V) {
        self.insert(module_id.into(), export_name.into(), Export::ready(value));
    }

    /// Insert or overwrite an export whose value is built on first lookup.
    ///
    /// `init` must not look up `(module_id, export_name)` itself.
    pub fn register_lazy(
        &self,
        module_id: impl Into<String>,
        export_name: impl Into<String>,
        init: impl Fn() -> V + Send + Sync + 'static,
    ) {
        self.insert(module_id.into(), export_name.into(), Export::deferred(init));
    }

    /// Insert or overwrite an export handed back by a chunk load.
    pub fn register_export(&self, export: ChunkExport<V>) {
        self.insert(export.module_id, export.export_name, export.export);
    }

    fn insert(&self, module_id: String, export_name: String, export: Export<V>) {
        trace!(module = %module_id, export = %export_name, "registering export");
        self.modules
            .entry(module_id)
            .or_default()
            .insert(export_name, export);
    }

    /// Check if any export of the module has been registered
    pub fn contains_module(&self, module_id: &str) -> bool {
        self.modules.contains_key(module_id)
    }

    /// Get the number of registered modules
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Sorted export names of a module, or `None` if the module is unknown.
    pub fn exports(&self, module_id: &str) -> Option<Vec<String>> {
        self.modules.get(module_id).map(|module| {
            let mut names: Vec<String> = module.keys().cloned().collect();
            names.sort();
            names
        })
    }

    /// Sorted ids of all registered modules.
    pub fn module_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

impl<V: Clone> ReferenceRegistry<V> {
    /// Look up an export.
    ///
    /// Fails with `UnknownModule` if the module id was never registered, and
    /// with `UnknownExport` if the module is known but the export is not.
    pub fn lookup(&self, module_id: &str, export_name: &str) -> ResolveResult<V> {
        let export = {
            let module = self
                .modules
                .get(module_id)
                .ok_or_else(|| ResolveError::unknown_module(module_id))?;
            module
                .get(export_name)
                .cloned()
                .ok_or_else(|| ResolveError::unknown_export(module_id, export_name))?
        };

        // Shard lock is released here; a deferred thunk may touch the registry.
        Ok(export.value().clone())
    }
}

impl<V> Default for ReferenceRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for ReferenceRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceRegistry")
            .field("module_count", &self.modules.len())
            .field("modules", &self.module_ids())
            .finish()
    }
}

/// Registry shared between a resolver and its load tasks.
pub type SharedRegistry<V> = Arc<ReferenceRegistry<V>>;

/// Create a new shared registry.
pub fn new_shared_registry<V>() -> SharedRegistry<V> {
    Arc::new(ReferenceRegistry::new())
}
