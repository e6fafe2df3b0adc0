//! modref - Module Reference Registry and Chunk-Loading Resolver
//!
//! This library implements the indirection layer between a *producer* that
//! cannot inline a value and a *consumer* that owns it:
//!
//! 1. **Producer** (`manifest` module)
//!    - Marks a value by its [`ClientReference`] (source file + export name)
//!    - Looks it up in the [`BundlerManifest`]
//!    - Emits the resulting [`ModuleReference`] (module id, export name, chunks)
//!
//! 2. **Consumer** (`resolver` and `registry` modules)
//!    - Receives the placeholder from the stream decoder
//!    - The [`Resolver`] loads every required chunk through a [`ChunkLoader`],
//!      coalescing concurrent loads of the same chunk
//!    - The [`ReferenceRegistry`] maps `(module id, export name)` to the value
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use modref::{new_shared_registry, ChunkExport, ModuleReference, Resolver, StaticLoader};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = new_shared_registry();
//! let loader = StaticLoader::new()
//!     .with_empty_chunk("pika")
//!     .with_export("chu", ChunkExport::new("Clock.tsx", "Clock", "ClockComponent"));
//! let resolver = Resolver::new(Arc::clone(&registry), loader);
//!
//! let reference = ModuleReference::from_json(
//!     r#"{"id":"Clock.tsx","name":"Clock","chunks":["pika","chu"]}"#,
//! ).unwrap();
//! assert_eq!(resolver.resolve(&reference).await.unwrap(), "ClockComponent");
//! # });
//! ```
//!
//! # Errors
//!
//! - `UnknownModule` / `UnknownExport`: the registry has no such entry
//! - `ChunkLoad`: the loader failed (or timed out); wraps the cause
//!
//! No error is downgraded to a default value and nothing is retried internally.

pub mod error;
pub mod loader;
pub mod manifest;
pub mod reference;
pub mod registry;
pub mod resolver;

pub use error::{LoadInterrupted, ManifestError, ResolveError, ResolveResult};
pub use loader::{ChunkLoader, FnLoader, LoadFailure, LoggingLoader, StaticLoader};
pub use manifest::BundlerManifest;
pub use reference::{ChunkId, ClientReference, ModuleReference};
pub use registry::{
    new_shared_registry, ChunkExport, Deferred, Export, ReferenceRegistry, SharedRegistry,
};
pub use resolver::{ResolveOptions, Resolver};
