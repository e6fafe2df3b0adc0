//! Bundler Manifest
//!
//! The producer's table from client references (source file path + export
//! name) to the module references it emits in their place. Two formats are
//! accepted:
//!
//! ## TOML (`bundler.toml`)
//!
//! ```toml
//! ["src/app/Clock.tsx".Clock]
//! id = "Clock.tsx"
//! name = "Clock"
//! chunks = ["pika", "chu"]
//! ```
//!
//! ## JSON (`bundler.json`)
//!
//! ```json
//! {
//!   "src/app/Clock.tsx": {
//!     "Clock": { "id": "Clock.tsx", "name": "Clock", "chunks": ["pika", "chu"] }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ManifestError;
use crate::loader::StaticLoader;
use crate::reference::{ClientReference, ModuleReference};
use crate::registry::{ChunkExport, ReferenceRegistry};

/// File path -> export name -> module reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundlerManifest {
    files: BTreeMap<String, BTreeMap<String, ModuleReference>>,
}

impl BundlerManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML manifest.
    pub fn from_toml_str(content: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a JSON manifest.
    pub fn from_json_str(content: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read a manifest file, choosing the format by extension (`.toml` or `.json`).
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let parse: fn(&str) -> Result<Self, ManifestError> =
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => Self::from_toml_str,
                Some("json") => Self::from_json_str,
                _ => return Err(ManifestError::UnsupportedFormat(path.to_path_buf())),
            };

        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest = parse(&content)?;
        debug!(
            path = %path.display(),
            references = manifest.len(),
            "loaded bundler manifest"
        );
        Ok(manifest)
    }

    /// Insert or overwrite the reference emitted for a client reference.
    pub fn insert(
        &mut self,
        file_path: impl Into<String>,
        export_name: impl Into<String>,
        reference: ModuleReference,
    ) {
        self.files
            .entry(file_path.into())
            .or_default()
            .insert(export_name.into(), reference);
    }

    pub fn get(&self, file_path: &str, export_name: &str) -> Option<&ModuleReference> {
        self.files.get(file_path)?.get(export_name)
    }

    /// The module reference a producer emits for `client`.
    pub fn reference_for(&self, client: &ClientReference) -> Result<&ModuleReference, ManifestError> {
        let exports = self
            .files
            .get(client.file_path())
            .ok_or_else(|| ManifestError::UnknownFile(client.file_path().to_string()))?;

        exports
            .get(client.export_name())
            .ok_or_else(|| ManifestError::UnknownExport {
                file_path: client.file_path().to_string(),
                export_name: client.export_name().to_string(),
            })
    }

    /// All entries as `(client reference, module reference)`, ordered by file path then export.
    pub fn references(&self) -> impl Iterator<Item = (ClientReference, &ModuleReference)> + '_ {
        self.files.iter().flat_map(|(file_path, exports)| {
            exports.iter().map(move |(export_name, reference)| {
                (ClientReference::new(file_path.as_str(), export_name.as_str()), reference)
            })
        })
    }

    /// Number of client references.
    pub fn len(&self) -> usize {
        self.files.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the consumer side of this manifest.
    ///
    /// Each reference's export is contributed by the last chunk it lists, so
    /// it only becomes visible once that chunk loads. References without
    /// chunks are registered directly. Every listed chunk is known to the
    /// returned loader.
    pub fn build_loader<V, F>(&self, registry: &ReferenceRegistry<V>, mut value_for: F) -> StaticLoader<V>
    where
        F: FnMut(&ClientReference, &ModuleReference) -> V,
    {
        let mut loader = StaticLoader::new();

        for (client, reference) in self.references() {
            let value = value_for(&client, reference);
            let export = ChunkExport::new(reference.module_id(), reference.export_name(), value);

            match reference.chunks().split_last() {
                Some((last, rest)) => {
                    for chunk_id in rest {
                        loader.insert_chunk(chunk_id.clone());
                    }
                    loader.insert(last.clone(), export);
                }
                None => registry.register_export(export),
            }
        }

        loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_MANIFEST: &str = r#"
        ["src/app/Clock.tsx".Clock]
        id = "Clock.tsx"
        name = "Clock"
        chunks = ["pika", "chu"]

        ["src/app/Page.tsx".Page]
        id = "Page.tsx"
        name = "Page"
    "#;

    const JSON_MANIFEST: &str = r#"{
        "src/app/Clock.tsx": {
            "Clock": { "id": "Clock.tsx", "name": "Clock", "chunks": ["pika", "chu"] }
        },
        "src/app/Page.tsx": {
            "Page": { "id": "Page.tsx", "name": "Page", "chunks": [] }
        }
    }"#;

    #[test]
    fn test_toml_and_json_agree() {
        let from_toml = BundlerManifest::from_toml_str(TOML_MANIFEST).unwrap();
        let from_json = BundlerManifest::from_json_str(JSON_MANIFEST).unwrap();

        assert_eq!(from_toml, from_json);
        assert_eq!(from_toml.len(), 2);
    }

    #[test]
    fn test_reference_for_known_entry() {
        let manifest = BundlerManifest::from_toml_str(TOML_MANIFEST).unwrap();
        let client = ClientReference::new("src/app/Clock.tsx", "Clock");

        let reference = manifest.reference_for(&client).unwrap();
        assert_eq!(
            reference,
            &ModuleReference::new("Clock.tsx", "Clock", ["pika", "chu"])
        );
    }

    #[test]
    fn test_reference_for_unknown_entries() {
        let manifest = BundlerManifest::from_toml_str(TOML_MANIFEST).unwrap();

        let missing_file = ClientReference::new("src/app/Missing.tsx", "Clock");
        assert!(matches!(
            manifest.reference_for(&missing_file),
            Err(ManifestError::UnknownFile(path)) if path == "src/app/Missing.tsx"
        ));

        let missing_export = ClientReference::new("src/app/Clock.tsx", "Watch");
        assert!(matches!(
            manifest.reference_for(&missing_export),
            Err(ManifestError::UnknownExport { .. })
        ));
    }

    #[test]
    fn test_insert_and_iterate() {
        let mut manifest = BundlerManifest::new();
        assert!(manifest.is_empty());

        manifest.insert(
            "src/app/Page.tsx",
            "Page",
            ModuleReference::new("Page.tsx", "Page", Vec::<&str>::new()),
        );
        manifest.insert(
            "src/app/Clock.tsx",
            "Clock",
            ModuleReference::new("Clock.tsx", "Clock", ["chu"]),
        );

        let clients: Vec<String> = manifest
            .references()
            .map(|(client, _)| client.to_string())
            .collect();
        assert_eq!(clients, vec!["src/app/Clock.tsx#Clock", "src/app/Page.tsx#Page"]);
        assert!(manifest.get("src/app/Clock.tsx", "Clock").is_some());
        assert!(manifest.get("src/app/Clock.tsx", "Page").is_none());
    }

    #[test]
    fn test_invalid_manifest() {
        assert!(matches!(
            BundlerManifest::from_toml_str("[broken"),
            Err(ManifestError::Toml(_))
        ));
        assert!(matches!(
            BundlerManifest::from_json_str(r#"{"src/app/Clock.tsx": {"Clock": {"name": "Clock"}}}"#),
            Err(ManifestError::Json(_))
        ));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let err = BundlerManifest::load(Path::new("bundler.yaml")).unwrap_err();
        assert!(matches!(err, ManifestError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_build_loader() {
        let manifest = BundlerManifest::from_toml_str(TOML_MANIFEST).unwrap();
        let registry = ReferenceRegistry::new();

        let loader = manifest.build_loader(&registry, |client, _| client.to_string());

        // Chunkless references are registered up front
        assert_eq!(
            registry.lookup("Page.tsx", "Page").unwrap(),
            "src/app/Page.tsx#Page"
        );
        // Chunked ones wait for their chunks
        assert!(!registry.contains_module("Clock.tsx"));
        assert!(loader.contains_chunk("pika"));
        assert!(loader.contains_chunk("chu"));
        assert_eq!(loader.chunk_count(), 2);
    }
}
