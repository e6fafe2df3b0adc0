//! Module References
//!
//! A producer that cannot inline a value (because it only exists in the
//! consumer's address space) emits a [`ModuleReference`] in its place:
//! the module id, the export name, and the chunks that must be loaded before
//! the module can be required.
//!
//! On the producer side the value is marked by a [`ClientReference`]
//! (source file path + export name), which the bundler manifest turns into
//! a module reference.
//!
//! ## Serialized Form
//!
//! References cross the process boundary as a JSON object using the bundler's
//! field names:
//!
//! ```json
//! {"id": "Clock.tsx", "name": "Clock", "chunks": ["pika", "chu"]}
//! ```

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of an independently loadable unit of code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ChunkId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ChunkId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChunkId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChunkId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Placeholder for an export that must be resolved by the consumer.
///
/// Immutable once constructed. No uniqueness is enforced on the module id;
/// the registry lookup is what gives it meaning.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleReference {
    /// Bundler module id (e.g., `"Clock.tsx"`).
    #[serde(rename = "id")]
    module_id: String,

    /// Name the module exports the value under.
    #[serde(rename = "name")]
    export_name: String,

    /// Chunks that must be loaded before the module can be required.
    #[serde(default)]
    chunks: Vec<ChunkId>,
}

impl ModuleReference {
    /// Create a reference from its three fields.
    pub fn new<I>(module_id: impl Into<String>, export_name: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ChunkId>,
    {
        Self {
            module_id: module_id.into(),
            export_name: export_name.into(),
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn export_name(&self) -> &str {
        &self.export_name
    }

    /// Required chunks, in the order the producer listed them.
    pub fn chunks(&self) -> &[ChunkId] {
        &self.chunks
    }

    /// Parse the JSON object form (`{"id", "name", "chunks"}`).
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize to the JSON object form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for ModuleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.module_id, self.export_name)
    }
}

/// Producer-side marker for a value exported from a consumer module.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientReference {
    file_path: String,
    export_name: String,
}

impl ClientReference {
    pub fn new(file_path: impl Into<String>, export_name: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            export_name: export_name.into(),
        }
    }

    /// Source path of the module, as the bundler manifest keys it.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn export_name(&self) -> &str {
        &self.export_name
    }
}

impl fmt::Display for ClientReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file_path, self.export_name)
    }
}
