use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ResolverError;

/// The two reference tables of a manifest that point at other files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    Buffer,
    Image,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 2] = [ReferenceKind::Buffer, ReferenceKind::Image];

    /// The name of the top-level array holding references of this kind.
    pub fn table(self) -> &'static str {
        match self {
            ReferenceKind::Buffer => "buffers",
            ReferenceKind::Image => "images",
        }
    }

    /// The file name a reference URI is matched against.
    ///
    /// Buffers are matched verbatim. Images are commonly referenced through a relative path
    /// (`textures/diffuse.png`) while the drop only knows leaf names, so only the last path segment counts.
    pub fn lookup_key(self, uri: &str) -> &str {
        match self {
            ReferenceKind::Buffer => uri,
            ReferenceKind::Image => uri.rsplit('/').next().unwrap_or(uri),
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Buffer => f.write_str("buffer"),
            ReferenceKind::Image => f.write_str("image"),
        }
    }
}

/// A reference to another file, found in one of the manifest's tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestReference {
    pub kind: ReferenceKind,
    pub index: usize,
    pub uri: String,
}

/// A parsed scene manifest.
///
/// The document is kept as generic JSON, everything but the `uri` fields of the reference tables
/// passes through untouched. No schema validation happens here, that is the scene parser's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    document: Value,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, ResolverError> {
        Ok(Self {
            document: serde_json::from_str(text)?,
        })
    }

    pub fn from_value(document: Value) -> Self {
        Self { document }
    }

    pub fn as_value(&self) -> &Value {
        &self.document
    }

    pub fn into_value(self) -> Value {
        self.document
    }

    /// All external references of the given kind, in table order.
    ///
    /// Entries without a `uri` (data stored in a buffer view or in a `.glb` chunk) and entries that
    /// already carry a `data:` URI do not refer to other files and are skipped. A missing table is
    /// treated as empty.
    pub fn references(&self, kind: ReferenceKind) -> Vec<ManifestReference> {
        let Some(table) = self.document.get(kind.table()).and_then(Value::as_array) else {
            return Vec::new();
        };

        table
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let uri = entry.get("uri")?.as_str()?;
                if uri.is_empty() || uri.starts_with("data:") {
                    return None;
                }
                Some(ManifestReference {
                    kind,
                    index,
                    uri: uri.to_string(),
                })
            })
            .collect()
    }

    pub fn buffer_references(&self) -> Vec<ManifestReference> {
        self.references(ReferenceKind::Buffer)
    }

    pub fn image_references(&self) -> Vec<ManifestReference> {
        self.references(ReferenceKind::Image)
    }

    pub fn uri(&self, kind: ReferenceKind, index: usize) -> Option<&str> {
        self.document
            .get(kind.table())?
            .get(index)?
            .get("uri")?
            .as_str()
    }

    /// Replaces the `uri` of the given table entry. Returns false if there is no such entry.
    pub fn set_uri(&mut self, kind: ReferenceKind, index: usize, uri: String) -> bool {
        let Some(entry) = self
            .document
            .get_mut(kind.table())
            .and_then(|table| table.get_mut(index))
            .and_then(Value::as_object_mut)
        else {
            return false;
        };

        entry.insert("uri".to_string(), Value::String(uri));
        true
    }

    pub fn to_json(&self) -> Result<String, ResolverError> {
        Ok(serde_json::to_string(&self.document)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ResolverError> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}
