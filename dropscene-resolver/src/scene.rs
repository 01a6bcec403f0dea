use crate::ResolverError;
use crate::manifest::{Manifest, ReferenceKind};
use crate::resource::{ResourceHandle, ResourceIndex, is_handle_uri};

/// A manifest whose references point at in-memory resources, together with those resources.
///
/// This is what gets handed to the scene parser. Any URI that is not a handle URI was left
/// untouched by the rewriter because the drop did not contain the file (see the report).
#[derive(Debug, Clone)]
pub struct ResolvedScene {
    manifest: Manifest,
    resources: ResourceIndex,
}

impl ResolvedScene {
    pub fn new(manifest: Manifest, resources: ResourceIndex) -> Self {
        Self { manifest, resources }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn resources(&self) -> &ResourceIndex {
        &self.resources
    }

    pub fn into_parts(self) -> (Manifest, ResourceIndex) {
        (self.manifest, self.resources)
    }

    /// Dereferences a URI found in the manifest.
    pub fn resource(&self, uri: &str) -> Option<&ResourceHandle> {
        self.resources.by_uri(uri)
    }

    /// True if every external reference of the manifest points at a loaded resource.
    pub fn is_fully_resolved(&self) -> bool {
        ReferenceKind::ALL.iter().all(|&kind| {
            self.manifest
                .references(kind)
                .iter()
                .all(|reference| self.resources.by_uri(&reference.uri).is_some())
        })
    }

    /// The manifest as JSON, still referencing the handle URIs.
    pub fn to_json(&self) -> Result<String, ResolverError> {
        self.manifest.to_json()
    }

    /// The manifest as JSON with every handle URI replaced by a `data:` URI, so the document no
    /// longer depends on this process. Unresolved references stay as they are.
    pub fn embed(&self) -> Result<String, ResolverError> {
        let mut manifest = self.manifest.clone();
        for kind in ReferenceKind::ALL {
            for reference in self.manifest.references(kind) {
                if !is_handle_uri(&reference.uri) {
                    continue;
                }
                if let Some(handle) = self.resources.by_uri(&reference.uri) {
                    manifest.set_uri(kind, reference.index, handle.to_data_uri());
                }
            }
        }
        manifest.to_json_pretty()
    }
}
