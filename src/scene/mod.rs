use std::fmt;

use dropscene_resolver::ResolverError;
use dropscene_resolver::coordinator::SceneParser;
use dropscene_resolver::resource::ResourceHandle;
use dropscene_resolver::scene::ResolvedScene;
use gltf::{Document, Gltf};
use log::{debug, warn};

/// Parses resolved scenes with the `gltf` crate. Only the document is validated; buffer and image
/// contents are looked up in the resolved scene, not decoded.
#[derive(Debug, Default)]
pub struct GltfSceneParser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSummary {
    pub name: Option<String>,
    pub scenes: usize,
    pub nodes: usize,
    pub meshes: usize,
    pub materials: usize,
    pub animations: usize,
    pub buffers: usize,
    pub images: usize,
    /// Buffers and images whose URI does not point at a loaded resource.
    pub missing: usize,
    /// Buffers whose loaded bytes are fewer than the declared byteLength.
    pub truncated: usize,
}

impl SceneSummary {
    fn of(document: &Document) -> Self {
        Self {
            name: document
                .default_scene()
                .or_else(|| document.scenes().next())
                .and_then(|scene| scene.name().map(str::to_string)),
            scenes: document.scenes().count(),
            nodes: document.nodes().count(),
            meshes: document.meshes().count(),
            materials: document.materials().count(),
            animations: document.animations().count(),
            buffers: document.buffers().count(),
            images: document.images().count(),
            missing: 0,
            truncated: 0,
        }
    }
}

impl fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scene '{}': {} scenes, {} nodes, {} meshes, {} materials, {} animations, {} buffers, {} images",
            self.name.as_deref().unwrap_or("<unnamed>"),
            self.scenes,
            self.nodes,
            self.meshes,
            self.materials,
            self.animations,
            self.buffers,
            self.images
        )?;
        if self.missing > 0 {
            write!(f, " ({} missing)", self.missing)?;
        }
        if self.truncated > 0 {
            write!(f, " ({} truncated)", self.truncated)?;
        }
        Ok(())
    }
}

fn parse(bytes: &[u8]) -> Result<Gltf, ResolverError> {
    Gltf::from_slice(bytes).map_err(|err| ResolverError::ParserError {
        reason: err.to_string(),
    })
}

impl SceneParser for GltfSceneParser {
    type Output = SceneSummary;

    fn parse_manifest(&mut self, scene: &ResolvedScene) -> Result<SceneSummary, ResolverError> {
        let parsed = parse(scene.to_json()?.as_bytes())?;
        let mut summary = SceneSummary::of(&parsed);

        for buffer in parsed.buffers() {
            let gltf::buffer::Source::Uri(uri) = buffer.source() else {
                continue;
            };

            match scene.resource(uri) {
                Some(handle) if handle.len() < buffer.length() => {
                    warn!(
                        "Buffer {} declares {} bytes, but {} only has {}",
                        buffer.index(),
                        buffer.length(),
                        handle.name(),
                        handle.len()
                    );
                    summary.truncated += 1;
                }
                Some(_) => {}
                None if !uri.starts_with("data:") => summary.missing += 1,
                None => {}
            }
        }

        for image in parsed.images() {
            if let gltf::image::Source::Uri { uri, .. } = image.source() {
                if scene.resource(uri).is_none() && !uri.starts_with("data:") {
                    summary.missing += 1;
                }
            }
        }

        debug!("Parsed manifest: {}", summary);
        Ok(summary)
    }

    fn parse_package(&mut self, package: &ResourceHandle) -> Result<SceneSummary, ResolverError> {
        let parsed = parse(package.bytes())?;
        let mut summary = SceneSummary::of(&parsed);

        // Anything but the embedded blob would have to be dropped alongside a .gltf instead.
        summary.missing = parsed
            .buffers()
            .filter(|buffer| matches!(buffer.source(), gltf::buffer::Source::Uri(uri) if !uri.starts_with("data:")))
            .count();
        if let Some(blob) = &parsed.blob {
            debug!("{} carries a {} byte binary chunk", package.name(), blob.len());
        }

        debug!("Parsed package: {}", summary);
        Ok(summary)
    }
}
