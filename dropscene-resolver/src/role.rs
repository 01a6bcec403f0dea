use std::fmt;

use serde::{Deserialize, Serialize};

pub const PACKAGE_EXTENSION: &str = ".glb";
pub const MANIFEST_EXTENSION: &str = ".gltf";
pub const BUFFER_EXTENSION: &str = ".bin";
pub const IMAGE_CONTENT_TYPE_PREFIX: &str = "image/";

pub const BUFFER_MEDIA_TYPE: &str = "application/octet-stream";
pub const PACKAGE_MEDIA_TYPE: &str = "model/gltf-binary";
pub const MANIFEST_MEDIA_TYPE: &str = "model/gltf+json";

/// The part a dropped file plays in a scene, which also decides how its bytes are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceRole {
    /// A `.gltf` document, read as text.
    Manifest,
    /// A `.bin` buffer referenced by a manifest.
    ExternalBuffer,
    /// Any file the platform declared as `image/*`.
    Image,
    /// A `.glb`, which embeds its description and all of its data.
    SelfContainedPackage,
}

impl ResourceRole {
    /// Manifests and packages are the files a scene can be built from, everything else is only
    /// ever loaded on behalf of a manifest.
    pub fn is_root(self) -> bool {
        matches!(
            self,
            ResourceRole::Manifest | ResourceRole::SelfContainedPackage
        )
    }

    /// The media type a resource handle of this role is tagged with.
    pub fn media_type(self, declared_content_type: &str) -> String {
        match self {
            ResourceRole::Manifest => MANIFEST_MEDIA_TYPE.to_string(),
            ResourceRole::ExternalBuffer => BUFFER_MEDIA_TYPE.to_string(),
            ResourceRole::Image => declared_content_type.to_string(),
            ResourceRole::SelfContainedPackage => PACKAGE_MEDIA_TYPE.to_string(),
        }
    }
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceRole::Manifest => "manifest",
            ResourceRole::ExternalBuffer => "buffer",
            ResourceRole::Image => "image",
            ResourceRole::SelfContainedPackage => "package",
        };
        f.write_str(label)
    }
}

/// Decides the role of a file from its name and the content type the platform declared for it.
///
/// The extension rules take precedence over the content type, so a `.bin` that some platform
/// labels as an image is still a buffer. Files that match no rule yield `None` and are simply not
/// loaded.
pub fn classify(name: &str, declared_content_type: &str) -> Option<ResourceRole> {
    if has_extension(name, PACKAGE_EXTENSION) {
        Some(ResourceRole::SelfContainedPackage)
    } else if has_extension(name, MANIFEST_EXTENSION) {
        Some(ResourceRole::Manifest)
    } else if has_extension(name, BUFFER_EXTENSION) {
        Some(ResourceRole::ExternalBuffer)
    } else if starts_with_ignore_ascii_case(declared_content_type, IMAGE_CONTENT_TYPE_PREFIX) {
        Some(ResourceRole::Image)
    } else {
        None
    }
}

fn has_extension(name: &str, extension: &str) -> bool {
    let name = name.as_bytes();
    name.len() >= extension.len() && name[name.len() - extension.len()..].eq_ignore_ascii_case(extension.as_bytes())
}

fn starts_with_ignore_ascii_case(value: &str, prefix: &str) -> bool {
    let value = value.as_bytes();
    value.len() >= prefix.len() && value[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
