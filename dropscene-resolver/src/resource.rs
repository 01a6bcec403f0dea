use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Handle URIs look like `blob:dropscene/<generation>/<serial>`.
pub const HANDLE_URI_PREFIX: &str = "blob:dropscene/";

/// The in-memory stand-in for a dropped file: its bytes plus an opaque URI that a manifest can
/// reference instead of the original file name.
///
/// Cloning is cheap, the bytes are shared.
#[derive(Clone)]
pub struct ResourceHandle {
    uri: String,
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl ResourceHandle {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The name of the file the bytes were read from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Renders the resource as a self-contained `data:` URI, for consumers that cannot dereference
    /// handle URIs.
    pub fn to_data_uri(&self) -> String {
        let media_type = if self.media_type.is_empty() {
            crate::role::BUFFER_MEDIA_TYPE
        } else {
            &self.media_type
        };
        format!("data:{};base64,{}", media_type, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub fn is_handle_uri(uri: &str) -> bool {
    uri.starts_with(HANDLE_URI_PREFIX)
}

/// Hands out resource handles for one resolution. The generation is part of every URI, so handles
/// of different drops can never be confused with each other.
#[derive(Debug)]
pub struct HandleAllocator {
    generation: u64,
    next_serial: AtomicU64,
}

impl HandleAllocator {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            next_serial: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn allocate(&self, name: &str, media_type: String, bytes: Vec<u8>) -> ResourceHandle {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        ResourceHandle {
            uri: format!("{}{}/{}", HANDLE_URI_PREFIX, self.generation, serial),
            name: name.to_string(),
            media_type,
            bytes: Arc::from(bytes),
        }
    }
}

/// The buffers and images of one drop that were loaded successfully, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    buffers: HashMap<String, ResourceHandle>,
    images: HashMap<String, ResourceHandle>,
}

impl ResourceIndex {
    pub fn insert_buffer(&mut self, handle: ResourceHandle) -> Option<ResourceHandle> {
        self.buffers.insert(handle.name.clone(), handle)
    }

    pub fn insert_image(&mut self, handle: ResourceHandle) -> Option<ResourceHandle> {
        self.images.insert(handle.name.clone(), handle)
    }

    pub fn buffer(&self, name: &str) -> Option<&ResourceHandle> {
        self.buffers.get(name)
    }

    pub fn image(&self, name: &str) -> Option<&ResourceHandle> {
        self.images.get(name)
    }

    pub fn buffers(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.buffers.values()
    }

    pub fn images(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.images.values()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn len(&self) -> usize {
        self.buffers.len() + self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.images.is_empty()
    }

    /// Dereferences a handle URI, as written into a manifest by the rewriter.
    pub fn by_uri(&self, uri: &str) -> Option<&ResourceHandle> {
        if !is_handle_uri(uri) {
            return None;
        }

        self.buffers
            .values()
            .chain(self.images.values())
            .find(|handle| handle.uri == uri)
    }
}
