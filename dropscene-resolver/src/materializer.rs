//! Loading of the individual files of a drop, each in the representation its role requires.

use std::sync::Arc;

use itertools::Itertools;
use log::{debug, error, trace};
use tokio::task::JoinSet;

use crate::ResolverError;
use crate::entry::FileHandle;
use crate::entry::walker::{DroppedFile, FlatFileSet};
use crate::report::MaterializationFailure;
use crate::resource::{HandleAllocator, ResourceHandle};
use crate::role::{ResourceRole, classify};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone)]
pub enum MaterializedResource {
    /// Decoded manifest text. Parsing is left to the coordinator, once everything is loaded.
    Manifest { name: String, path: String, text: String },
    Buffer(ResourceHandle),
    Image(ResourceHandle),
    Package(ResourceHandle),
}

impl MaterializedResource {
    pub fn name(&self) -> &str {
        match self {
            MaterializedResource::Manifest { name, .. } => name,
            MaterializedResource::Buffer(handle)
            | MaterializedResource::Image(handle)
            | MaterializedResource::Package(handle) => handle.name(),
        }
    }

    pub fn role(&self) -> ResourceRole {
        match self {
            MaterializedResource::Manifest { .. } => ResourceRole::Manifest,
            MaterializedResource::Buffer(_) => ResourceRole::ExternalBuffer,
            MaterializedResource::Image(_) => ResourceRole::Image,
            MaterializedResource::Package(_) => ResourceRole::SelfContainedPackage,
        }
    }
}

/// Reads one file according to its role.
pub async fn materialize<F: FileHandle>(
    file: &DroppedFile<F>,
    role: ResourceRole,
    allocator: &HandleAllocator,
) -> Result<MaterializedResource, MaterializationFailure> {
    let failure = |reason: String| {
        error!("Could not load {} {}: {}", role, file.path, reason);
        MaterializationFailure {
            name: file.name.clone(),
            path: file.path.clone(),
            role,
            reason,
        }
    };

    let bytes = file
        .handle
        .read_bytes()
        .await
        .map_err(|err| failure(err.to_string()))?;
    trace!("Read {} bytes from {}", bytes.len(), file.path);

    let media_type = role.media_type(file.handle.content_type());
    Ok(match role {
        ResourceRole::Manifest => MaterializedResource::Manifest {
            name: file.name.clone(),
            path: file.path.clone(),
            text: decode_text(bytes).map_err(|err| failure(err.to_string()))?,
        },
        ResourceRole::ExternalBuffer => MaterializedResource::Buffer(allocator.allocate(&file.name, media_type, bytes)),
        ResourceRole::Image => MaterializedResource::Image(allocator.allocate(&file.name, media_type, bytes)),
        ResourceRole::SelfContainedPackage => {
            MaterializedResource::Package(allocator.allocate(&file.name, media_type, bytes))
        }
    })
}

/// Decodes manifest bytes as UTF-8, tolerating a byte order mark.
pub fn decode_text(mut bytes: Vec<u8>) -> Result<String, ResolverError> {
    if bytes.starts_with(UTF8_BOM) {
        bytes.drain(..UTF8_BOM.len());
    }
    Ok(String::from_utf8(bytes)?)
}

/// The result of materializing a whole file set. All lists are ordered by file name.
#[derive(Debug, Default)]
pub struct MaterializedBatch {
    pub resources: Vec<MaterializedResource>,
    pub failures: Vec<MaterializationFailure>,
    /// Files that matched no role and were not read at all.
    pub ignored: Vec<String>,
}

/// Classifies every file and materializes all of the relevant ones concurrently, returning only
/// once every single read has either succeeded or failed.
pub async fn materialize_all<F: FileHandle>(files: FlatFileSet<F>, allocator: Arc<HandleAllocator>) -> MaterializedBatch {
    let mut batch = MaterializedBatch::default();
    let mut tasks = JoinSet::new();
    let mut pending = Vec::new();

    for file in files
        .into_files()
        .sorted_by(|a, b| a.name.cmp(&b.name))
    {
        let Some(role) = classify(&file.name, file.handle.content_type()) else {
            debug!("Ignoring {}, it plays no role in a scene", file.path);
            batch.ignored.push(file.name);
            continue;
        };

        debug!("{} is a {}", file.path, role);
        let slot = pending.len();
        pending.push((file.name.clone(), file.path.clone(), role));

        let allocator = allocator.clone();
        tasks.spawn(async move { (slot, materialize(&file, role, &allocator).await) });
    }

    let mut slots: Vec<Option<Result<MaterializedResource, MaterializationFailure>>> =
        (0..pending.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, result)) => slots[slot] = Some(result),
            Err(err) => error!("A materialization task aborted: {}", err),
        }
    }

    for ((name, path, role), result) in pending.into_iter().zip(slots) {
        match result {
            Some(Ok(resource)) => batch.resources.push(resource),
            Some(Err(failure)) => batch.failures.push(failure),
            None => batch.failures.push(MaterializationFailure {
                name,
                path,
                role,
                reason: "the read was aborted".to_string(),
            }),
        }
    }

    batch
}

#[cfg(test)]
mod tests;
