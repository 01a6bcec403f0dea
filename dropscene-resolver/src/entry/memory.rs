//! An in-memory drop payload, for hosts that already hold the bytes (e.g. files received over IPC)
//! and for exercising the pipeline without a filesystem.
//!
//! Directories can be paged with an arbitrary page size, and both files and directories can be
//! told to fail, so that the partial-failure paths can be driven deterministically.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::entry::{DirectoryHandle, DirectoryReader, DropEntry, FileHandle};

pub type MemoryEntry = DropEntry<MemoryFile, MemoryDirectory>;

#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    content_type: String,
    contents: Result<Arc<[u8]>, String>,
    read_delay: Option<Duration>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            contents: Ok(Arc::from(bytes.into())),
            read_delay: None,
        }
    }

    /// A file without a declared content type, as most platforms report for `.gltf` and `.bin`.
    pub fn untyped(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(name, "", bytes)
    }

    /// A file whose every read fails with `reason`.
    pub fn failing(name: impl Into<String>, content_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            contents: Err(reason.into()),
            read_delay: None,
        }
    }

    /// Delays every read by `delay` (on the tokio timer), to simulate slow storage.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }
}

impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }

        match &self.contents {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(reason) => Err(io::Error::other(reason.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    name: String,
    children: Arc<Vec<MemoryEntry>>,
    page_size: usize,
    fail_after_pages: Option<usize>,
}

impl MemoryDirectory {
    pub fn new(name: impl Into<String>, children: Vec<MemoryEntry>) -> Self {
        Self {
            name: name.into(),
            children: Arc::new(children),
            page_size: usize::MAX,
            fail_after_pages: None,
        }
    }

    /// Delivers the listing in pages of at most `page_size` entries (at least one).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The listing fails once `pages` pages have been delivered. `0` fails the very first read.
    pub fn failing_after(mut self, pages: usize) -> Self {
        self.fail_after_pages = Some(pages);
        self
    }
}

impl DirectoryHandle for MemoryDirectory {
    type File = MemoryFile;
    type Reader = MemoryDirectoryReader;

    fn name(&self) -> &str {
        &self.name
    }

    fn create_reader(&self) -> Self::Reader {
        MemoryDirectoryReader {
            directory: self.clone(),
            cursor: 0,
            pages_served: 0,
        }
    }
}

pub struct MemoryDirectoryReader {
    directory: MemoryDirectory,
    cursor: usize,
    pages_served: usize,
}

impl DirectoryReader for MemoryDirectoryReader {
    type Directory = MemoryDirectory;

    async fn read_entries(&mut self) -> io::Result<Vec<MemoryEntry>> {
        if self.directory.fail_after_pages == Some(self.pages_served) {
            return Err(io::Error::other(format!(
                "listing of {} failed after {} pages",
                self.directory.name, self.pages_served
            )));
        }

        let children = &self.directory.children;
        let end = self
            .cursor
            .saturating_add(self.directory.page_size)
            .min(children.len());
        let page = children[self.cursor..end].to_vec();

        self.cursor = end;
        self.pages_served += 1;
        Ok(page)
    }
}

impl From<MemoryFile> for MemoryEntry {
    fn from(value: MemoryFile) -> Self {
        DropEntry::File(value)
    }
}

impl From<MemoryDirectory> for MemoryEntry {
    fn from(value: MemoryDirectory) -> Self {
        DropEntry::Directory(value)
    }
}
