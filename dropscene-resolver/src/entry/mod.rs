//! The platform side of a drop: files and directories as the drag-and-drop surface hands them to us.
//!
//! A platform (the native filesystem, a browser's `FileSystemEntry`, an archive, ...) implements
//! [`FileHandle`], [`DirectoryHandle`] and [`DirectoryReader`]. Everything after that, starting with
//! the [`walker`], is platform independent.
//!
//! Every directory page and every file read is a suspension point, so that many of them can be in
//! flight at the same time.

use std::future::Future;
use std::io;

pub mod memory;
pub mod walker;


/// One item of a drop payload, or of a directory listing.
#[derive(Debug, Clone)]
pub enum DropEntry<F, D> {
    File(F),
    Directory(D),
}

/// The entry type produced by listing a directory of type `D`.
pub type EntryOf<D> = DropEntry<<D as DirectoryHandle>::File, D>;

impl<F: FileHandle, D: DirectoryHandle> DropEntry<F, D> {
    pub fn name(&self) -> &str {
        match self {
            DropEntry::File(file) => file.name(),
            DropEntry::Directory(directory) => directory.name(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, DropEntry::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, DropEntry::Directory(_))
    }
}

pub trait FileHandle: Clone + Send + Sync + 'static {
    /// The leaf name of the file, without any directory components.
    fn name(&self) -> &str;

    /// The MIME type the platform declared for this file, or an empty string if it didn't.
    fn content_type(&self) -> &str;

    fn read_bytes(&self) -> impl Future<Output = io::Result<Vec<u8>>> + Send;
}

pub trait DirectoryHandle: Send + Sync + Sized + 'static {
    type File: FileHandle;
    type Reader: DirectoryReader<Directory = Self>;

    fn name(&self) -> &str;

    fn create_reader(&self) -> Self::Reader;
}

pub trait DirectoryReader: Send + 'static {
    type Directory: DirectoryHandle;

    /// Returns the next page of children. Listings may be delivered incrementally, the reader has
    /// to be queried again until it returns an empty page, which signals that it is exhausted.
    fn read_entries(&mut self) -> impl Future<Output = io::Result<Vec<EntryOf<Self::Directory>>>> + Send;
}
