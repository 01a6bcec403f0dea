//! The native filesystem as a drop surface: every path given on the command line is one dropped
//! entry, directories are listed lazily in pages.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use dropscene_resolver::entry::{DirectoryHandle, DirectoryReader, DropEntry, FileHandle};
use log::{trace, warn};

pub type FsEntry = DropEntry<FsFile, FsDirectory>;

#[derive(Debug, Clone)]
pub struct FsFile {
    name: String,
    path: PathBuf,
    content_type: &'static str,
}

impl FsFile {
    fn new(name: String, path: PathBuf) -> Self {
        let content_type = content_type_for(&path);
        Self {
            name,
            path,
            content_type,
        }
    }
}

impl FileHandle for FsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        self.content_type
    }

    async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

#[derive(Debug, Clone)]
pub struct FsDirectory {
    name: String,
    path: PathBuf,
    page_size: usize,
    /// Canonical paths from the dropped directory down to this one, this one included.
    ancestors: Arc<[PathBuf]>,
}

impl FsDirectory {
    async fn new(name: String, path: PathBuf, page_size: usize, parents: &[PathBuf]) -> Self {
        let canonical = tokio::fs::canonicalize(&path)
            .await
            .unwrap_or_else(|_| path.clone());
        let ancestors = parents.iter().cloned().chain([canonical]).collect();
        Self {
            name,
            path,
            page_size,
            ancestors,
        }
    }
}

impl DirectoryHandle for FsDirectory {
    type File = FsFile;
    type Reader = FsDirectoryReader;

    fn name(&self) -> &str {
        &self.name
    }

    fn create_reader(&self) -> Self::Reader {
        FsDirectoryReader {
            directory: self.clone(),
            read_dir: None,
            exhausted: false,
        }
    }
}

pub struct FsDirectoryReader {
    directory: FsDirectory,
    // opened on the first read, so that creating a reader never fails
    read_dir: Option<tokio::fs::ReadDir>,
    exhausted: bool,
}

impl DirectoryReader for FsDirectoryReader {
    type Directory = FsDirectory;

    async fn read_entries(&mut self) -> io::Result<Vec<FsEntry>> {
        if self.exhausted {
            return Ok(Vec::new());
        }

        if self.read_dir.is_none() {
            self.read_dir = Some(tokio::fs::read_dir(&self.directory.path).await?);
        }
        let Some(read_dir) = self.read_dir.as_mut() else {
            return Ok(Vec::new());
        };

        let mut page = Vec::new();
        while page.len() < self.directory.page_size {
            let Some(dir_entry) = read_dir.next_entry().await? else {
                self.exhausted = true;
                break;
            };

            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if let Some(entry) = entry_at(name, dir_entry.path(), &self.directory).await {
                page.push(entry);
            }
        }

        trace!(
            "Listed {} entries of {}",
            page.len(),
            self.directory.path.display()
        );
        Ok(page)
    }
}

/// Follows symlinks, except into a directory that is already being listed further up, which would
/// never end. Entries that are neither files nor directories (or that vanished) are skipped.
async fn entry_at(name: String, path: PathBuf, parent: &FsDirectory) -> Option<FsEntry> {
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(err) => {
            warn!("Skipping {}: {}", path.display(), err);
            return None;
        }
    };

    if metadata.is_dir() {
        let canonical = match tokio::fs::canonicalize(&path).await {
            Ok(canonical) => canonical,
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                return None;
            }
        };
        if parent.ancestors.contains(&canonical) {
            warn!(
                "Skipping {}, it links back to {}",
                path.display(),
                canonical.display()
            );
            return None;
        }

        Some(DropEntry::Directory(
            FsDirectory::new(name, path, parent.page_size, &parent.ancestors).await,
        ))
    } else if metadata.is_file() {
        Some(DropEntry::File(FsFile::new(name, path)))
    } else {
        trace!("Skipping {}, neither a file nor a directory", path.display());
        None
    }
}

/// Turns the paths the user handed us into the entries of one drop, keeping their order.
pub async fn entries_from_paths(paths: &[PathBuf], page_size: usize) -> anyhow::Result<Vec<FsEntry>> {
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot drop {}", path.display()))?;

        let name = display_name(path).await;
        let entry = if metadata.is_dir() {
            DropEntry::Directory(FsDirectory::new(name, path.clone(), page_size.max(1), &[]).await)
        } else {
            DropEntry::File(FsFile::new(name, path.clone()))
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// The leaf name of `path`, resolving `.` and `..` so the drop root has a real name.
async fn display_name(path: &Path) -> String {
    if let Some(name) = path.file_name() {
        return name.to_string_lossy().into_owned();
    }

    tokio::fs::canonicalize(path)
        .await
        .ok()
        .and_then(|canonical| {
            canonical
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| path.display().to_string())
}

/// The MIME type a browser would declare for the file. Only images matter to the classifier,
/// everything else is left undeclared.
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(extension) = path.extension() else {
        return "";
    };

    match extension.to_string_lossy().to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "ktx2" => "image/ktx2",
        _ => "",
    }
}
