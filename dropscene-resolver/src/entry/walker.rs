use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use log::{error, trace, warn};
use tokio::task::JoinSet;

use crate::entry::{DirectoryHandle, DirectoryReader, DropEntry, EntryOf};
use crate::report::{EnumerationFailure, NameCollision};

/// File names that are never part of a scene, when found inside a dropped directory.
const SYSTEM_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Directory names that are skipped during traversal.
const SYSTEM_DIRS: &[&str] = &["__MACOSX"];

#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    /// Skip hidden and OS bookkeeping entries found while recursing. Entries the user dropped
    /// explicitly are never filtered.
    pub skip_system_entries: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            skip_system_entries: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DroppedFile<F> {
    /// The leaf name, which is also the key in the [`FlatFileSet`].
    pub name: String,
    /// The path relative to the drop, using `/` as separator.
    pub path: String,
    pub handle: F,
}

/// All files of a drop, addressed by their leaf name.
#[derive(Debug, Clone)]
pub struct FlatFileSet<F> {
    files: HashMap<String, DroppedFile<F>>,
}

impl<F> Default for FlatFileSet<F> {
    fn default() -> Self {
        Self {
            files: HashMap::new(),
        }
    }
}

impl<F> FlatFileSet<F> {
    /// Inserts the file under its name, returning the file it replaced, if any.
    pub fn insert(&mut self, file: DroppedFile<F>) -> Option<DroppedFile<F>> {
        self.files.insert(file.name.clone(), file)
    }

    pub fn get(&self, name: &str) -> Option<&DroppedFile<F>> {
        self.files.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DroppedFile<F>> {
        self.files.values()
    }

    pub fn into_files(self) -> impl Iterator<Item = DroppedFile<F>> {
        self.files.into_values()
    }
}

#[derive(Debug)]
pub struct WalkOutcome<F> {
    pub files: FlatFileSet<F>,
    pub failures: Vec<EnumerationFailure>,
    pub collisions: Vec<NameCollision>,
}

/// Whatever a subtree yielded, in listing order.
struct Listing<F> {
    files: Vec<DroppedFile<F>>,
    failures: Vec<EnumerationFailure>,
}

impl<F> Listing<F> {
    fn empty() -> Self {
        Self {
            files: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn append(&mut self, mut other: Listing<F>) {
        self.files.append(&mut other.files);
        self.failures.append(&mut other.failures);
    }
}

type ListingFuture<F> = Pin<Box<dyn Future<Output = Listing<F>> + Send>>;

/// Flattens a drop payload into a [`FlatFileSet`].
///
/// Directories are recursed into without a depth limit, their listings are read page by page until
/// the reader reports exhaustion, and the entries of each page are expanded concurrently.
/// A directory whose listing fails keeps whatever it yielded before the failure; the failure is
/// recorded and its siblings are unaffected.
///
/// Name collisions are resolved in favour of the entry that comes later in drop order (listing
/// order within directories), independent of which expansion happened to finish first.
pub async fn expand<D: DirectoryHandle>(entries: Vec<EntryOf<D>>, options: WalkOptions) -> WalkOutcome<D::File> {
    let listing = expand_siblings::<D>(entries, String::new(), options, true).await;

    let mut files = FlatFileSet::default();
    let mut collisions = Vec::new();
    for file in listing.files {
        let kept = file.path.clone();
        if let Some(discarded) = files.insert(file) {
            warn!(
                "Two dropped files are named {}, using {} over {}",
                discarded.name, kept, discarded.path
            );
            collisions.push(NameCollision {
                name: discarded.name,
                kept,
                discarded: discarded.path,
            });
        }
    }

    WalkOutcome {
        files,
        failures: listing.failures,
        collisions,
    }
}

async fn expand_siblings<D: DirectoryHandle>(
    entries: Vec<EntryOf<D>>,
    parent: String,
    options: WalkOptions,
    top_level: bool,
) -> Listing<D::File> {
    let count = entries.len();
    let mut tasks = JoinSet::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let parent = parent.clone();
        tasks.spawn(async move { (index, expand_entry::<D>(entry, parent, options, top_level).await) });
    }

    let mut slots: Vec<Option<Listing<D::File>>> = (0..count).map(|_| None).collect();
    let mut listing = Listing::empty();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, sub_listing)) => slots[index] = Some(sub_listing),
            Err(err) => {
                error!("Expanding an entry of '{}' aborted: {}", display_path(&parent), err);
                listing.failures.push(EnumerationFailure {
                    path: parent.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    for sub_listing in slots.into_iter().flatten() {
        listing.append(sub_listing);
    }
    listing
}

fn expand_entry<D: DirectoryHandle>(
    entry: EntryOf<D>,
    parent: String,
    options: WalkOptions,
    top_level: bool,
) -> ListingFuture<D::File> {
    Box::pin(async move {
        let name = entry.name().to_string();
        if !top_level && options.skip_system_entries && is_hidden_or_system(&name) {
            trace!("Skipping system entry {}", join_path(&parent, &name));
            return Listing::empty();
        }

        let path = join_path(&parent, &name);
        match entry {
            DropEntry::File(handle) => {
                trace!("Found file {}", path);
                Listing {
                    files: vec![DroppedFile { name, path, handle }],
                    failures: Vec::new(),
                }
            }
            DropEntry::Directory(directory) => expand_directory::<D>(directory, path, options).await,
        }
    })
}

async fn expand_directory<D: DirectoryHandle>(directory: D, path: String, options: WalkOptions) -> Listing<D::File> {
    let mut reader = directory.create_reader();
    let mut listing = Listing::empty();
    let mut pages = 0usize;

    loop {
        match reader.read_entries().await {
            Ok(page) if page.is_empty() => break,
            Ok(page) => {
                pages += 1;
                trace!("Directory {} page {}: {} entries", path, pages, page.len());
                listing.append(expand_siblings::<D>(page, path.clone(), options, false).await);
            }
            Err(err) => {
                error!("Could not list directory {}: {}", path, err);
                listing.failures.push(EnumerationFailure {
                    path: path.clone(),
                    reason: err.to_string(),
                });
                break;
            }
        }
    }

    listing
}

/// Returns true if the given file/directory name should be excluded while recursing.
pub fn is_hidden_or_system(name: &str) -> bool {
    name.starts_with('.') || SYSTEM_FILES.contains(&name) || SYSTEM_DIRS.contains(&name)
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<drop>" } else { path }
}
