//! Mutable, filesystem-style view over a jar.
//!
//! A [`VirtualArchive`] loads every entry of a zip container into memory,
//! lets transformers append, replace, move and delete entries, and writes the
//! result back when [`close`](VirtualArchive::close) is called. Mutations
//! never touch the container on disk before that point, so an archive that is
//! dropped on an error path is left exactly as it was.
//!
//! # Example
//!
//! ```rust,no_run
//! use jarwright::archive::{OpenMode, VirtualArchive};
//!
//! let mut archive = VirtualArchive::open("app.jar", OpenMode::ReadWrite)?;
//! for path in archive.walk("") {
//!     println!("{}", path);
//! }
//! archive.rename("com/old/Main.class", "com/new/Main.class")?;
//! archive.close()?;
//! # Ok::<(), jarwright::Error>(())
//! ```
//!
//! # Path Handling
//!
//! Paths use forward slashes (`/`) as separators, regardless of the platform.
//! Both absolute paths (`/file.txt`) and relative paths (`file.txt`) are
//! supported and treated equivalently.

mod container;

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::entry_path::EntryPath;
use crate::{Error, Result};

/// How a [`VirtualArchive`] is backed by its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read entries only; every mutation fails with [`Error::Unsupported`].
    ReadOnly,
    /// Open an existing container and write changes back on close.
    ReadWrite,
    /// Start empty and create (or replace) the container on close.
    CreateNew,
}

impl OpenMode {
    /// Returns true if archives in this mode accept mutations.
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::ReadOnly)
    }
}

/// An in-memory, mutable view of one archive's entries.
///
/// Entries are keyed by normalized path; no two entries ever share a path.
/// Directories are implicit (derived from entry paths). Directory entries
/// read from the container or created by writes are remembered only so that
/// empty ones can be written back or cleaned up.
#[derive(Debug)]
pub struct VirtualArchive {
    /// Backing container, `None` for purely in-memory archives
    path: Option<PathBuf>,
    mode: OpenMode,
    entries: BTreeMap<EntryPath, Vec<u8>>,
    directories: BTreeSet<EntryPath>,
    dirty: bool,
    closed: bool,
}

impl VirtualArchive {
    /// Opens the container at `path` in the given mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArchiveNotFound`] when `path` does not exist and the
    /// mode is not [`OpenMode::CreateNew`], and [`Error::Zip`] when the file
    /// is not a readable zip container.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let (entries, directories) = match mode {
            OpenMode::CreateNew => (BTreeMap::new(), BTreeSet::new()),
            OpenMode::ReadOnly | OpenMode::ReadWrite => {
                if !path.is_file() {
                    return Err(Error::ArchiveNotFound {
                        path: path.to_path_buf(),
                    });
                }
                container::load(path)?
            }
        };

        log::debug!(
            "Opened {} ({:?}, {} entries)",
            path.display(),
            mode,
            entries.len()
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            mode,
            entries,
            directories,
            // a fresh container must be written even if nothing is added
            dirty: mode == OpenMode::CreateNew,
            closed: false,
        })
    }

    /// Creates an empty, writable archive with no backing container.
    ///
    /// Closing it is a no-op. Useful for building entries before deciding
    /// where they go, and for tests.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            mode: OpenMode::CreateNew,
            entries: BTreeMap::new(),
            directories: BTreeSet::new(),
            dirty: false,
            closed: false,
        }
    }

    /// Returns the backing container path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the mode this archive was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Returns a display name for log and error messages.
    pub fn display_name(&self) -> String {
        match &self.path {
            Some(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            None => "<memory>".to_string(),
        }
    }

    /// Returns the number of regular-file entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the archive holds no regular files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if there are mutations not yet written to the container.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns true if `path` names a regular file.
    pub fn is_file(&self, path: &str) -> bool {
        match EntryPath::new(path) {
            Ok(path) => self.entries.contains_key(&path),
            Err(_) => false,
        }
    }

    /// Returns true if `path` names a directory, explicit or implicit.
    ///
    /// The empty path is the root and always a directory.
    pub fn is_dir(&self, path: &str) -> bool {
        let Ok(path) = EntryPath::new(path) else {
            return crate::entry_path::normalize(path).is_empty();
        };
        self.directories.contains(&path) || self.has_children(&path)
    }

    /// Returns true if `path` names a file or a directory.
    pub fn exists(&self, path: &str) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    /// Reads the bytes of a regular file.
    pub fn read(&self, path: &str) -> Option<&[u8]> {
        let path = EntryPath::new(path).ok()?;
        self.entries.get(&path).map(Vec::as_slice)
    }

    /// Writes a regular file, replacing any existing one at `path`.
    ///
    /// Parent directories are created implicitly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for read-only archives and
    /// [`Error::EntryExists`] if `path` or one of its ancestors is occupied
    /// by an entry of the other kind.
    pub fn write(&mut self, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_writable("write")?;
        let path = EntryPath::new(path)?;
        if self.directories.contains(&path) || self.has_children(&path) {
            return Err(Error::EntryExists {
                path: path.as_str().to_string(),
            });
        }
        self.create_parents(&path)?;
        self.entries.insert(path, data.into());
        self.dirty = true;
        Ok(())
    }

    /// Moves a regular file to a new path.
    ///
    /// The move is atomic within this view: either both the removal and the
    /// insertion happen or neither does. Parent directories of the target are
    /// created implicitly; the source's directories stay behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if `from` is not a file and
    /// [`Error::EntryExists`] if `to` is already taken. An existing target is
    /// never overwritten.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.ensure_writable("rename")?;
        let from = EntryPath::new(from)?;
        let to = EntryPath::new(to)?;
        if !self.entries.contains_key(&from) {
            return Err(Error::EntryNotFound {
                path: from.as_str().to_string(),
            });
        }
        if from == to {
            return Ok(());
        }
        if self.entries.contains_key(&to) || self.directories.contains(&to) || self.has_children(&to)
        {
            return Err(Error::EntryExists {
                path: to.as_str().to_string(),
            });
        }

        self.create_parents(&to)?;
        if let Some(data) = self.entries.remove(&from) {
            self.entries.insert(to, data);
        }
        self.dirty = true;
        Ok(())
    }

    /// Deletes a regular file or an empty directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if nothing exists at `path`, and
    /// [`Error::Unsupported`] when `path` is a directory that still has children.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        self.ensure_writable("delete")?;
        let path = EntryPath::new(path)?;
        if self.entries.remove(&path).is_some() {
            self.dirty = true;
            return Ok(());
        }
        if self.has_children(&path) {
            return Err(Error::Unsupported {
                operation: "delete non-empty directory",
            });
        }
        if self.directories.remove(&path) {
            self.dirty = true;
            return Ok(());
        }
        Err(Error::EntryNotFound {
            path: path.as_str().to_string(),
        })
    }

    /// Deletes `path` and everything below it.
    ///
    /// Returns the number of regular files removed. Deleting a path that does
    /// not exist is not an error and removes nothing.
    pub fn delete_tree(&mut self, path: &str) -> Result<usize> {
        self.ensure_writable("delete tree")?;
        let root = crate::entry_path::normalize(path);

        let before = self.entries.len();
        self.entries.retain(|p, _| !p.is_within(&root));
        let removed = before - self.entries.len();

        let dirs_before = self.directories.len();
        self.directories.retain(|p| !p.is_within(&root));

        if removed > 0 || dirs_before != self.directories.len() {
            self.dirty = true;
        }
        Ok(removed)
    }

    /// Walks the regular files at or below `root`, depth-first.
    ///
    /// Directories are not yielded. The walk iterates over a snapshot of the
    /// paths taken when it starts, so the archive may be mutated while the
    /// walk is being consumed; entries moved or deleted in the meantime are
    /// still yielded and should be checked with [`is_file`](Self::is_file).
    pub fn walk(&self, root: &str) -> Walk {
        let root = crate::entry_path::normalize(root);
        let paths: Vec<EntryPath> = self
            .entries
            .keys()
            .filter(|p| p.is_within(&root))
            .cloned()
            .collect();
        Walk {
            inner: paths.into_iter(),
        }
    }

    /// Returns all regular-file paths in traversal order.
    pub fn files(&self) -> impl Iterator<Item = &EntryPath> {
        self.entries.keys()
    }

    /// Returns all explicitly recorded directories.
    pub fn directories(&self) -> impl Iterator<Item = &EntryPath> {
        self.directories.iter()
    }

    /// Removes every recorded directory that has no children, deepest first.
    ///
    /// Moves leave the directories of their source behind; this sweeps them.
    /// Returns the number of directories removed.
    pub fn remove_empty_directories(&mut self) -> Result<usize> {
        self.ensure_writable("remove empty directories")?;

        let mut candidates: Vec<EntryPath> = self.directories.iter().cloned().collect();
        candidates.sort_by(|a, b| {
            b.as_str()
                .len()
                .cmp(&a.as_str().len())
                .then_with(|| a.cmp(b))
        });

        let mut removed = 0;
        for dir in candidates {
            if self.has_children(&dir) {
                continue;
            }
            self.directories.remove(&dir);
            self.dirty = true;
            removed += 1;
            log::debug!("Removed empty directory: {}", dir);
        }
        Ok(removed)
    }

    /// Writes all mutations to the backing container and releases the archive.
    ///
    /// The container is replaced atomically: the new content goes to a
    /// temporary file next to it, which is then renamed over the original.
    /// Read-only and unchanged archives are released without writing.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        if !self.dirty || !self.mode.is_writable() {
            return Ok(());
        }
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        container::store(path, &self.entries, &self.directories)?;
        self.dirty = false;
        log::debug!("Wrote {} ({} entries)", path.display(), self.entries.len());
        Ok(())
    }

    /// Releases the archive, dropping all mutations that were not flushed.
    pub fn discard(mut self) {
        self.closed = true;
        if self.dirty {
            log::debug!("Discarded pending changes to {}", self.display_name());
        }
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(Error::Unsupported { operation })
        }
    }

    fn has_children(&self, dir: &EntryPath) -> bool {
        let prefix = format!("{}/", dir.as_str());
        let bounds = (Bound::Included(prefix.as_str()), Bound::Unbounded);
        let is_child = |p: &EntryPath| p.as_str().starts_with(&prefix);

        self.entries
            .range::<str, _>(bounds)
            .next()
            .is_some_and(|(p, _)| is_child(p))
            || self
                .directories
                .range::<str, _>(bounds)
                .next()
                .is_some_and(is_child)
    }

    fn create_parents(&mut self, path: &EntryPath) -> Result<()> {
        let ancestors: Vec<EntryPath> = path
            .ancestors()
            .map(EntryPath::new)
            .collect::<Result<_>>()?;
        for ancestor in ancestors {
            if self.entries.contains_key(&ancestor) {
                return Err(Error::EntryExists {
                    path: ancestor.as_str().to_string(),
                });
            }
            self.directories.insert(ancestor);
        }
        Ok(())
    }
}

impl Drop for VirtualArchive {
    fn drop(&mut self) {
        if !self.closed && self.dirty && self.mode.is_writable() && self.path.is_some() {
            log::warn!(
                "Archive {} released without close, pending changes were not written",
                self.display_name()
            );
        }
    }
}

/// Depth-first iterator over regular-file paths, see [`VirtualArchive::walk`].
#[derive(Debug)]
pub struct Walk {
    inner: std::vec::IntoIter<EntryPath>,
}

impl Iterator for Walk {
    type Item = EntryPath;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Walk {}
