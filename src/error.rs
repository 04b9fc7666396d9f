//! Error types for jar transformation operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when reading, merging, relocating or patching archives,
//! along with a convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. None of
//! them retry internally: the first failure aborts the enclosing merge or
//! transformer chain.
//!
//! ```rust,no_run
//! use jarwright::{Error, MergeOptions, merge_archives};
//!
//! fn merge(out: &str) -> jarwright::Result<()> {
//!     match merge_archives("app.jar", &["lib.jar"], out, &MergeOptions::default()) {
//!         Ok(result) => {
//!             println!("wrote {} entries", result.entries_written);
//!             Ok(())
//!         }
//!         Err(Error::DuplicateConflict { archive, path }) => {
//!             eprintln!("{} provides {} a second time", archive, path);
//!             Err(Error::DuplicateConflict { archive, path })
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use std::io;
use std::path::PathBuf;

/// The main error type for jar transformation operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io], [`Zip`][Self::Zip] | File system or container failures |
/// | Missing input | [`ArchiveNotFound`][Self::ArchiveNotFound], [`EntryNotFound`][Self::EntryNotFound] | Wrong paths |
/// | Configuration | [`InvalidPattern`][Self::InvalidPattern], [`InvalidTarget`][Self::InvalidTarget], [`MemberNotFound`][Self::MemberNotFound] | Typos in transformer setup |
/// | Decoding | [`CorruptClass`][Self::CorruptClass], [`CorruptPluginCache`][Self::CorruptPluginCache], [`CorruptManifest`][Self::CorruptManifest] | Malformed archive content |
/// | Merge | [`DuplicateConflict`][Self::DuplicateConflict] | Two archives provide one path |
/// | Mode | [`Unsupported`][Self::Unsupported] | Writing through a read-only handle |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The zip container could not be read or written.
    #[error("Archive container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An input archive does not exist.
    #[error("Archive not found: {}", path.display())]
    ArchiveNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// An entry was not found in the archive.
    #[error("Entry not found: {path}")]
    EntryNotFound {
        /// The path that was not found.
        path: String,
    },

    /// An entry already exists at the target of a rename.
    #[error("Entry already exists: {path}")]
    EntryExists {
        /// The path that already exists.
        path: String,
    },

    /// An entry path is invalid (empty or containing NUL bytes).
    #[error("Invalid entry path: {0}")]
    InvalidEntryPath(String),

    /// A glob, regex or relocation prefix could not be compiled.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An access-patch descriptor matches none of the target grammars.
    #[error("Invalid target: {target}")]
    InvalidTarget {
        /// The descriptor string as given.
        target: String,
    },

    /// An access-patch target names a field or method the class lacks.
    #[error("Member '{member}' not found in class '{owner}'")]
    MemberNotFound {
        /// Member name and descriptor, e.g. `bar:I` or `run()V`.
        member: String,
        /// Internal name of the owning class.
        owner: String,
    },

    /// A class file is truncated or structurally invalid.
    #[error("Corrupt class file at offset {offset:#x}: {reason}")]
    CorruptClass {
        /// The byte offset where decoding failed.
        offset: usize,
        /// A description of the corruption.
        reason: String,
    },

    /// A plugin-cache resource is truncated or structurally invalid.
    #[error("Corrupt plugin cache at offset {offset:#x}: {reason}")]
    CorruptPluginCache {
        /// The byte offset where decoding failed.
        offset: usize,
        /// A description of the corruption.
        reason: String,
    },

    /// A manifest resource could not be parsed.
    #[error("Corrupt manifest at line {line}: {reason}")]
    CorruptManifest {
        /// 1-based line number.
        line: usize,
        /// A description of the problem.
        reason: String,
    },

    /// The constant pool grew past the 65535 entries a class file can hold.
    #[error("Constant pool overflow while encoding class '{class}'")]
    ConstantPoolOverflow {
        /// Internal name of the class being encoded.
        class: String,
    },

    /// Two merged archives provide the same path under [`DuplicatePolicy::Fail`].
    ///
    /// [`DuplicatePolicy::Fail`]: crate::merge::DuplicatePolicy::Fail
    #[error("Duplicate entry found in {archive}: {path}")]
    DuplicateConflict {
        /// The archive that provided the path a second time.
        archive: String,
        /// The colliding entry path.
        path: String,
    },

    /// The operation is not valid for the archive's open mode.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        /// The rejected operation.
        operation: &'static str,
    },

    /// A named transformer in a chain failed.
    #[error("Failed to apply transformer '{name}': {source}")]
    TransformerFailed {
        /// The transformer name.
        name: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Processing a specific archive entry failed.
    #[error("Failed to process entry '{path}': {source}")]
    EntryFailed {
        /// The entry path.
        path: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps this error with the entry path it occurred on.
    pub(crate) fn in_entry(self, path: &str) -> Self {
        match self {
            // keep the innermost path, it is the most specific
            e @ Error::EntryFailed { .. } => e,
            e => Error::EntryFailed {
                path: path.to_string(),
                source: Box::new(e),
            },
        }
    }

    /// Returns the innermost error, looking through context wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::TransformerFailed { source, .. } | Error::EntryFailed { source, .. } => {
                source.root_cause()
            }
            e => e,
        }
    }

    /// Returns `true` if this is a decoding error for archive content.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::CorruptClass { .. }
                | Error::CorruptPluginCache { .. }
                | Error::CorruptManifest { .. }
        )
    }

    /// Returns `true` if a required archive or entry is missing.
    pub fn is_not_found(&self) -> bool {
        match self.root_cause() {
            Error::ArchiveNotFound { .. } | Error::EntryNotFound { .. } => true,
            Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns `true` if the error stems from transformer or merge configuration.
    ///
    /// These errors are fixed by editing the configuration, not the inputs.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::InvalidPattern { .. }
                | Error::InvalidTarget { .. }
                | Error::MemberNotFound { .. }
                | Error::DuplicateConflict { .. }
        )
    }

    /// Returns the archive entry path associated with this error, if any.
    pub fn entry_path(&self) -> Option<&str> {
        match self {
            Error::EntryFailed { path, .. } => Some(path),
            Error::TransformerFailed { source, .. } => source.entry_path(),
            Error::EntryNotFound { path }
            | Error::EntryExists { path }
            | Error::DuplicateConflict { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// A specialized Result type for jar transformation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_member_not_found_message() {
        let err = Error::MemberNotFound {
            member: "bar:I".into(),
            owner: "com/Foo".into(),
        };
        assert_eq!(err.to_string(), "Member 'bar:I' not found in class 'com/Foo'");
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_corrupt_class_offset() {
        let err = Error::CorruptClass {
            offset: 0x1a,
            reason: "unexpected end of data".into(),
        };
        assert!(err.to_string().contains("0x1a"));
        assert!(err.is_corruption());
    }

    #[test]
    fn test_duplicate_conflict_message() {
        let err = Error::DuplicateConflict {
            archive: "lib.jar".into(),
            path: "p".into(),
        };
        assert_eq!(err.to_string(), "Duplicate entry found in lib.jar: p");
        assert_eq!(err.entry_path(), Some("p"));
    }

    #[test]
    fn test_transformer_wrapper_exposes_root_cause() {
        let inner = Error::CorruptPluginCache {
            offset: 4,
            reason: "truncated".into(),
        }
        .in_entry("META-INF/x.dat");
        let err = Error::TransformerFailed {
            name: "relocate0".into(),
            source: Box::new(inner),
        };
        assert!(err.to_string().contains("relocate0"));
        assert!(err.is_corruption());
        assert_eq!(err.entry_path(), Some("META-INF/x.dat"));
    }

    #[test]
    fn test_in_entry_keeps_innermost_path() {
        let err = Error::Unsupported { operation: "write" }
            .in_entry("a/b")
            .in_entry("outer");
        assert_eq!(err.entry_path(), Some("a/b"));
    }
}
