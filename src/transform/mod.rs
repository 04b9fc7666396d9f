//! The transformer pipeline.
//!
//! A [`Transformer`] is a named unit of work over one [`VirtualArchive`].
//! [`apply_all`] runs a chain in order and stops at the first failure;
//! [`transform_archive`] wraps that in the open/copy/flush lifecycle of a
//! jar on disk.
//!
//! # Failure contract
//!
//! Mutations made before a failing transformer are kept. With the default
//! [`TransformOptions`] they are also flushed to disk, so the archive may
//! end up half transformed. Set [`TransformOptions::atomic`] to leave the
//! container untouched unless the whole chain succeeds.
//!
//! # Example
//!
//! ```no_run
//! use jarwright::relocate::{RelocationOptions, RelocationRules, Relocator};
//! use jarwright::transform::{self, AccessPatcher, TransformOptions, Transformer};
//!
//! let rules = RelocationRules::new().rule("com.google", "shaded.com.google")?;
//! let mut chain: Vec<Box<dyn Transformer>> = vec![
//!     Box::new(Relocator::new("shade", RelocationOptions::new(rules))),
//!     Box::new(AccessPatcher::new("widen").accessible(["shaded/com/google/gson/Gson"])?),
//! ];
//!
//! let options = TransformOptions::new().output("build/app-shaded.jar").atomic(true);
//! transform::transform_archive("build/app.jar", &options, &mut chain)?;
//! # Ok::<(), jarwright::Error>(())
//! ```

mod access;
mod exclude;
mod rewrite;
mod strings;

use std::fs;
use std::path::{Path, PathBuf};

pub use access::{AccessMutation, AccessPatcher, AccessTarget};
pub use exclude::Excluder;
pub use rewrite::{BytecodeRewriter, ClassRewrite, ProcessRewriter};
pub use strings::StringReplacer;

use crate::archive::{OpenMode, VirtualArchive};
use crate::{Error, Result};

/// A named archive transformation.
///
/// Implementations visit the entries they care about through
/// [`VirtualArchive::walk`] and mutate them in place.
pub trait Transformer {
    /// Name used in logs and in [`Error::TransformerFailed`].
    fn name(&self) -> &str;

    /// Applies the transformation.
    fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()>;
}

impl<T: Transformer + ?Sized> Transformer for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()> {
        (**self).transform(archive)
    }
}

/// Runs transformers in order, stopping at the first failure.
///
/// The failure is logged with the transformer's name and returned wrapped
/// in [`Error::TransformerFailed`]. Transformers after it do not run, and
/// what earlier ones did is not undone.
pub fn apply_all<T: Transformer>(archive: &mut VirtualArchive, transformers: &mut [T]) -> Result<()> {
    for transformer in transformers.iter_mut() {
        log::debug!("Applying transformer '{}' to {}", transformer.name(), archive.display_name());
        if let Err(e) = transformer.transform(archive) {
            log::error!("Failed to apply transformer '{}': {}", transformer.name(), e);
            return Err(Error::TransformerFailed {
                name: transformer.name().to_string(),
                source: Box::new(e),
            });
        }
    }
    Ok(())
}

/// Where and how [`transform_archive`] writes its result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    output: Option<PathBuf>,
    atomic: bool,
}

impl TransformOptions {
    /// Creates options that transform the input in place without atomicity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes to `path` instead of the input. The input is copied there first.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Only writes the result if every transformer succeeds.
    pub fn atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Returns the output path, if one is set.
    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Returns true if failed chains are discarded.
    pub fn is_atomic(&self) -> bool {
        self.atomic
    }
}

/// Runs a transformer chain over a jar on disk.
///
/// With an output path different from `input`, the input is copied there
/// (creating parent directories) and the copy is transformed. Without one,
/// or when both name the same file, the input is transformed in place.
///
/// Returns the path of the transformed jar.
///
/// # Errors
///
/// Returns [`Error::ArchiveNotFound`] if `input` does not exist, any I/O or
/// container error, and the first transformer failure.
pub fn transform_archive<T: Transformer>(
    input: impl AsRef<Path>,
    options: &TransformOptions,
    transformers: &mut [T],
) -> Result<PathBuf> {
    let input = input.as_ref();
    if !input.is_file() {
        return Err(Error::ArchiveNotFound {
            path: input.to_path_buf(),
        });
    }

    let target = match options.output_path() {
        Some(output) if !same_file(input, output) => {
            if output.exists() {
                log::warn!("Output file already exists and will be overwritten: {}", output.display());
            }
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::copy(input, output)?;
            output.to_path_buf()
        }
        _ => {
            log::warn!("Transforming {} in place", input.display());
            input.to_path_buf()
        }
    };

    run_chain(&target, options.atomic, transformers)?;
    Ok(target)
}

/// Transforms a dependency jar into `out_dir` as `<name>-repackaged.jar`.
///
/// The input is never modified. Returns the path of the new jar.
pub fn transform_dependency<T: Transformer>(
    input: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    transformers: &mut [T],
) -> Result<PathBuf> {
    let input = input.as_ref();
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::ArchiveNotFound {
            path: input.to_path_buf(),
        })?;
    let output_name = match file_name.strip_suffix(".jar") {
        Some(stem) => format!("{}-repackaged.jar", stem),
        None => format!("{}-repackaged", file_name),
    };

    let options = TransformOptions::new().output(out_dir.as_ref().join(output_name));
    transform_archive(input, &options, transformers)
}

fn run_chain<T: Transformer>(path: &Path, atomic: bool, transformers: &mut [T]) -> Result<()> {
    let mut archive = VirtualArchive::open(path, OpenMode::ReadWrite)?;
    match apply_all(&mut archive, transformers) {
        Ok(()) => archive.close(),
        Err(e) if atomic => {
            archive.discard();
            Err(e)
        }
        Err(e) => {
            if let Err(flush) = archive.close() {
                log::error!("Failed to write partially transformed {}: {}", path.display(), flush);
            }
            Err(e)
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: &'static str,
        fail: bool,
    }

    impl Transformer for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()> {
            if self.fail {
                return Err(Error::EntryNotFound { path: "missing".into() });
            }
            archive.write(&format!("ran/{}", self.name), self.name)
        }
    }

    fn recorder(name: &'static str, fail: bool) -> Recorder {
        Recorder { name, fail }
    }

    #[test]
    fn test_apply_all_runs_in_order() {
        let mut archive = VirtualArchive::in_memory();
        let mut chain = [recorder("a", false), recorder("b", false)];
        apply_all(&mut archive, &mut chain).unwrap();
        assert!(archive.is_file("ran/a"));
        assert!(archive.is_file("ran/b"));
    }

    #[test]
    fn test_apply_all_stops_at_first_failure() {
        let mut archive = VirtualArchive::in_memory();
        let mut chain = [recorder("a", false), recorder("broken", true), recorder("c", false)];
        let err = apply_all(&mut archive, &mut chain).unwrap_err();

        match &err {
            Error::TransformerFailed { name, .. } => assert_eq!(name, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_not_found());
        // no rollback, no further transformers
        assert!(archive.is_file("ran/a"));
        assert!(!archive.exists("ran/c"));
    }

    #[test]
    fn test_boxed_chain() {
        let mut archive = VirtualArchive::in_memory();
        let mut chain: Vec<Box<dyn Transformer>> = vec![Box::new(recorder("boxed", false))];
        apply_all(&mut archive, &mut chain).unwrap();
        assert!(archive.is_file("ran/boxed"));
    }

    #[test]
    fn test_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut chain: [Recorder; 0] = [];
        let err = transform_archive(dir.path().join("nope.jar"), &TransformOptions::new(), &mut chain)
            .unwrap_err();
        assert!(matches!(err, Error::ArchiveNotFound { .. }));
    }
}
