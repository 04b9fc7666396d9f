//! Merging several jars into one.
//!
//! The primary archive is copied first, then each secondary archive in
//! order. A path provided twice is resolved by the [`DuplicatePolicy`],
//! except for two kinds of resources that are combined instead:
//!
//! * service-registration files are concatenated, separated by a newline;
//! * plugin caches are decoded and merged, first registration winning.
//!
//! # Example
//!
//! ```rust,no_run
//! use jarwright::merge::{DuplicatePolicy, MergeOptions, merge_archives};
//!
//! let options = MergeOptions::new()
//!     .duplicate_policy(DuplicatePolicy::Warn)
//!     .exclude("META-INF/*.SF")?
//!     .exclude("module-info.class")?;
//!
//! let result = merge_archives("build/app.jar", &["libs/a.jar", "libs/b.jar"], "build/app-all.jar", &options)?;
//! println!("{} entries, {} skipped", result.entries_written, result.entries_skipped);
//! # Ok::<(), jarwright::Error>(())
//! ```

use std::fmt;
use std::path::Path;

use crate::archive::{OpenMode, VirtualArchive};
use crate::entry_path::EntryPath;
use crate::pattern::Glob;
use crate::plugin_cache::PluginCache;
use crate::{Error, Result};

/// Excludes that drop signature files and module descriptors, which are
/// invalid once classes from several jars share one archive.
pub const DEFAULT_EXCLUDES: &[&str] = &["META-INF/*.SF", "META-INF/*.DSA", "META-INF/*.RSA", "module-info.class"];

/// What to do when a path is already present in the merged output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DuplicatePolicy {
    /// Replace the existing entry with the later one.
    Overwrite,
    /// Keep the earlier entry silently.
    Skip,
    /// Keep the earlier entry and log a warning.
    Warn,
    /// Abort the merge with [`Error::DuplicateConflict`].
    #[default]
    Fail,
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DuplicatePolicy::Overwrite => "overwrite",
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Warn => "warn",
            DuplicatePolicy::Fail => "fail",
        };
        f.write_str(name)
    }
}

/// Options for [`merge_archives`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    duplicate_policy: DuplicatePolicy,
    excludes: Vec<Glob>,
    merge_services: bool,
    merge_plugin_cache: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::default(),
            excludes: Vec::new(),
            merge_services: true,
            merge_plugin_cache: true,
        }
    }
}

impl MergeOptions {
    /// Creates options with the default policy and no excludes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the duplicate policy.
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Adds a glob of paths to leave out, matched without regard to case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the glob does not compile.
    pub fn exclude(mut self, glob: &str) -> Result<Self> {
        self.excludes.push(Glob::new_case_insensitive(glob)?);
        Ok(self)
    }

    /// Adds [`DEFAULT_EXCLUDES`].
    pub fn with_default_excludes(self) -> Result<Self> {
        DEFAULT_EXCLUDES.iter().try_fold(self, |options, glob| options.exclude(glob))
    }

    /// Concatenates service-registration files instead of applying the policy.
    pub fn merge_services(mut self, enabled: bool) -> Self {
        self.merge_services = enabled;
        self
    }

    /// Merges plugin caches instead of applying the policy.
    pub fn merge_plugin_cache(mut self, enabled: bool) -> Self {
        self.merge_plugin_cache = enabled;
        self
    }

    /// Returns the duplicate policy.
    pub fn policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|g| g.is_match(path))
    }
}

/// Counters describing a finished merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeResult {
    /// Entries written to the output for the first time.
    pub entries_written: usize,
    /// Duplicates that replaced an earlier entry.
    pub entries_overwritten: usize,
    /// Duplicates dropped under [`DuplicatePolicy::Skip`] or [`DuplicatePolicy::Warn`].
    pub entries_skipped: usize,
    /// Entries dropped by an exclude glob.
    pub entries_excluded: usize,
    /// Service files that were concatenated.
    pub services_merged: usize,
    /// Plugin caches that were merged.
    pub plugin_caches_merged: usize,
}

/// Merges `primary` and `secondaries`, in that order, into a fresh `output`.
///
/// The output is always created from scratch (parent directories included)
/// and is only written if the whole merge succeeds.
///
/// # Errors
///
/// Returns [`Error::ArchiveNotFound`] for a missing input,
/// [`Error::DuplicateConflict`] under [`DuplicatePolicy::Fail`], decoding
/// errors for corrupt plugin caches and any I/O or container error.
pub fn merge_archives<P: AsRef<Path>>(
    primary: impl AsRef<Path>,
    secondaries: &[P],
    output: impl AsRef<Path>,
    options: &MergeOptions,
) -> Result<MergeResult> {
    let output = output.as_ref();
    log::info!("Start merging jar files into {}", output.display());

    let mut merger = Merger {
        output: VirtualArchive::open(output, OpenMode::CreateNew)?,
        options,
        result: MergeResult::default(),
    };

    let inputs = std::iter::once(primary.as_ref()).chain(secondaries.iter().map(AsRef::as_ref));
    for input in inputs {
        if let Err(e) = merger.add(input) {
            merger.output.discard();
            return Err(e);
        }
    }

    let Merger { output: archive, result, .. } = merger;
    archive.close()?;
    log::info!("Successfully created merged jar: {}", output.display());
    Ok(result)
}

/// Merges already opened archives into `output`, which is not closed.
///
/// This is the in-memory core of [`merge_archives`]; `inputs` are processed
/// in order and identified by their [`display_name`](VirtualArchive::display_name).
pub fn merge_into(
    output: &mut VirtualArchive,
    inputs: &[&VirtualArchive],
    options: &MergeOptions,
) -> Result<MergeResult> {
    let mut result = MergeResult::default();
    for input in inputs {
        merge_one(output, input, options, &mut result)?;
    }
    Ok(result)
}

struct Merger<'a> {
    output: VirtualArchive,
    options: &'a MergeOptions,
    result: MergeResult,
}

impl Merger<'_> {
    fn add(&mut self, input: &Path) -> Result<()> {
        log::debug!("Processing: {}", input.display());
        let archive = VirtualArchive::open(input, OpenMode::ReadOnly)?;
        merge_one(&mut self.output, &archive, self.options, &mut self.result)
    }
}

fn merge_one(
    output: &mut VirtualArchive,
    input: &VirtualArchive,
    options: &MergeOptions,
    result: &mut MergeResult,
) -> Result<()> {
    let source = input.display_name();

    for path in input.files() {
        let Some(data) = input.read(path.as_str()) else {
            continue;
        };
        if options.is_excluded(path.as_str()) {
            log::debug!("Skipping excluded entry: {}", path);
            result.entries_excluded += 1;
            continue;
        }

        if options.merge_services && path.is_service_file() && output.is_file(path.as_str()) {
            merge_service(output, path, data)?;
            log::debug!("Merged service entry: {}", path);
            result.services_merged += 1;
            continue;
        }
        if options.merge_plugin_cache && path.is_plugin_cache() && output.is_file(path.as_str()) {
            merge_plugin_cache(output, path, data).map_err(|e| e.in_entry(path.as_str()))?;
            log::debug!("Merged plugin cache entry: {}", path);
            result.plugin_caches_merged += 1;
            continue;
        }

        if !output.is_file(path.as_str()) {
            output.write(path.as_str(), data)?;
            result.entries_written += 1;
            continue;
        }

        match options.duplicate_policy {
            DuplicatePolicy::Overwrite => {
                log::debug!("Duplicate entry found in {}: {}. Overwriting with new content.", source, path);
                output.write(path.as_str(), data)?;
                result.entries_overwritten += 1;
            }
            DuplicatePolicy::Skip => {
                log::debug!("Duplicate entry found in {}: {}. Skipping this entry.", source, path);
                result.entries_skipped += 1;
            }
            DuplicatePolicy::Warn => {
                log::warn!("Duplicate entry found in {}: {}. Skipping this entry.", source, path);
                result.entries_skipped += 1;
            }
            DuplicatePolicy::Fail => {
                return Err(Error::DuplicateConflict {
                    archive: source,
                    path: path.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn merge_service(output: &mut VirtualArchive, path: &EntryPath, data: &[u8]) -> Result<()> {
    let existing = output.read(path.as_str()).unwrap_or_default();
    let mut merged = Vec::with_capacity(existing.len() + 1 + data.len());
    merged.extend_from_slice(existing);
    merged.push(b'\n');
    merged.extend_from_slice(data);
    output.write(path.as_str(), merged)
}

fn merge_plugin_cache(output: &mut VirtualArchive, path: &EntryPath, data: &[u8]) -> Result<()> {
    let existing = output.read(path.as_str()).unwrap_or_default();
    let mut cache = PluginCache::decode(existing)?;
    cache.merge(&PluginCache::decode(data)?);
    output.write(path.as_str(), cache.encode()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry_path::PLUGIN_CACHE_PATH;
    use crate::plugin_cache::PluginEntry;

    fn archive(name_entries: &[(&str, &str)]) -> VirtualArchive {
        let mut archive = VirtualArchive::in_memory();
        for (path, data) in name_entries {
            archive.write(path, *data).unwrap();
        }
        archive
    }

    fn merge(policy: DuplicatePolicy) -> Result<(VirtualArchive, MergeResult)> {
        let a = archive(&[("p", "first"), ("only-a", "a")]);
        let b = archive(&[("p", "second"), ("only-b", "b")]);
        let mut out = VirtualArchive::in_memory();
        let options = MergeOptions::new().duplicate_policy(policy);
        let result = merge_into(&mut out, &[&a, &b], &options)?;
        Ok((out, result))
    }

    #[test]
    fn test_policy_fail() {
        let err = merge(DuplicatePolicy::Fail).unwrap_err();
        assert!(matches!(err, Error::DuplicateConflict { ref path, .. } if path == "p"));
    }

    #[test]
    fn test_policy_overwrite_keeps_later() {
        let (out, result) = merge(DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(out.read("p").unwrap(), b"second");
        assert_eq!(result.entries_overwritten, 1);
        assert_eq!(result.entries_written, 3);
    }

    #[test]
    fn test_policy_skip_and_warn_keep_earlier() {
        for policy in [DuplicatePolicy::Skip, DuplicatePolicy::Warn] {
            let (out, result) = merge(policy).unwrap();
            assert_eq!(out.read("p").unwrap(), b"first", "{}", policy);
            assert_eq!(result.entries_skipped, 1);
            assert!(out.is_file("only-b"));
        }
    }

    #[test]
    fn test_services_concatenated_before_policy() {
        let a = archive(&[("META-INF/services/x.Api", "a.Impl1")]);
        let b = archive(&[("META-INF/services/x.Api", "#comment\nb.Impl2")]);
        let mut out = VirtualArchive::in_memory();
        let result = merge_into(&mut out, &[&a, &b], &MergeOptions::new()).unwrap();

        assert_eq!(out.read("META-INF/services/x.Api").unwrap(), b"a.Impl1\n#comment\nb.Impl2");
        assert_eq!(result.services_merged, 1);
    }

    #[test]
    fn test_services_use_policy_when_disabled() {
        let a = archive(&[("META-INF/services/x.Api", "a.Impl1")]);
        let b = archive(&[("META-INF/services/x.Api", "b.Impl2")]);
        let mut out = VirtualArchive::in_memory();
        let options = MergeOptions::new().merge_services(false);
        assert!(merge_into(&mut out, &[&a, &b], &options).is_err());
    }

    #[test]
    fn test_plugin_caches_merged_first_wins() {
        let mut first = PluginCache::new();
        first.insert("core", "console", PluginEntry::new("a.Console", "Console", true, false));
        let mut second = PluginCache::new();
        second.insert("core", "console", PluginEntry::new("b.Console", "Console", true, false));
        second.insert("core", "file", PluginEntry::new("b.File", "File", true, false));

        let mut a = VirtualArchive::in_memory();
        a.write(PLUGIN_CACHE_PATH, first.encode().unwrap()).unwrap();
        let mut b = VirtualArchive::in_memory();
        b.write(PLUGIN_CACHE_PATH, second.encode().unwrap()).unwrap();

        let mut out = VirtualArchive::in_memory();
        let result = merge_into(&mut out, &[&a, &b], &MergeOptions::new()).unwrap();

        let merged = PluginCache::decode(out.read(PLUGIN_CACHE_PATH).unwrap()).unwrap();
        assert_eq!(merged.get("core", "console").unwrap().class_name, "a.Console");
        assert_eq!(merged.get("core", "file").unwrap().class_name, "b.File");
        assert_eq!(result.plugin_caches_merged, 1);
    }

    #[test]
    fn test_corrupt_plugin_cache_names_entry() {
        let mut a = VirtualArchive::in_memory();
        a.write(PLUGIN_CACHE_PATH, PluginCache::new().encode().unwrap()).unwrap();
        let mut b = VirtualArchive::in_memory();
        b.write(PLUGIN_CACHE_PATH, vec![0, 0]).unwrap();

        let mut out = VirtualArchive::in_memory();
        let err = merge_into(&mut out, &[&a, &b], &MergeOptions::new()).unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(err.entry_path(), Some(PLUGIN_CACHE_PATH));
    }

    #[test]
    fn test_excludes_case_insensitive() {
        let a = archive(&[("META-INF/SIGNER.sf", "sig"), ("module-info.class", "m"), ("a.txt", "a")]);
        let mut out = VirtualArchive::in_memory();
        let options = MergeOptions::new().with_default_excludes().unwrap();
        let result = merge_into(&mut out, &[&a], &options).unwrap();

        assert_eq!(result.entries_excluded, 2);
        assert_eq!(out.len(), 1);
        assert!(out.is_file("a.txt"));
    }
}
