//! Deleting entries by path prefix or regex.

use regex::Regex;

use super::Transformer;
use crate::archive::VirtualArchive;
use crate::entry_path::EntryPath;
use crate::pattern::full_match_regex;
use crate::Result;

/// Removes entries from an archive.
///
/// Paths are compared lower-cased: prefixes are lower-cased when added and
/// regexes must match the whole lower-cased path. A matching directory is
/// removed with everything below it.
///
/// In reversed mode the selection flips: every regular file that matches is
/// kept and every other file is removed.
///
/// ```
/// use jarwright::VirtualArchive;
/// use jarwright::transform::{Excluder, Transformer};
///
/// let mut archive = VirtualArchive::in_memory();
/// archive.write("META-INF/SIGNER.SF", "x")?;
/// archive.write("com/example/Main.class", "x")?;
///
/// Excluder::new("unsign").regex(r"meta-inf/.*\.sf")?.transform(&mut archive)?;
/// assert!(!archive.exists("META-INF/SIGNER.SF"));
/// assert!(archive.exists("com/example/Main.class"));
/// # Ok::<(), jarwright::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Excluder {
    name: String,
    prefixes: Vec<String>,
    patterns: Vec<Regex>,
    reversed: bool,
}

impl Excluder {
    /// Creates an excluder that removes nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefixes: Vec::new(),
            patterns: Vec::new(),
            reversed: false,
        }
    }

    /// Adds path prefixes to exclude.
    pub fn prefixes<S: AsRef<str>>(mut self, prefixes: impl IntoIterator<Item = S>) -> Self {
        self.prefixes.extend(
            prefixes
                .into_iter()
                .map(|p| crate::entry_path::normalize(p.as_ref()).to_lowercase()),
        );
        self
    }

    /// Adds a regex that must match the whole lower-cased path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`](crate::Error::InvalidPattern) if the
    /// regex does not compile.
    pub fn regex(mut self, pattern: &str) -> Result<Self> {
        self.patterns.push(full_match_regex(pattern)?);
        Ok(self)
    }

    /// Keeps only matching files instead of removing them.
    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    /// Returns true if `path` is selected by a prefix or regex.
    pub fn matches(&self, path: &str) -> bool {
        let lower = crate::entry_path::normalize(path).to_lowercase();
        self.prefixes.iter().any(|p| lower.starts_with(p.as_str()))
            || self.patterns.iter().any(|r| r.is_match(&lower))
    }
}

impl Transformer for Excluder {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()> {
        if self.reversed {
            let doomed: Vec<EntryPath> = archive.walk("").filter(|p| !self.matches(p.as_str())).collect();
            for path in doomed {
                archive.delete(path.as_str())?;
                log::debug!("Removed file: {}", path);
            }
            return Ok(());
        }
        if self.prefixes.is_empty() && self.patterns.is_empty() {
            return Ok(());
        }

        // directories first so whole trees go in one step
        let dirs: Vec<EntryPath> = archive
            .directories()
            .filter(|d| self.matches(d.as_str()))
            .cloned()
            .collect();
        for dir in dirs {
            if archive.exists(dir.as_str()) {
                let removed = archive.delete_tree(dir.as_str())?;
                log::debug!("Removed directory: {} ({} files)", dir, removed);
            }
        }

        let files: Vec<EntryPath> = archive.walk("").filter(|p| self.matches(p.as_str())).collect();
        for path in files {
            archive.delete(path.as_str())?;
            log::debug!("Removed file: {}", path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VirtualArchive {
        let mut archive = VirtualArchive::in_memory();
        for path in [
            "META-INF/MANIFEST.MF",
            "META-INF/SIGNER.SF",
            "META-INF/maven/pom.xml",
            "com/example/Main.class",
            "com/example/internal/Util.class",
        ] {
            archive.write(path, "x").unwrap();
        }
        archive
    }

    #[test]
    fn test_prefix_is_case_insensitive_and_removes_trees() {
        let mut archive = sample();
        Excluder::new("e")
            .prefixes(["meta-inf/MAVEN", "/com/example/internal"])
            .transform(&mut archive)
            .unwrap();

        assert!(!archive.exists("META-INF/maven"));
        assert!(!archive.exists("com/example/internal"));
        assert!(archive.is_file("META-INF/MANIFEST.MF"));
        assert!(archive.is_file("com/example/Main.class"));
    }

    #[test]
    fn test_regex_matches_whole_lowercase_path() {
        let mut archive = sample();
        Excluder::new("e")
            .regex(r"meta-inf/[^/]+\.sf")
            .unwrap()
            .regex("main")
            .unwrap()
            .transform(&mut archive)
            .unwrap();

        assert!(!archive.exists("META-INF/SIGNER.SF"));
        // "main" alone is not a whole-path match
        assert!(archive.is_file("com/example/Main.class"));
    }

    #[test]
    fn test_reversed_keeps_only_matches() {
        let mut archive = sample();
        Excluder::new("e")
            .prefixes(["com/"])
            .reversed(true)
            .transform(&mut archive)
            .unwrap();

        let files: Vec<String> = archive.files().map(|p| p.to_string()).collect();
        assert_eq!(files, vec!["com/example/Main.class", "com/example/internal/Util.class"]);
    }

    #[test]
    fn test_empty_excluder_is_noop() {
        let mut archive = sample();
        Excluder::new("e").transform(&mut archive).unwrap();
        assert_eq!(archive.len(), 5);
    }
}
