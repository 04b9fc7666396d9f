//! Normalized archive entry paths and the reserved jar namespaces.

use crate::{Error, Result};
use std::borrow::Borrow;
use std::fmt;

/// Maximum length for entry paths (in bytes).
///
/// The zip format stores name lengths in 16 bits.
const MAX_PATH_LENGTH: usize = u16::MAX as usize;

/// Root of the reserved manifest namespace.
pub const META_INF: &str = "META-INF/";

/// Directory holding provider-interface registration files.
pub const SERVICES_DIR: &str = "META-INF/services/";

/// Directory holding versioned (multi-release) entries.
pub const VERSIONS_DIR: &str = "META-INF/versions/";

/// The manifest-attributes resource.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// The binary plugin-cache resource.
pub const PLUGIN_CACHE_PATH: &str =
    "META-INF/org/apache/logging/log4j/core/config/plugins/Log4j2Plugins.dat";

/// A normalized entry path.
///
/// `EntryPath` stores paths with forward slashes and without a leading
/// slash, so `/com/Foo.class`, `com/Foo.class` and `com\Foo.class` all
/// name the same entry. A trailing slash is dropped; whether a path is a
/// directory is tracked by the archive, not by the path.
///
/// # Examples
///
/// ```
/// use jarwright::EntryPath;
///
/// let path = EntryPath::new("/com/example/Foo.class").unwrap();
/// assert_eq!(path.as_str(), "com/example/Foo.class");
/// assert_eq!(path.parent().unwrap().as_str(), "com/example");
///
/// assert!(EntryPath::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryPath(String);

impl EntryPath {
    /// Creates a new `EntryPath` from a string, normalizing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the path:
    /// - Contains NUL bytes
    /// - Is empty after stripping slashes
    /// - Exceeds the zip name length limit
    pub fn new(s: &str) -> Result<Self> {
        if s.contains('\0') {
            return Err(Error::InvalidEntryPath("contains NUL byte".into()));
        }

        let normalized = normalize(s);
        if normalized.is_empty() {
            return Err(Error::InvalidEntryPath("empty path".into()));
        }
        if normalized.len() > MAX_PATH_LENGTH {
            return Err(Error::InvalidEntryPath(format!(
                "path exceeds maximum length of {} bytes",
                MAX_PATH_LENGTH
            )));
        }

        Ok(Self(normalized))
    }

    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the parent directory of this path, if any.
    pub fn parent(&self) -> Option<Self> {
        self.0.rfind('/').map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Returns all ancestor directories, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.0
            .char_indices()
            .rev()
            .filter(|&(_, c)| c == '/')
            .map(|(idx, _)| &self.0[..idx])
    }

    /// Returns the file name (last segment) of this path.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns true if this path is equal to or nested below `dir`.
    ///
    /// This performs a component-wise comparison, not a string prefix match.
    /// An empty `dir` is the archive root and contains everything.
    pub fn is_within(&self, dir: &str) -> bool {
        let dir = dir.trim_matches('/');
        if dir.is_empty() {
            return true;
        }
        self.0 == dir
            || (self.0.len() > dir.len()
                && self.0.starts_with(dir)
                && self.0.as_bytes()[dir.len()] == b'/')
    }

    /// Returns true if the path starts with `prefix`, ignoring ASCII case.
    pub fn starts_with_ignore_case(&self, prefix: &str) -> bool {
        starts_with_ignore_case(&self.0, prefix)
    }

    /// Returns true if this entry is a compiled class unit.
    pub fn is_class_file(&self) -> bool {
        ends_with_ignore_case(self.file_name(), ".class")
    }

    /// Returns true if this entry lives in the reserved manifest namespace.
    pub fn is_meta_inf(&self) -> bool {
        self.starts_with_ignore_case(META_INF)
    }

    /// Returns true if this entry is a service-registration file.
    pub fn is_service_file(&self) -> bool {
        self.starts_with_ignore_case(SERVICES_DIR) && self.0.len() > SERVICES_DIR.len()
    }

    /// Returns true if this entry is the manifest-attributes resource.
    pub fn is_manifest(&self) -> bool {
        self.is_meta_inf() && self.file_name().eq_ignore_ascii_case("MANIFEST.MF")
    }

    /// Returns true if this entry is the binary plugin-cache resource.
    pub fn is_plugin_cache(&self) -> bool {
        self.0.eq_ignore_ascii_case(PLUGIN_CACHE_PATH)
    }

    /// Splits a versioned entry into its `META-INF/versions/<n>/` prefix and the rest.
    ///
    /// Returns `None` for entries outside the versions directory or entries
    /// sitting directly in it.
    ///
    /// ```
    /// use jarwright::EntryPath;
    ///
    /// let path = EntryPath::new("META-INF/versions/9/com/Foo.class").unwrap();
    /// assert_eq!(path.split_versioned(), Some(("META-INF/versions/9/", "com/Foo.class")));
    /// ```
    pub fn split_versioned(&self) -> Option<(&str, &str)> {
        if !self.starts_with_ignore_case(VERSIONS_DIR) {
            return None;
        }
        let slash = self.0[VERSIONS_DIR.len()..].find('/')? + VERSIONS_DIR.len();
        let (prefix, rest) = self.0.split_at(slash + 1);
        if rest.is_empty() {
            None
        } else {
            Some((prefix, rest))
        }
    }
}

/// Normalizes separators and strips leading and trailing slashes.
pub(crate) fn normalize(s: &str) -> String {
    let replaced = s.replace('\\', "/");
    replaced.trim_matches('/').to_string()
}

pub(crate) fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

pub(crate) fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.is_char_boundary(s.len() - suffix.len())
        && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

impl AsRef<str> for EntryPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Ordering and equality are those of the inner string, so maps keyed by
// `EntryPath` can be probed and ranged with `&str`.
impl Borrow<str> for EntryPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for EntryPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_slash_is_stripped() {
        let a = EntryPath::new("/com/Foo.class").unwrap();
        let b = EntryPath::new("com/Foo.class").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_backslashes_are_normalized() {
        let path = EntryPath::new("com\\example\\Foo.class").unwrap();
        assert_eq!(path.as_str(), "com/example/Foo.class");
    }

    #[test]
    fn test_trailing_slash_is_dropped() {
        let path = EntryPath::new("META-INF/").unwrap();
        assert_eq!(path.as_str(), "META-INF");
    }

    #[test]
    fn test_invalid_empty() {
        assert!(matches!(
            EntryPath::new("/").unwrap_err(),
            Error::InvalidEntryPath(_)
        ));
    }

    #[test]
    fn test_invalid_nul_byte() {
        let err = EntryPath::new("file\0.txt").unwrap_err();
        assert!(err.to_string().contains("NUL"));
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let path = EntryPath::new("a/b/c.txt").unwrap();
        let ancestors: Vec<_> = path.ancestors().collect();
        assert_eq!(ancestors, vec!["a/b", "a"]);
    }

    #[test]
    fn test_is_within_is_component_wise() {
        let path = EntryPath::new("dir/subdir/file.txt").unwrap();
        assert!(path.is_within("dir"));
        assert!(path.is_within("dir/subdir/"));
        assert!(path.is_within(""));
        assert!(!path.is_within("di"));
    }

    #[test]
    fn test_reserved_namespace_checks_ignore_case() {
        assert!(EntryPath::new("meta-inf/services/a.B").unwrap().is_service_file());
        assert!(!EntryPath::new("META-INF/services").unwrap().is_service_file());
        assert!(EntryPath::new("META-INF/manifest.mf").unwrap().is_manifest());
        assert!(
            EntryPath::new("META-INF/org/apache/logging/log4j/core/config/plugins/log4j2plugins.dat")
                .unwrap()
                .is_plugin_cache()
        );
        assert!(EntryPath::new("a/B.CLASS").unwrap().is_class_file());
    }

    #[test]
    fn test_split_versioned() {
        let path = EntryPath::new("META-INF/versions/11/a/b/C.class").unwrap();
        assert_eq!(
            path.split_versioned(),
            Some(("META-INF/versions/11/", "a/b/C.class"))
        );
        assert_eq!(EntryPath::new("META-INF/versions/11").unwrap().split_versioned(), None);
        assert_eq!(EntryPath::new("a/b/C.class").unwrap().split_versioned(), None);
    }
}
