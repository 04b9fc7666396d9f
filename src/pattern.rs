//! Glob compilation and the path and class-name filters built on it.
//!
//! # Glob Syntax
//!
//! | Token | Matches |
//! |-------|---------|
//! | `**/` (leading) | Nothing, or any path ending in a separator |
//! | `**` | Any sequence, separators included |
//! | `*` | Any sequence without separators |
//! | `?` | One non-separator character |
//! | `/`, `\` | Either separator |
//!
//! Every other character is literal. Matching is always against the whole
//! path, never a substring.

use regex::{Regex, RegexBuilder};

use crate::{Error, Result};

/// A compiled glob pattern.
///
/// # Example
///
/// ```
/// use jarwright::pattern::Glob;
///
/// let glob = Glob::new("META-INF/*.SF").unwrap();
/// assert!(glob.is_match("META-INF/X.SF"));
/// assert!(!glob.is_match("META-INF/sub/X.SF"));
///
/// // Empty patterns never match.
/// assert!(!Glob::new("  ").unwrap().is_match(""));
/// ```
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    /// `None` for an empty pattern
    regex: Option<Regex>,
}

impl Glob {
    /// Compiles a case-sensitive glob.
    pub fn new(pattern: &str) -> Result<Self> {
        Self::compile(pattern, false)
    }

    /// Compiles a glob that ignores case.
    pub fn new_case_insensitive(pattern: &str) -> Result<Self> {
        Self::compile(pattern, true)
    }

    fn compile(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Ok(Self {
                source: pattern.to_string(),
                regex: None,
            });
        }

        let regex = RegexBuilder::new(&glob_to_regex(trimmed))
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| Error::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            source: pattern.to_string(),
            regex: Some(regex),
        })
    }

    /// Returns the pattern as given.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if `path` matches the whole pattern.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(path))
    }
}

/// Translates a trimmed, non-empty glob into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() * 2 + 2);
    regex.push('^');

    let mut rest = glob;
    if let Some(stripped) = glob.strip_prefix("**/").or_else(|| glob.strip_prefix("**\\")) {
        regex.push_str(r"(?:.*[\\/])?");
        rest = stripped;
    }

    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                regex.push_str(".*");
            }
            '*' => regex.push_str(r"[^\\/]*"),
            '?' => regex.push_str(r"[^\\/]"),
            '/' | '\\' => regex.push_str(r"[\\/]"),
            c => {
                let mut buf = [0u8; 4];
                regex.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
    }

    regex.push('$');
    regex
}

/// Compiles a user regex that must match a whole string.
pub(crate) fn full_match_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Compiles a user regex used for search-and-replace.
pub(crate) fn search_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Allow/deny prefix lists deciding which entry paths a transformer touches.
///
/// * Both lists empty: every path is processed.
/// * A path starting with any deny prefix is skipped.
/// * Otherwise, if the allow list is non-empty, only paths starting with
///   one of its prefixes are processed.
///
/// Prefixes are plain string prefixes of the normalized entry path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixFilter {
    allow: Vec<String>,
    deny: Vec<String>,
}

impl PrefixFilter {
    /// Creates a filter that processes everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds prefixes to the allow list.
    pub fn allow<S: Into<String>>(mut self, prefixes: impl IntoIterator<Item = S>) -> Self {
        self.allow
            .extend(prefixes.into_iter().map(|p| normalize_prefix(&p.into())));
        self
    }

    /// Adds prefixes to the deny list.
    pub fn deny<S: Into<String>>(mut self, prefixes: impl IntoIterator<Item = S>) -> Self {
        self.deny
            .extend(prefixes.into_iter().map(|p| normalize_prefix(&p.into())));
        self
    }

    /// Returns true if no prefix was configured.
    pub fn is_empty(&self) -> bool {
        self.allow.is_empty() && self.deny.is_empty()
    }

    /// Returns true if `path` should be processed.
    pub fn should_process(&self, path: &str) -> bool {
        let path = path.trim_start_matches('/');
        if self.deny.iter().any(|p| path.starts_with(p.as_str())) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|p| path.starts_with(p.as_str()))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Selects classes by dotted name.
///
/// | Selector | Selects |
/// |----------|---------|
/// | `com.example.**` | Everything whose name starts with `com.example.` |
/// | `com.example.*` | Classes directly in package `com.example` |
/// | `com.example.Foo` | Exactly that class |
/// | `**` | Everything |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassSelector {
    /// Names starting with the prefix.
    Prefix(String),
    /// Names directly in the package (prefix ends with `.` or is empty).
    Package(String),
    /// One exact name.
    Exact(String),
}

impl ClassSelector {
    /// Parses a selector string.
    pub fn parse(selector: &str) -> Self {
        let selector = selector.trim();
        if let Some(prefix) = selector.strip_suffix("**") {
            ClassSelector::Prefix(prefix.to_string())
        } else if let Some(package) = selector.strip_suffix('*') {
            let mut package = package.to_string();
            if !package.is_empty() && !package.ends_with('.') {
                package.push('.');
            }
            ClassSelector::Package(package)
        } else {
            ClassSelector::Exact(selector.to_string())
        }
    }

    /// Returns true if the dotted class name is selected.
    pub fn matches(&self, class_name: &str) -> bool {
        match self {
            ClassSelector::Prefix(prefix) => class_name.starts_with(prefix.as_str()),
            ClassSelector::Package(package) => class_name
                .strip_prefix(package.as_str())
                .is_some_and(|rest| !rest.contains('.')),
            ClassSelector::Exact(name) => class_name == name,
        }
    }
}

impl Default for ClassSelector {
    fn default() -> Self {
        ClassSelector::Prefix(String::new())
    }
}
