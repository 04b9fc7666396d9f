//! Literal and regex replacement in string constants and text entries.

use regex::Regex;

use super::Transformer;
use crate::archive::VirtualArchive;
use crate::classfile::{ClassRecord, NameRole};
use crate::entry_path::{EntryPath, ends_with_ignore_case};
use crate::pattern::search_regex;
use crate::{Error, Result};

/// Replaces strings in class constants and text files.
///
/// Entries are selected by file-name extension, compared without regard to
/// case; `.class` entries have their string constants rewritten, any other
/// selected entry is treated as UTF-8 text. Literal replacements run before
/// regex replacements, each in the order added. Regex replacements accept
/// `$1`/`${name}` group references.
///
/// ```
/// use jarwright::transform::StringReplacer;
///
/// let replacer = StringReplacer::new("version")
///     .replace("@VERSION@", "1.2.0")?
///     .replace_regex(r"build-(\d+)", "b$1")?;
/// assert_eq!(replacer.apply("@VERSION@ build-42"), "1.2.0 b42");
/// # Ok::<(), jarwright::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct StringReplacer {
    name: String,
    extensions: Vec<String>,
    literals: Vec<(String, String)>,
    patterns: Vec<(Regex, String)>,
}

impl StringReplacer {
    /// Creates a replacer for `.class` entries with no replacements.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extensions: vec![".class".to_string()],
            literals: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Sets the file-name extensions to process, replacing the default.
    pub fn extensions<S: Into<String>>(mut self, extensions: impl IntoIterator<Item = S>) -> Self {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a literal replacement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `from` is empty.
    pub fn replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Result<Self> {
        let from = from.into();
        if from.is_empty() {
            return Err(Error::InvalidPattern {
                pattern: from,
                reason: "replacement source must not be empty".into(),
            });
        }
        self.literals.push((from, to.into()));
        Ok(self)
    }

    /// Adds a regex replacement applied to every match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the regex does not compile.
    pub fn replace_regex(mut self, pattern: &str, to: impl Into<String>) -> Result<Self> {
        self.patterns.push((search_regex(pattern)?, to.into()));
        Ok(self)
    }

    /// Applies every replacement to `input`.
    pub fn apply(&self, input: &str) -> String {
        let mut out = input.to_string();
        for (from, to) in &self.literals {
            if out.contains(from.as_str()) {
                out = out.replace(from.as_str(), to);
            }
        }
        for (regex, to) in &self.patterns {
            out = regex.replace_all(&out, to.as_str()).into_owned();
        }
        out
    }

    fn selected_extension(&self, path: &EntryPath) -> Option<&str> {
        self.extensions
            .iter()
            .find(|ext| ends_with_ignore_case(path.file_name(), ext))
            .map(String::as_str)
    }

    fn replace_in_class(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut class = ClassRecord::decode(bytes)?;
        let changed = class.remap_names(|role, value| {
            (role == NameRole::StringLiteral).then(|| self.apply(value))
        })?;
        if changed { class.encode().map(Some) } else { Ok(None) }
    }

    fn replace_in_text(&self, path: &EntryPath, bytes: &[u8]) -> Option<Vec<u8>> {
        let Ok(text) = std::str::from_utf8(bytes) else {
            log::debug!("Skipping non-UTF-8 entry {}", path);
            return None;
        };
        let replaced = self.apply(text);
        (replaced != text).then(|| replaced.into_bytes())
    }
}

impl Transformer for StringReplacer {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()> {
        if self.literals.is_empty() && self.patterns.is_empty() {
            return Ok(());
        }

        for path in archive.walk("") {
            let Some(extension) = self.selected_extension(&path) else {
                continue;
            };
            let Some(bytes) = archive.read(path.as_str()) else {
                continue;
            };
            let replaced = if extension.eq_ignore_ascii_case(".class") {
                self.replace_in_class(bytes).map_err(|e| e.in_entry(path.as_str()))?
            } else {
                self.replace_in_text(&path, bytes)
            };

            if let Some(replaced) = replaced {
                archive.write(path.as_str(), replaced)?;
                log::debug!("Replaced strings in {}", path);
            }
        }
        Ok(())
    }
}
