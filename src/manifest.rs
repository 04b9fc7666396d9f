//! The manifest-attributes resource (`META-INF/MANIFEST.MF`).
//!
//! A manifest is a main section followed by zero or more named sections,
//! each a list of `Name: value` headers ending in a blank line. Lines are at
//! most 72 bytes; longer values continue on lines starting with one space.
//! Header names compare case-insensitively. Header order is preserved.

use indexmap::IndexMap;

use crate::{Error, Result};

/// Longest line, in bytes, excluding the line break.
const MAX_LINE: usize = 72;

/// An ordered header list of one manifest section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    headers: IndexMap<String, String>,
}

impl Attributes {
    /// Returns the value of a header, matching its name without regard to case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing one with the same name (in any case).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some((_, v)) => *v = value,
            None => {
                self.headers.insert(name, value);
            }
        }
    }

    /// Iterates over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterates over values mutably.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.headers.values_mut()
    }

    /// Returns the number of headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if the section has no headers.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// A parsed manifest.
///
/// ```
/// use jarwright::manifest::Manifest;
///
/// let mut manifest = Manifest::parse(b"Manifest-Version: 1.0\r\nMain-Class: com.old.Main\r\n\r\n")?;
/// assert_eq!(manifest.main().get("main-class"), Some("com.old.Main"));
///
/// manifest.main_mut().insert("Main-Class", "com.new.Main");
/// let text = String::from_utf8(manifest.to_bytes()).unwrap();
/// assert!(text.contains("Main-Class: com.new.Main\r\n"));
/// # Ok::<(), jarwright::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    main: Attributes,
    sections: IndexMap<String, Attributes>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a manifest.
    ///
    /// Accepts CRLF, LF and CR line breaks. A missing final line break is
    /// tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptManifest`] for text that is not UTF-8, a
    /// header without `": "`, a continuation line with no header to continue,
    /// or a named section that does not start with `Name`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes).map_err(|e| Error::CorruptManifest {
            line: 1 + bytes[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count(),
            reason: "not valid UTF-8".into(),
        })?;

        let mut manifest = Manifest::new();
        let mut headers: Vec<(String, String)> = Vec::new();
        let mut in_main = true;
        let mut last = 0;

        for (number, line) in split_lines(text).enumerate() {
            let number = number + 1;
            last = number;
            if line.is_empty() {
                manifest.finish_section(&mut in_main, &mut headers, number)?;
                continue;
            }
            if let Some(rest) = line.strip_prefix(' ') {
                let Some((_, value)) = headers.last_mut() else {
                    return Err(Error::CorruptManifest {
                        line: number,
                        reason: "continuation line without a header".into(),
                    });
                };
                value.push_str(rest);
                continue;
            }
            let Some((name, value)) = line.split_once(": ") else {
                return Err(Error::CorruptManifest {
                    line: number,
                    reason: format!("invalid header '{}'", line),
                });
            };
            if name.is_empty() {
                return Err(Error::CorruptManifest {
                    line: number,
                    reason: "empty header name".into(),
                });
            }
            headers.push((name.to_string(), value.to_string()));
        }
        manifest.finish_section(&mut in_main, &mut headers, last + 1)?;

        Ok(manifest)
    }

    /// Files the headers read since the last blank line.
    fn finish_section(&mut self, in_main: &mut bool, headers: &mut Vec<(String, String)>, line: usize) -> Result<()> {
        if *in_main {
            for (name, value) in headers.drain(..) {
                self.main.insert(name, value);
            }
            *in_main = false;
            return Ok(());
        }
        if headers.is_empty() {
            return Ok(());
        }

        let mut drained = headers.drain(..);
        let Some((first, section_name)) = drained.next() else {
            return Ok(());
        };
        if !first.eq_ignore_ascii_case("Name") {
            return Err(Error::CorruptManifest {
                line,
                reason: format!("section starts with '{}' instead of 'Name'", first),
            });
        }
        let section = self.sections.entry(section_name).or_default();
        for (name, value) in drained {
            section.insert(name, value);
        }
        Ok(())
    }

    /// Returns the main section.
    pub fn main(&self) -> &Attributes {
        &self.main
    }

    /// Returns the main section mutably.
    pub fn main_mut(&mut self) -> &mut Attributes {
        &mut self.main
    }

    /// Returns a named section.
    pub fn section(&self, name: &str) -> Option<&Attributes> {
        self.sections.get(name)
    }

    /// Returns a named section, creating it if needed.
    pub fn section_mut(&mut self, name: &str) -> &mut Attributes {
        self.sections.entry(name.to_string()).or_default()
    }

    /// Iterates over named sections in order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.sections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over every header value of every section mutably.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut String> {
        self.main
            .values_mut()
            .chain(self.sections.values_mut().flat_map(Attributes::values_mut))
    }

    /// Writes the manifest with CRLF line breaks and 72-byte lines.
    ///
    /// `Manifest-Version` leads the main section when present.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();

        let version = self.main.get("Manifest-Version");
        if let Some(version) = version {
            write_header(&mut out, "Manifest-Version", version);
        }
        for (name, value) in self.main.iter() {
            if !name.eq_ignore_ascii_case("Manifest-Version") {
                write_header(&mut out, name, value);
            }
        }
        out.push_str("\r\n");

        for (section, attributes) in &self.sections {
            write_header(&mut out, "Name", section);
            for (name, value) in attributes.iter() {
                write_header(&mut out, name, value);
            }
            out.push_str("\r\n");
        }

        out.into_bytes()
    }
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let text = text
        .strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .or_else(|| text.strip_suffix('\r'))
        .unwrap_or(text);
    let mut rest = if text.is_empty() { None } else { Some(text) };
    std::iter::from_fn(move || {
        let current = rest?;
        match current.find(['\r', '\n']) {
            Some(i) => {
                let skip = if current[i..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&current[i + skip..]);
                Some(&current[..i])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

/// Writes one header, wrapping at 72 bytes on character boundaries.
fn write_header(out: &mut String, name: &str, value: &str) {
    let line = format!("{}: {}", name, value);
    let mut budget = MAX_LINE;
    let mut start = 0;
    let mut first = true;
    for (i, c) in line.char_indices() {
        if i + c.len_utf8() - start > budget {
            if !first {
                out.push(' ');
            }
            out.push_str(&line[start..i]);
            out.push_str("\r\n");
            start = i;
            first = false;
            budget = MAX_LINE - 1;
        }
    }
    if !first {
        out.push(' ');
    }
    out.push_str(&line[start..]);
    out.push_str("\r\n");
}
