//! The binary plugin-cache resource
//! (`META-INF/org/apache/logging/log4j/core/config/plugins/Log4j2Plugins.dat`).
//!
//! # Wire Format
//!
//! Big-endian, strings as `u16`-length-prefixed modified UTF-8:
//!
//! ```text
//! categoryCount: i32
//! repeat categoryCount:
//!     categoryName: str
//!     pluginCount: i32
//!     repeat pluginCount:
//!         key: str
//!         className: str
//!         name: str
//!         printable: bool
//!         defer: bool
//! ```
//!
//! Category and plugin order is preserved across decode and encode.

use indexmap::IndexMap;

use crate::Result;
use crate::binary::{self, ByteReader, ByteWriter, Format};

/// Metadata of one registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginEntry {
    /// Fully qualified (dotted) implementation class.
    pub class_name: String,
    /// Display name.
    pub name: String,
    /// Whether the plugin is printable.
    pub printable: bool,
    /// Whether plugin creation is deferred.
    pub defer: bool,
}

impl PluginEntry {
    /// Creates an entry.
    pub fn new(class_name: impl Into<String>, name: impl Into<String>, printable: bool, defer: bool) -> Self {
        Self {
            class_name: class_name.into(),
            name: name.into(),
            printable,
            defer,
        }
    }
}

/// Category name to plugin key to entry.
///
/// # Example
///
/// ```
/// use jarwright::plugin_cache::{PluginCache, PluginEntry};
///
/// let mut a = PluginCache::new();
/// a.insert("core", "console", PluginEntry::new("a.Console", "Console", true, false));
///
/// let mut b = PluginCache::new();
/// b.insert("core", "console", PluginEntry::new("b.Console", "Console", true, false));
/// b.insert("core", "file", PluginEntry::new("b.File", "File", true, false));
///
/// a.merge(&b);
/// assert_eq!(a.get("core", "console").unwrap().class_name, "a.Console");
/// assert_eq!(a.get("core", "file").unwrap().class_name, "b.File");
///
/// let bytes = a.encode()?;
/// assert_eq!(PluginCache::decode(&bytes)?, a);
/// # Ok::<(), jarwright::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginCache {
    categories: IndexMap<String, IndexMap<String, PluginEntry>>,
}

impl PluginCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a cache.
    ///
    /// A category listed twice is folded into its first occurrence; a key
    /// listed twice in one category keeps the last entry read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptPluginCache`](crate::Error::CorruptPluginCache)
    /// if the input ends early, a count is negative, or a string is not
    /// modified UTF-8.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes, Format::PluginCache);
        let mut cache = Self::new();

        let category_count = r.count()?;
        for _ in 0..category_count {
            let category = r.utf()?;
            let plugin_count = r.count()?;
            let plugins = cache.categories.entry(category).or_default();
            for _ in 0..plugin_count {
                let key = r.utf()?;
                let entry = PluginEntry {
                    class_name: r.utf()?,
                    name: r.utf()?,
                    printable: r.bool()?,
                    defer: r.bool()?,
                };
                plugins.insert(key, entry);
            }
        }

        if !r.is_empty() {
            log::debug!("Ignoring {} trailing bytes after plugin cache", r.remaining());
        }
        Ok(cache)
    }

    /// Encodes the cache in the wire format.
    ///
    /// # Errors
    ///
    /// Fails only if a string is longer than 65535 encoded bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.put_i32(self.categories.len() as i32);
        for (category, plugins) in &self.categories {
            binary::put_utf(&mut out, category)?;
            out.put_i32(plugins.len() as i32);
            for (key, entry) in plugins {
                binary::put_utf(&mut out, key)?;
                binary::put_utf(&mut out, &entry.class_name)?;
                binary::put_utf(&mut out, &entry.name)?;
                out.put_bool(entry.printable);
                out.put_bool(entry.defer);
            }
        }
        Ok(out)
    }

    /// Adds `other` into this cache. Keys already present are kept.
    pub fn merge(&mut self, other: &PluginCache) {
        for (category, plugins) in &other.categories {
            let target = self.categories.entry(category.clone()).or_default();
            for (key, entry) in plugins {
                target.entry(key.clone()).or_insert_with(|| entry.clone());
            }
        }
    }

    /// Registers an entry, replacing any entry under the same key.
    pub fn insert(&mut self, category: impl Into<String>, key: impl Into<String>, entry: PluginEntry) {
        self.categories
            .entry(category.into())
            .or_default()
            .insert(key.into(), entry);
    }

    /// Returns the entry registered under `key` in `category`.
    pub fn get(&self, category: &str, key: &str) -> Option<&PluginEntry> {
        self.categories.get(category)?.get(key)
    }

    /// Returns the category names in order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Returns the plugins of one category in order.
    pub fn plugins(&self, category: &str) -> impl Iterator<Item = (&str, &PluginEntry)> {
        self.categories
            .get(category)
            .into_iter()
            .flat_map(|p| p.iter().map(|(k, e)| (k.as_str(), e)))
    }

    /// Returns every entry for in-place edits.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut PluginEntry> {
        self.categories.values_mut().flat_map(|p| p.values_mut())
    }

    /// Returns the total number of plugins.
    pub fn len(&self) -> usize {
        self.categories.values().map(IndexMap::len).sum()
    }

    /// Returns true if no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn sample() -> PluginCache {
        let mut cache = PluginCache::new();
        cache.insert("core", "console", PluginEntry::new("org.a.Console", "Console", true, false));
        cache.insert("core", "file", PluginEntry::new("org.a.File", "File", false, true));
        cache.insert("converter", "msg", PluginEntry::new("org.a.Msg", "m", false, false));
        cache
    }

    #[test]
    fn test_exact_layout() {
        let mut cache = PluginCache::new();
        cache.insert("c", "k", PluginEntry::new("X", "n", true, false));
        let bytes = cache.encode().unwrap();
        assert_eq!(
            bytes,
            vec![
                0, 0, 0, 1, // categories
                0, 1, b'c', // category name
                0, 0, 0, 1, // plugins
                0, 1, b'k', // key
                0, 1, b'X', // class
                0, 1, b'n', // name
                1, 0, // printable, defer
            ]
        );
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let cache = sample();
        let decoded = PluginCache::decode(&cache.encode().unwrap()).unwrap();
        assert_eq!(decoded, cache);
        assert_eq!(decoded.categories().collect::<Vec<_>>(), vec!["core", "converter"]);
    }

    #[test]
    fn test_truncation_is_rejected() {
        let bytes = sample().encode().unwrap();
        for len in 0..bytes.len() {
            let err = PluginCache::decode(&bytes[..len]).unwrap_err();
            assert!(matches!(err, Error::CorruptPluginCache { .. }), "length {}", len);
        }
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let err = PluginCache::decode(&(-5i32).to_be_bytes()).unwrap_err();
        assert!(err.to_string().contains("negative count"));
    }

    #[test]
    fn test_huge_count_fails_without_allocating() {
        let err = PluginCache::decode(&i32::MAX.to_be_bytes()).unwrap_err();
        assert!(matches!(err, Error::CorruptPluginCache { offset: 4, .. }));
    }

    #[test]
    fn test_merge_first_wins() {
        let mut a = sample();
        let mut b = PluginCache::new();
        b.insert("core", "console", PluginEntry::new("other.Console", "C", false, false));
        b.insert("lookup", "env", PluginEntry::new("other.Env", "env", false, false));
        a.merge(&b);
        assert_eq!(a.get("core", "console").unwrap().class_name, "org.a.Console");
        assert_eq!(a.get("lookup", "env").unwrap().class_name, "other.Env");
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn test_merge_with_self_is_identity() {
        let mut cache = sample();
        let copy = cache.clone();
        cache.merge(&copy);
        assert_eq!(cache, copy);
    }
}
