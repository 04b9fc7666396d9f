//! Package relocation.
//!
//! [`RelocationRules`] maps qualified names under prefix-rename rules;
//! [`Relocator`] applies them to a whole archive: class files, service
//! registrations, the manifest, the plugin cache and the entry paths
//! themselves.
//!
//! # Name encodings
//!
//! A rule is stored in internal (slashed) form and applies consistently to
//! the three encodings a qualified name shows up in:
//!
//! | Encoding | Example | Method |
//! |----------|---------|--------|
//! | Internal | `com/example/Foo` | [`map_internal`](RelocationRules::map_internal) |
//! | Dotted | `com.example.Foo` | [`map_string`](RelocationRules::map_string) |
//! | Path | `com/example/Foo.class` | [`map_path`](RelocationRules::map_path) |
//!
//! Prefixes match whole segments: `com/example` matches `com/example` and
//! `com/example/Foo`, never `com/examples/Foo`. When several rules match,
//! the longest prefix wins.
//!
//! # Example
//!
//! ```
//! use jarwright::relocate::RelocationRules;
//!
//! let rules = RelocationRules::new()
//!     .rule("com.google", "shaded.com.google")?
//!     .rule("com.google.common.base", "base")?;
//!
//! assert_eq!(rules.map_internal("com/google/gson/Gson").as_deref(), Some("shaded/com/google/gson/Gson"));
//! assert_eq!(rules.map_string("com.google.common.base.Strings").as_deref(), Some("base.Strings"));
//! assert_eq!(rules.map_internal("com/googlex/Foo"), None);
//! # Ok::<(), jarwright::Error>(())
//! ```

use crate::archive::VirtualArchive;
use crate::classfile::{ClassRecord, NameRole, remap_signature};
use crate::entry_path::{EntryPath, SERVICES_DIR};
use crate::manifest::Manifest;
use crate::pattern::PrefixFilter;
use crate::plugin_cache::PluginCache;
use crate::transform::Transformer;
use crate::{Error, Result};

/// An ordered set of prefix-rename rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationRules {
    rules: Vec<(String, String)>,
}

impl RelocationRules {
    /// Creates an empty rule set, which maps nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule renaming the package prefix `from` to `to`.
    ///
    /// Both prefixes may be given dotted or slashed; trailing separators are
    /// ignored. A later rule for the same `from` replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if either prefix is empty.
    pub fn rule(mut self, from: &str, to: &str) -> Result<Self> {
        let from_internal = to_internal(from);
        let to_internal = to_internal(to);
        for (value, original) in [(&from_internal, from), (&to_internal, to)] {
            if value.is_empty() {
                return Err(Error::InvalidPattern {
                    pattern: original.to_string(),
                    reason: "relocation prefix must not be empty".into(),
                });
            }
        }
        self.rules.retain(|(f, _)| *f != from_internal);
        self.rules.push((from_internal, to_internal));
        Ok(self)
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates over `(from, to)` pairs in internal form.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(f, t)| (f.as_str(), t.as_str()))
    }

    /// Maps an internal (slashed) name. Returns `None` if no rule applies.
    pub fn map_internal(&self, name: &str) -> Option<String> {
        let (from, to) = self
            .rules
            .iter()
            .filter(|(from, _)| matches_segments(name, from))
            .max_by_key(|(from, _)| from.len())?;
        Some(format!("{}{}", to, &name[from.len()..]))
    }

    /// Maps a name that may be dotted or slashed.
    ///
    /// Strings containing a `/` are treated as internal names or paths;
    /// everything else is treated as a dotted name and returned dotted.
    pub fn map_string(&self, value: &str) -> Option<String> {
        if value.contains('/') {
            self.map_internal(value)
        } else {
            self.map_internal(&value.replace('.', "/"))
                .map(|mapped| mapped.replace('/', "."))
        }
    }

    /// Maps an entry path such as `com/example/Foo.class`.
    ///
    /// The file name is matched without its extension, so a rule naming a
    /// single class also moves that class's file.
    pub fn map_path(&self, path: &str) -> Option<String> {
        let file_start = path.rfind('/').map_or(0, |i| i + 1);
        match path[file_start..].find('.') {
            Some(dot) if dot > 0 => {
                let (stem, extension) = path.split_at(file_start + dot);
                self.map_internal(stem)
                    .map(|mapped| format!("{}{}", mapped, extension))
            }
            _ => self.map_internal(path),
        }
    }

    /// Maps every class name inside a descriptor or generic signature.
    ///
    /// Returns `None` if nothing changed or the input is malformed.
    pub fn map_signature(&self, signature: &str) -> Option<String> {
        let mapped = remap_signature(signature, &mut |name: &str| self.map_internal(name))?;
        (mapped != signature).then_some(mapped)
    }
}

fn to_internal(prefix: &str) -> String {
    prefix
        .trim()
        .replace('.', "/")
        .trim_matches('/')
        .to_string()
}

fn matches_segments(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Configuration of a [`Relocator`].
///
/// The defaults remap classes, service registrations, the manifest and the
/// plugin cache, and move entry paths; string constants are left alone and
/// empty directories are kept.
#[derive(Debug, Clone)]
pub struct RelocationOptions {
    rules: RelocationRules,
    filter: PrefixFilter,
    remap_classes: bool,
    relocate_paths: bool,
    remap_strings: bool,
    remap_services: bool,
    remap_manifest: bool,
    remove_empty_dirs: bool,
    remap_plugin_cache: bool,
}

impl Default for RelocationOptions {
    fn default() -> Self {
        Self {
            rules: RelocationRules::new(),
            filter: PrefixFilter::new(),
            remap_classes: true,
            relocate_paths: true,
            remap_strings: false,
            remap_services: true,
            remap_manifest: true,
            remove_empty_dirs: false,
            remap_plugin_cache: true,
        }
    }
}

impl RelocationOptions {
    /// Creates options with the default toggles and the given rules.
    pub fn new(rules: RelocationRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Sets the allow/deny prefix filter on entry paths.
    pub fn filter(mut self, filter: PrefixFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Rewrites names inside class files.
    pub fn remap_classes(mut self, enabled: bool) -> Self {
        self.remap_classes = enabled;
        self
    }

    /// Moves entries whose path falls under a rule.
    ///
    /// Class files are only ever moved by this step. With it turned off a
    /// remapped class keeps its old path, so its entry name no longer
    /// matches the class name it declares.
    pub fn relocate_paths(mut self, enabled: bool) -> Self {
        self.relocate_paths = enabled;
        self
    }

    /// Rewrites string constants that are qualified names.
    pub fn remap_strings(mut self, enabled: bool) -> Self {
        self.remap_strings = enabled;
        self
    }

    /// Rewrites service-registration file names and lines.
    pub fn remap_services(mut self, enabled: bool) -> Self {
        self.remap_services = enabled;
        self
    }

    /// Rewrites manifest attribute values.
    pub fn remap_manifest(mut self, enabled: bool) -> Self {
        self.remap_manifest = enabled;
        self
    }

    /// Deletes directories left empty once relocation is done.
    pub fn remove_empty_dirs(mut self, enabled: bool) -> Self {
        self.remove_empty_dirs = enabled;
        self
    }

    /// Rewrites class names registered in the plugin cache.
    pub fn remap_plugin_cache(mut self, enabled: bool) -> Self {
        self.remap_plugin_cache = enabled;
        self
    }

    /// Returns the rules.
    pub fn rules(&self) -> &RelocationRules {
        &self.rules
    }
}

/// Relocates packages across an archive.
///
/// Entries that fail the prefix filter are left untouched. A name no rule
/// applies to is kept as is. A move whose target is already taken is
/// skipped with a warning and the entry keeps its path.
#[derive(Debug, Clone)]
pub struct Relocator {
    name: String,
    options: RelocationOptions,
}

impl Relocator {
    /// Creates a relocator.
    pub fn new(name: impl Into<String>, options: RelocationOptions) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }

    /// Returns the options.
    pub fn options(&self) -> &RelocationOptions {
        &self.options
    }

    fn relocate_entry(&self, archive: &mut VirtualArchive, path: &EntryPath) -> Result<()> {
        let options = &self.options;
        let mut current = path.clone();

        if path.is_class_file() {
            if options.remap_classes {
                self.remap_class(archive, path)?;
            }
        } else if path.is_meta_inf() {
            if options.remap_services && path.is_service_file() {
                current = self.remap_service(archive, path)?;
            } else if options.remap_manifest && path.is_manifest() {
                self.remap_manifest(archive, path)?;
            } else if options.remap_plugin_cache && path.is_plugin_cache() {
                self.remap_plugin_cache(archive, path)?;
            }
        }

        if options.relocate_paths {
            self.move_entry(archive, &current)?;
        }
        Ok(())
    }

    fn remap_class(&self, archive: &mut VirtualArchive, path: &EntryPath) -> Result<()> {
        let Some(bytes) = archive.read(path.as_str()) else {
            return Ok(());
        };
        let mut class = ClassRecord::decode(bytes)?;
        let rules = &self.options.rules;
        let remap_strings = self.options.remap_strings;

        let changed = class.remap_names(|role, name| match role {
            NameRole::ClassName | NameRole::PackageName => rules.map_internal(name),
            NameRole::Descriptor | NameRole::Signature => rules.map_signature(name),
            NameRole::StringLiteral if remap_strings => rules.map_string(name),
            _ => None,
        })?;

        if changed {
            archive.write(path.as_str(), class.encode()?)?;
            log::debug!("Remapped class: {}", path);
        }
        Ok(())
    }

    /// Rewrites a service file and returns where it ended up.
    fn remap_service(&self, archive: &mut VirtualArchive, path: &EntryPath) -> Result<EntryPath> {
        let rules = &self.options.rules;
        let Some(bytes) = archive.read(path.as_str()) else {
            return Ok(path.clone());
        };

        match std::str::from_utf8(bytes) {
            Ok(text) => {
                let lines: Vec<&str> = text.lines().collect();
                let mut modified = false;
                let remapped: Vec<String> = lines
                    .iter()
                    .map(|line| {
                        if line.starts_with('#') {
                            return line.to_string();
                        }
                        match rules.map_string(line) {
                            Some(mapped) if mapped != *line => {
                                modified = true;
                                mapped
                            }
                            _ => line.to_string(),
                        }
                    })
                    .collect();
                if modified {
                    log::info!(
                        "Remapped service implementations: {} -> {}",
                        lines.join(", "),
                        remapped.join(", ")
                    );
                    archive.write(path.as_str(), remapped.join("\n"))?;
                }
            }
            Err(_) => log::warn!("Service file {} is not UTF-8, leaving its lines", path),
        }

        let service = &path.as_str()[SERVICES_DIR.len()..];
        let Some(renamed) = rules.map_string(service).filter(|s| s != service) else {
            return Ok(path.clone());
        };
        let target = format!("{}{}", &path.as_str()[..SERVICES_DIR.len()], renamed);
        match archive.rename(path.as_str(), &target) {
            Ok(()) => {
                log::info!("Remapped service name: {} -> {}", service, renamed);
                EntryPath::new(&target)
            }
            Err(Error::EntryExists { .. }) => {
                log::warn!("Not renaming service {} to {}: target exists", path, target);
                Ok(path.clone())
            }
            Err(e) => Err(e),
        }
    }

    fn remap_manifest(&self, archive: &mut VirtualArchive, path: &EntryPath) -> Result<()> {
        let Some(bytes) = archive.read(path.as_str()) else {
            return Ok(());
        };
        let mut manifest = Manifest::parse(bytes)?;

        let mut modified = false;
        for value in manifest.values_mut() {
            if let Some(mapped) = self.options.rules.map_string(value) {
                if mapped != *value {
                    *value = mapped;
                    modified = true;
                }
            }
        }

        if modified {
            archive.write(path.as_str(), manifest.to_bytes())?;
            log::info!("Remapped manifest: {}", path);
        }
        Ok(())
    }

    fn remap_plugin_cache(&self, archive: &mut VirtualArchive, path: &EntryPath) -> Result<()> {
        let Some(bytes) = archive.read(path.as_str()) else {
            return Ok(());
        };
        let mut cache = PluginCache::decode(bytes)?;

        let mut modified = false;
        for entry in cache.entries_mut() {
            if let Some(mapped) = self.options.rules.map_string(&entry.class_name) {
                if mapped != entry.class_name {
                    log::debug!("Remapped plugin class: {} -> {}", entry.class_name, mapped);
                    entry.class_name = mapped;
                    modified = true;
                }
            }
        }

        if modified {
            archive.write(path.as_str(), cache.encode()?)?;
            log::info!("Remapped plugins: {}", path);
        }
        Ok(())
    }

    fn move_entry(&self, archive: &mut VirtualArchive, path: &EntryPath) -> Result<()> {
        let rules = &self.options.rules;
        let target = match path.split_versioned() {
            Some((prefix, rest)) => rules.map_path(rest).map(|mapped| format!("{}{}", prefix, mapped)),
            None if path.starts_with_ignore_case(crate::entry_path::VERSIONS_DIR) => None,
            None => rules.map_path(path.as_str()),
        };
        let Some(target) = target.filter(|t| t != path.as_str()) else {
            return Ok(());
        };

        match archive.rename(path.as_str(), &target) {
            Ok(()) => {
                log::debug!("Moved {} -> {}", path, target);
                Ok(())
            }
            Err(Error::EntryExists { .. }) => {
                log::warn!("Not moving {} to {}: target exists", path, target);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Transformer for Relocator {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()> {
        if !self.options.rules.is_empty() {
            for path in archive.walk("") {
                if !archive.is_file(path.as_str()) || !self.options.filter.should_process(path.as_str()) {
                    continue;
                }
                self.relocate_entry(archive, &path)
                    .map_err(|e| e.in_entry(path.as_str()))?;
            }
        }

        if self.options.remove_empty_dirs {
            let removed = archive.remove_empty_directories()?;
            log::debug!("Removed {} empty directories", removed);
        }
        Ok(())
    }
}
