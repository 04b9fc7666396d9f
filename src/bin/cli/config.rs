//! Transformer chain files.
//!
//! A chain file is a JSON document listing transformer units in the order
//! they run:
//!
//! ```json
//! {
//!   "transformers": [
//!     { "kind": "relocate", "relocations": { "com.google.gson": "app.shaded.gson" } },
//!     { "kind": "access", "full": ["com/example/Engine.state:I"] },
//!     { "kind": "string_replace", "replacements": [{ "from": "@VERSION@", "to": "2.1.0" }] },
//!     { "kind": "exclude", "prefixes": ["META-INF/maven/"] },
//!     { "kind": "rewrite", "units_dir": "build/units", "command": ["java", "-jar", "rw.jar"] }
//!   ]
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use jarwright::relocate::{RelocationOptions, RelocationRules, Relocator};
use jarwright::transform::{
    AccessPatcher, ClassRewrite, Excluder, ProcessRewriter, StringReplacer, Transformer,
};
use jarwright::PrefixFilter;

/// Errors loading a chain file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read chain file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid chain file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rewrite transformer '{name}' needs a command")]
    MissingCommand { name: String },

    #[error(transparent)]
    Transformer(#[from] jarwright::Error),
}

/// A parsed chain file.
#[derive(Debug, Deserialize)]
pub struct ChainConfig {
    pub transformers: Vec<TransformerConfig>,
}

/// One transformer unit, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformerConfig {
    Relocate {
        name: Option<String>,
        relocations: BTreeMap<String, String>,
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
        remap_classes: Option<bool>,
        relocate_paths: Option<bool>,
        remap_strings: Option<bool>,
        remap_services: Option<bool>,
        remap_manifest: Option<bool>,
        remove_empty_dirs: Option<bool>,
        remap_plugin_cache: Option<bool>,
    },
    Access {
        name: Option<String>,
        #[serde(default)]
        accessible: Vec<String>,
        #[serde(default)]
        mutable: Vec<String>,
        #[serde(default)]
        full: Vec<String>,
    },
    StringReplace {
        name: Option<String>,
        extensions: Option<Vec<String>>,
        #[serde(default)]
        replacements: Vec<Replacement>,
        #[serde(default)]
        regex_replacements: Vec<Replacement>,
    },
    Exclude {
        name: Option<String>,
        #[serde(default)]
        prefixes: Vec<String>,
        #[serde(default)]
        patterns: Vec<String>,
        #[serde(default)]
        reversed: bool,
    },
    Rewrite {
        name: Option<String>,
        units_dir: PathBuf,
        include: Option<String>,
        command: Vec<String>,
    },
}

/// A `from` -> `to` replacement pair.
#[derive(Debug, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

impl ChainConfig {
    /// Reads and parses a chain file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the transformer chain; relative unit directories resolve against `base`.
    pub fn build(self, base: &Path) -> Result<Vec<Box<dyn Transformer>>, ConfigError> {
        self.transformers
            .into_iter()
            .enumerate()
            .map(|(index, unit)| unit.build(index + 1, base))
            .collect()
    }
}

impl TransformerConfig {
    fn kind(&self) -> &'static str {
        match self {
            Self::Relocate { .. } => "relocate",
            Self::Access { .. } => "access",
            Self::StringReplace { .. } => "string_replace",
            Self::Exclude { .. } => "exclude",
            Self::Rewrite { .. } => "rewrite",
        }
    }

    fn build(self, position: usize, base: &Path) -> Result<Box<dyn Transformer>, ConfigError> {
        let default_name = format!("{}#{}", self.kind(), position);
        let transformer: Box<dyn Transformer> = match self {
            Self::Relocate {
                name,
                relocations,
                include,
                exclude,
                remap_classes,
                relocate_paths,
                remap_strings,
                remap_services,
                remap_manifest,
                remove_empty_dirs,
                remap_plugin_cache,
            } => {
                let mut rules = RelocationRules::new();
                for (from, to) in &relocations {
                    rules = rules.rule(from, to)?;
                }
                let mut options = RelocationOptions::new(rules)
                    .filter(PrefixFilter::new().allow(include).deny(exclude));
                let toggles: [(Option<bool>, fn(RelocationOptions, bool) -> RelocationOptions); 7] = [
                    (remap_classes, RelocationOptions::remap_classes),
                    (relocate_paths, RelocationOptions::relocate_paths),
                    (remap_strings, RelocationOptions::remap_strings),
                    (remap_services, RelocationOptions::remap_services),
                    (remap_manifest, RelocationOptions::remap_manifest),
                    (remove_empty_dirs, RelocationOptions::remove_empty_dirs),
                    (remap_plugin_cache, RelocationOptions::remap_plugin_cache),
                ];
                for (value, set) in toggles {
                    if let Some(value) = value {
                        options = set(options, value);
                    }
                }
                Box::new(Relocator::new(name.unwrap_or(default_name), options))
            }

            Self::Access {
                name,
                accessible,
                mutable,
                full,
            } => Box::new(
                AccessPatcher::new(name.unwrap_or(default_name))
                    .accessible(accessible)?
                    .mutable(mutable)?
                    .full(full)?,
            ),

            Self::StringReplace {
                name,
                extensions,
                replacements,
                regex_replacements,
            } => {
                let mut replacer = StringReplacer::new(name.unwrap_or(default_name));
                if let Some(extensions) = extensions {
                    replacer = replacer.extensions(extensions);
                }
                for Replacement { from, to } in replacements {
                    replacer = replacer.replace(from, to)?;
                }
                for Replacement { from, to } in regex_replacements {
                    replacer = replacer.replace_regex(&from, to)?;
                }
                Box::new(replacer)
            }

            Self::Exclude {
                name,
                prefixes,
                patterns,
                reversed,
            } => {
                let mut excluder = Excluder::new(name.unwrap_or(default_name))
                    .prefixes(prefixes)
                    .reversed(reversed);
                for pattern in &patterns {
                    excluder = excluder.regex(pattern)?;
                }
                Box::new(excluder)
            }

            Self::Rewrite {
                name,
                units_dir,
                include,
                command,
            } => {
                let name = name.unwrap_or(default_name);
                let Some((program, args)) = command.split_first() else {
                    return Err(ConfigError::MissingCommand { name });
                };
                let rewriter = ProcessRewriter::new(program).args(args);
                let mut rewrite = ClassRewrite::new(name, base.join(units_dir), rewriter);
                if let Some(include) = include {
                    rewrite = rewrite.include(&include);
                }
                Box::new(rewrite)
            }
        };
        Ok(transformer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &str) -> Result<Vec<Box<dyn Transformer>>, ConfigError> {
        ChainConfig::parse(Path::new("chain.json"), text)?.build(Path::new("/work"))
    }

    #[test]
    fn test_chain_names_and_order() {
        let chain = build(
            r#"{
                "transformers": [
                    { "kind": "relocate", "relocations": { "a.b": "x.y" }, "remap_strings": true },
                    { "kind": "access", "name": "open", "accessible": ["com/Foo"] },
                    { "kind": "string_replace", "replacements": [{ "from": "a", "to": "b" }] },
                    { "kind": "exclude", "prefixes": ["META-INF/maven/"], "patterns": [".*\\.txt"] },
                    { "kind": "rewrite", "units_dir": "units", "command": ["java", "-jar", "rw.jar"] }
                ]
            }"#,
        )
        .unwrap();

        let names: Vec<&str> = chain.iter().map(|t| t.name()).collect();
        assert_eq!(names, ["relocate#1", "open", "string_replace#3", "exclude#4", "rewrite#5"]);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = build(r#"{ "transformers": [{ "kind": "shrink" }] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_target_surfaces_library_error() {
        let err = build(r#"{ "transformers": [{ "kind": "access", "full": ["not a target"] }] }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Transformer(jarwright::Error::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_rewrite_without_command() {
        let err = build(r#"{ "transformers": [{ "kind": "rewrite", "units_dir": "u", "command": [] }] }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCommand { .. }));
    }
}
