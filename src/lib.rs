//! # jarwright
//!
//! A library for rewriting Java archives: merging jars, relocating packages,
//! widening access and patching string constants.
//!
//! Every transformation operates on a [`VirtualArchive`], an in-memory view of
//! a jar's entries that is flushed back to disk in one step. Transformations
//! are small units implementing [`Transformer`] and run in order through
//! [`apply_all`] or [`transform_archive`]. Class files are decoded into a
//! structural [`ClassRecord`](classfile::ClassRecord) whose constant pool is
//! edited in place, so instruction streams are never re-encoded.
//!
//! ## Quick Start
//!
//! ### Relocating a Dependency
//!
//! ```rust,no_run
//! use jarwright::{RelocationOptions, RelocationRules, Relocator, Result};
//! use jarwright::transform::{TransformOptions, transform_archive};
//!
//! fn main() -> Result<()> {
//!     let rules = RelocationRules::new()
//!         .rule("com.google.gson", "myapp.shaded.gson")?;
//!
//!     let mut chain = [Relocator::new("shade-gson", RelocationOptions::new(rules))];
//!
//!     // Copy the input and rewrite the copy
//!     let options = TransformOptions::new().output("build/gson-shaded.jar");
//!     let output = transform_archive("libs/gson.jar", &options, &mut chain)?;
//!     println!("Wrote {}", output.display());
//!     Ok(())
//! }
//! ```
//!
//! ### Merging Jars
//!
//! ```rust,no_run
//! use jarwright::{DuplicatePolicy, MergeOptions, Result, merge_archives};
//!
//! fn main() -> Result<()> {
//!     let options = MergeOptions::new()
//!         .duplicate_policy(DuplicatePolicy::Warn)
//!         .with_default_excludes()?;
//!
//!     let result = merge_archives("app.jar", &["lib/a.jar", "lib/b.jar"], "app-all.jar", &options)?;
//!     println!(
//!         "Wrote {} entries, merged {} service files",
//!         result.entries_written, result.services_merged
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ### Building a Chain
//!
//! Different transformer kinds are combined through trait objects:
//!
//! ```rust,no_run
//! use jarwright::{Result, Transformer, VirtualArchive, apply_all};
//! use jarwright::archive::OpenMode;
//! use jarwright::transform::{AccessPatcher, Excluder, StringReplacer};
//!
//! fn main() -> Result<()> {
//!     let mut chain: Vec<Box<dyn Transformer>> = vec![
//!         Box::new(AccessPatcher::new("open-internals").full(["com/example/Engine.state:I"])?),
//!         Box::new(StringReplacer::new("version").replace("@VERSION@", "2.1.0")?),
//!         Box::new(Excluder::new("strip-maven").prefixes(["META-INF/maven/"])),
//!     ];
//!
//!     let mut archive = VirtualArchive::open("engine.jar", OpenMode::ReadWrite)?;
//!     apply_all(&mut archive, &mut chain)?;
//!     archive.close()
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli` | No | The `jarwright` command-line tool |
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], which is an alias for
//! `std::result::Result<T, Error>`. Failures inside a chain are wrapped with
//! the transformer name and, where one applies, the entry path; use
//! [`Error::root_cause`] to get at the underlying failure:
//!
//! ```rust,no_run
//! use jarwright::{Error, MergeOptions, merge_archives};
//!
//! fn merge(primary: &str, other: &str) -> jarwright::Result<()> {
//!     match merge_archives(primary, &[other], "out.jar", &MergeOptions::default()) {
//!         Ok(result) => {
//!             println!("Merged {} entries", result.entries_written);
//!             Ok(())
//!         }
//!         Err(Error::DuplicateConflict { archive, path }) => {
//!             eprintln!("{} provides {} twice", archive, path);
//!             Err(Error::DuplicateConflict { archive, path })
//!         }
//!         Err(e) if e.is_corruption() => {
//!             eprintln!("Malformed input: {}", e.root_cause());
//!             Err(e)
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! # fn main() {}
//! ```
//!
//! ## Logging
//!
//! The library logs through the [`log`](https://docs.rs/log) facade and never
//! installs a logger. Per-entry rewrites are logged at `debug`, rewritten
//! service files, manifests and plugin caches at `info`, recovered conditions
//! such as rename collisions at `warn`.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive;
pub mod classfile;
pub mod entry_path;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod mutf8;
pub mod pattern;
pub mod plugin_cache;
pub mod relocate;
pub mod transform;

// Big-endian cursor shared by the class-file and plugin-cache codecs
mod binary;

pub use archive::{OpenMode, VirtualArchive};
pub use entry_path::EntryPath;
pub use error::{Error, Result};
pub use merge::{DuplicatePolicy, MergeOptions, MergeResult, merge_archives};
pub use pattern::{Glob, PrefixFilter};
pub use plugin_cache::{PluginCache, PluginEntry};
pub use relocate::{RelocationOptions, RelocationRules, Relocator};
pub use transform::{Transformer, apply_all, transform_archive};
