//! Handing classes to an external bytecode rewriter.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use walkdir::WalkDir;

use super::Transformer;
use crate::archive::VirtualArchive;
use crate::classfile::ClassRecord;
use crate::pattern::ClassSelector;
use crate::Result;

/// Rewrites class bytes with previously loaded transformer units.
///
/// Class names are dotted (`com.example.Foo`).
pub trait BytecodeRewriter {
    /// Receives the selected transformer units before any class is rewritten.
    ///
    /// `units` holds the dotted name and bytes of every selected unit found
    /// under `units_dir`.
    fn load_units(&mut self, units_dir: &Path, units: &[(String, Vec<u8>)]) -> Result<()>;

    /// Returns the rewritten bytes, or `None` to leave the class unchanged.
    fn rewrite(&mut self, class_name: &str, bytes: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Runs every class of an archive through a [`BytecodeRewriter`].
///
/// Transformer units are the compiled classes under a units directory whose
/// dotted names pass the include selector (default `**`, everything).
pub struct ClassRewrite {
    name: String,
    units_dir: PathBuf,
    include: ClassSelector,
    rewriter: Box<dyn BytecodeRewriter>,
}

impl ClassRewrite {
    /// Creates a rewrite step.
    pub fn new(
        name: impl Into<String>,
        units_dir: impl Into<PathBuf>,
        rewriter: impl BytecodeRewriter + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            units_dir: units_dir.into(),
            include: ClassSelector::default(),
            rewriter: Box::new(rewriter),
        }
    }

    /// Sets which units are loaded, e.g. `com.example.transformers.*`.
    pub fn include(mut self, selector: &str) -> Self {
        self.include = ClassSelector::parse(selector);
        self
    }

    fn collect_units(&self) -> Result<Vec<(String, Vec<u8>)>> {
        if !self.units_dir.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("transformer units directory {} does not exist", self.units_dir.display()),
            )
            .into());
        }

        let mut units = Vec::new();
        for entry in WalkDir::new(&self.units_dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() || !entry.file_name().to_string_lossy().ends_with(".class") {
                continue;
            }
            let bytes = fs::read(entry.path())?;
            let class_name = ClassRecord::decode(&bytes)
                .inspect_err(|e| log::error!("Failed to load transformer unit {}: {}", entry.path().display(), e))?
                .name()
                .replace('/', ".");
            if self.include.matches(&class_name) {
                log::debug!("Loaded transformer unit {}", class_name);
                units.push((class_name, bytes));
            }
        }
        Ok(units)
    }
}

impl fmt::Debug for ClassRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRewrite")
            .field("name", &self.name)
            .field("units_dir", &self.units_dir)
            .field("include", &self.include)
            .finish_non_exhaustive()
    }
}

impl Transformer for ClassRewrite {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&mut self, archive: &mut VirtualArchive) -> Result<()> {
        let units = self.collect_units()?;
        self.rewriter.load_units(&self.units_dir, &units)?;

        for path in archive.walk("") {
            if !path.is_class_file() {
                continue;
            }
            let Some(bytes) = archive.read(path.as_str()) else {
                continue;
            };
            let rewritten = ClassRecord::decode(bytes)
                .and_then(|class| {
                    let class_name = class.name().replace('/', ".");
                    self.rewriter.rewrite(&class_name, bytes)
                })
                .map_err(|e| e.in_entry(path.as_str()))?;

            if let Some(rewritten) = rewritten {
                archive.write(path.as_str(), rewritten)?;
                log::debug!("Transformed class: {}", path);
            }
        }
        Ok(())
    }
}

/// A [`BytecodeRewriter`] backed by an external command.
///
/// For each class the command is run as
/// `<program> <args...> <units_dir> <class_name>` with the class bytes on
/// stdin. Whatever it prints on stdout replaces the class; empty output or
/// output identical to the input leaves the class unchanged. A non-zero exit
/// status fails the rewrite.
#[derive(Debug, Clone)]
pub struct ProcessRewriter {
    program: OsString,
    args: Vec<OsString>,
    units_dir: Option<PathBuf>,
}

impl ProcessRewriter {
    /// Creates a rewriter running `program`.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            units_dir: None,
        }
    }

    /// Adds leading arguments.
    pub fn args<S: Into<OsString>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl BytecodeRewriter for ProcessRewriter {
    fn load_units(&mut self, units_dir: &Path, units: &[(String, Vec<u8>)]) -> Result<()> {
        log::debug!("Using {} transformer units from {}", units.len(), units_dir.display());
        self.units_dir = Some(units_dir.to_path_buf());
        Ok(())
    }

    fn rewrite(&mut self, class_name: &str, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut input = tempfile::tempfile()?;
        input.write_all(bytes)?;
        input.seek(SeekFrom::Start(0))?;

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(units_dir) = &self.units_dir {
            command.arg(units_dir);
        }
        let output = command
            .arg(class_name)
            .stdin(Stdio::from(input))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(io::Error::other(format!(
                "rewriter exited with {} for {}: {}",
                output.status,
                class_name,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
            .into());
        }
        if output.stdout.is_empty() || output.stdout == bytes {
            Ok(None)
        } else {
            Ok(Some(output.stdout))
        }
    }
}
