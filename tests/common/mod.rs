//! Shared test utilities for integration tests.
//!
//! Jars are built on disk through the crate's own [`VirtualArchive`] and class
//! files through [`ClassRecord`] builders, so every test exercises the same
//! container code the library uses.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use jarwright::classfile::{ClassRecord, access};
use jarwright::{OpenMode, VirtualArchive};

/// Writes a jar with the given `(path, data)` entries into `dir`.
///
/// # Example
///
/// ```ignore
/// let dir = tempfile::TempDir::new().unwrap();
/// let jar = create_jar(dir.path(), "app.jar", &[("a.txt", b"content" as &[u8])]).unwrap();
/// ```
pub fn create_jar(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> jarwright::Result<PathBuf> {
    let path = dir.join(name);
    let mut archive = VirtualArchive::open(&path, OpenMode::CreateNew)?;
    for (entry, data) in entries {
        archive.write(entry, *data)?;
    }
    archive.close()?;
    Ok(path)
}

/// Opens a jar read-only for assertions.
pub fn open_jar(path: &Path) -> VirtualArchive {
    VirtualArchive::open(path, OpenMode::ReadOnly).expect("Failed to open jar")
}

/// Returns the regular-file paths of a jar, sorted.
pub fn jar_files(path: &Path) -> Vec<String> {
    open_jar(path).files().map(|p| p.to_string()).collect()
}

/// Reads one entry of a jar as UTF-8 text.
pub fn read_text(path: &Path, entry: &str) -> String {
    let archive = open_jar(path);
    let data = archive
        .read(entry)
        .unwrap_or_else(|| panic!("entry {} missing", entry));
    String::from_utf8(data.to_vec()).expect("entry is not UTF-8")
}

/// Describes a synthetic class file.
pub struct ClassSpec<'a> {
    pub name: &'a str,
    pub super_name: &'a str,
    pub access: u16,
    pub interfaces: &'a [&'a str],
    pub fields: &'a [(u16, &'a str, &'a str)],
    pub methods: &'a [(u16, &'a str, &'a str)],
    pub strings: &'a [&'a str],
}

impl<'a> ClassSpec<'a> {
    /// A public class extending `java/lang/Object` with no members.
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            super_name: "java/lang/Object",
            access: access::PUBLIC,
            interfaces: &[],
            fields: &[],
            methods: &[],
            strings: &[],
        }
    }

    /// Builds the class-file bytes.
    pub fn build(&self) -> Vec<u8> {
        let mut class =
            ClassRecord::new(self.name, Some(self.super_name), self.access).expect("class");
        for interface in self.interfaces {
            class.add_interface(interface).expect("interface");
        }
        for (flags, name, descriptor) in self.fields {
            class.add_field(*flags, name, descriptor).expect("field");
        }
        for (flags, name, descriptor) in self.methods {
            class.add_method(*flags, name, descriptor).expect("method");
        }
        for value in self.strings {
            class.string_constant(value).expect("string");
        }
        class.encode().expect("encode")
    }
}

/// Builds a bare public class.
pub fn class_bytes(name: &str) -> Vec<u8> {
    ClassSpec::new(name).build()
}

/// Decodes one class entry of a jar.
pub fn read_class(path: &Path, entry: &str) -> ClassRecord {
    let archive = open_jar(path);
    let data = archive
        .read(entry)
        .unwrap_or_else(|| panic!("class {} missing", entry));
    ClassRecord::decode(data).expect("decode class")
}

/// A temporary directory for one test.
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("Failed to create temp dir")
}
