//! Loading and storing the zip container behind a [`VirtualArchive`].
//!
//! [`VirtualArchive`]: super::VirtualArchive

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::entry_path::{EntryPath, MANIFEST_PATH, META_INF};
use crate::{Error, Result};

type Entries = BTreeMap<EntryPath, Vec<u8>>;
type Directories = BTreeSet<EntryPath>;

/// Reads every entry of the container at `path` into memory.
pub(super) fn load(path: &Path) -> Result<(Entries, Directories)> {
    let file = File::open(path)?;
    let mut zip = ZipArchive::new(BufReader::new(file))?;

    let mut entries = Entries::new();
    let mut directories = Directories::new();

    for index in 0..zip.len() {
        let mut file = zip.by_index(index)?;
        let name = file.name().to_string();
        if crate::entry_path::normalize(&name).is_empty() {
            continue;
        }
        let entry_path = EntryPath::new(&name)?;

        if file.is_dir() {
            directories.insert(entry_path);
            continue;
        }

        let mut data = Vec::with_capacity(file.size().min(64 * 1024 * 1024) as usize);
        file.read_to_end(&mut data)
            .map_err(|e| Error::from(e).in_entry(&name))?;
        if entries.insert(entry_path, data).is_some() {
            log::warn!(
                "Container {} lists {} more than once, keeping the last copy",
                path.display(),
                name
            );
        }
    }

    Ok((entries, directories))
}

/// Writes `entries` and `directories` to a new container that replaces `path`.
///
/// The manifest directory and manifest resource are written first so that
/// stream readers find them before any other entry.
pub(super) fn store(path: &Path, entries: &Entries, directories: &Directories) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let temp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut zip = ZipWriter::new(BufWriter::new(temp.as_file()));
        let dir_options = SimpleFileOptions::default();

        for item in ordered(entries, directories) {
            match item {
                Item::Directory(dir) => {
                    zip.add_directory(format!("{}/", dir.as_str()), dir_options)?;
                }
                Item::File(name, data) => {
                    let options = SimpleFileOptions::default()
                        .compression_method(CompressionMethod::Deflated)
                        .large_file(data.len() as u64 >= u32::MAX as u64);
                    zip.start_file(name.as_str(), options)?;
                    zip.write_all(data)
                        .map_err(|e| Error::from(e).in_entry(name.as_str()))?;
                }
            }
        }

        let mut writer = zip.finish()?;
        writer.flush()?;
    }

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

enum Item<'a> {
    Directory(&'a EntryPath),
    File(&'a EntryPath, &'a [u8]),
}

impl Item<'_> {
    fn path(&self) -> &EntryPath {
        match self {
            Item::Directory(p) | Item::File(p, _) => p,
        }
    }
}

/// Directories and files in path order, with the manifest pair leading.
fn ordered<'a>(entries: &'a Entries, directories: &'a Directories) -> Vec<Item<'a>> {
    let mut items: Vec<Item<'a>> = directories
        .iter()
        .map(Item::Directory)
        .chain(entries.iter().map(|(p, d)| Item::File(p, d.as_slice())))
        .collect();

    items.sort_by(|a, b| {
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.path().cmp(b.path()))
    });
    items
}

fn rank(item: &Item<'_>) -> u8 {
    let path = item.path().as_str();
    match item {
        Item::Directory(_) if path.eq_ignore_ascii_case(META_INF.trim_end_matches('/')) => 0,
        Item::File(..) if path.eq_ignore_ascii_case(MANIFEST_PATH) => 1,
        _ => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> EntryPath {
        EntryPath::new(s).unwrap()
    }

    #[test]
    fn test_manifest_pair_leads() {
        let mut entries = Entries::new();
        entries.insert(path("a/A.class"), vec![1]);
        entries.insert(path("META-INF/MANIFEST.MF"), vec![2]);
        entries.insert(path("META-INF/services/x.Y"), vec![3]);
        let mut directories = Directories::new();
        directories.insert(path("META-INF"));
        directories.insert(path("a"));

        let items = ordered(&entries, &directories);
        let order: Vec<&str> = items
            .iter()
            .map(|i| i.path().as_str())
            .collect();
        assert_eq!(
            order,
            vec![
                "META-INF",
                "META-INF/MANIFEST.MF",
                "META-INF/services/x.Y",
                "a",
                "a/A.class"
            ]
        );
    }

    #[test]
    fn test_store_and_load_preserve_empty_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let jar = dir.path().join("x.jar");

        let mut entries = Entries::new();
        entries.insert(path("f.txt"), b"data".to_vec());
        let mut directories = Directories::new();
        directories.insert(path("empty"));

        store(&jar, &entries, &directories).unwrap();
        let (loaded, loaded_dirs) = load(&jar).unwrap();
        assert_eq!(loaded, entries);
        assert!(loaded_dirs.contains("empty"));
    }
}
