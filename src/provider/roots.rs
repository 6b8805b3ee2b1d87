//! Class-file source roots
//!
//! A root is a uniform read-only view over somewhere class bytes live: a
//! directory tree, an archive, an ordered stack of other roots, or an
//! in-memory map. Entry names use `/` separators and keep their `.class`
//! suffix. Fetching an absent entry is not an error; it returns `None`.

use crate::errors::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// A source of class-file bytes
pub trait ClassProviderRoot: Send + Sync {
    /// Fetch the bytes of one entry, `None` when the entry does not exist
    fn class_bytes(&self, entry: &str) -> Result<Option<Vec<u8>>>;

    /// Enumerate every class entry this root can serve
    fn entries(&self) -> Result<Vec<ClassEntry<'_>>>;

    /// Release any underlying handle. Reads after close are undefined but
    /// must not panic.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A reference to one enumerable class entry: its name plus a read thunk
pub struct ClassEntry<'r> {
    name: String,
    root: &'r dyn ClassProviderRoot,
}

impl<'r> ClassEntry<'r> {
    pub fn new(name: String, root: &'r dyn ClassProviderRoot) -> ClassEntry<'r> {
        ClassEntry { name, root }
    }

    /// Entry name, `/`-separated with the `.class` suffix intact
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read this entry's bytes
    pub fn read(&self) -> Result<Option<Vec<u8>>> {
        self.root.class_bytes(&self.name)
    }
}

/// Close a list of roots, accumulating every failure instead of stopping at
/// the first
pub fn close_all(roots: &[Box<dyn ClassProviderRoot>]) -> Result<()> {
    let mut failures = vec![];
    for root in roots {
        match root.close() {
            Ok(()) => {}
            Err(Error::Io(io)) => failures.push(io),
            Err(other) => failures.push(std::io::Error::new(
                std::io::ErrorKind::Other,
                other.to_string(),
            )),
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::CloseFailure(failures))
    }
}

/// A directory tree of class files
///
/// Entry names are paths relative to the directory root.
pub struct DirectoryRoot {
    base: PathBuf,
}

impl DirectoryRoot {
    pub fn new(base: impl Into<PathBuf>) -> DirectoryRoot {
        DirectoryRoot { base: base.into() }
    }

    fn entry_path(&self, entry: &str) -> PathBuf {
        let mut path = self.base.clone();
        for segment in entry.split('/') {
            path.push(segment);
        }
        path
    }
}

impl ClassProviderRoot for DirectoryRoot {
    fn class_bytes(&self, entry: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.entry_path(entry)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn entries(&self) -> Result<Vec<ClassEntry<'_>>> {
        let mut entries = vec![];
        for dirent in WalkDir::new(&self.base) {
            let dirent = dirent.map_err(|err| {
                Error::Io(err.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walkdir loop")
                }))
            })?;
            if !dirent.file_type().is_file() {
                continue;
            }
            if dirent.path().extension().map_or(true, |ext| ext != "class") {
                continue;
            }
            let relative = dirent
                .path()
                .strip_prefix(&self.base)
                .expect("walked path is under the base");
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(ClassEntry::new(name, self));
        }
        Ok(entries)
    }
}

/// A zip-format archive of class files (a jar, or a jmod with the
/// `classes/` prefix)
pub struct ArchiveRoot {
    path: PathBuf,
    archive: Mutex<Option<ZipArchive<File>>>,
    prefix: Option<String>,
}

impl ArchiveRoot {
    pub fn open(path: impl Into<PathBuf>) -> Result<ArchiveRoot> {
        Self::open_with_prefix(path, None)
    }

    /// Open an archive whose class entries all live under `prefix`
    /// (`classes/` for jmod files). The prefix is stripped from entry names.
    pub fn open_with_prefix(
        path: impl Into<PathBuf>,
        prefix: Option<String>,
    ) -> Result<ArchiveRoot> {
        let path = path.into();
        let archive = ZipArchive::new(File::open(&path)?)?;
        Ok(ArchiveRoot {
            path,
            archive: Mutex::new(Some(archive)),
            prefix,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn full_name(&self, entry: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, entry),
            None => entry.to_string(),
        }
    }
}

impl ClassProviderRoot for ArchiveRoot {
    fn class_bytes(&self, entry: &str) -> Result<Option<Vec<u8>>> {
        let mut guard = self.archive.lock();
        let archive = guard.as_mut().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("archive {} is closed", self.path.display()),
            ))
        })?;
        let mut file = match archive.by_name(&self.full_name(entry)) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }

    fn entries(&self) -> Result<Vec<ClassEntry<'_>>> {
        let guard = self.archive.lock();
        let archive = match guard.as_ref() {
            Some(archive) => archive,
            None => return Ok(vec![]),
        };
        let mut entries = vec![];
        for name in archive.file_names() {
            if !name.ends_with(".class") {
                continue;
            }
            let name = match &self.prefix {
                Some(prefix) => match name.strip_prefix(prefix.as_str()) {
                    Some(stripped) => stripped,
                    None => continue,
                },
                None => name,
            };
            entries.push(name.to_string());
        }
        drop(guard);
        Ok(entries
            .into_iter()
            .map(|name| ClassEntry::new(name, self as &dyn ClassProviderRoot))
            .collect())
    }

    fn close(&self) -> Result<()> {
        // Dropping the archive closes the backing file handle
        self.archive.lock().take();
        Ok(())
    }
}

/// An ordered concatenation of other roots
///
/// Fetches try each root in order; enumeration concatenates; closing closes
/// every member and accumulates the failures.
pub struct StackedRoot {
    roots: Vec<Box<dyn ClassProviderRoot>>,
}

impl StackedRoot {
    pub fn new(roots: Vec<Box<dyn ClassProviderRoot>>) -> StackedRoot {
        StackedRoot { roots }
    }

    pub fn push(&mut self, root: Box<dyn ClassProviderRoot>) {
        self.roots.push(root);
    }
}

impl ClassProviderRoot for StackedRoot {
    fn class_bytes(&self, entry: &str) -> Result<Option<Vec<u8>>> {
        for root in &self.roots {
            if let Some(bytes) = root.class_bytes(entry)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }

    fn entries(&self) -> Result<Vec<ClassEntry<'_>>> {
        let mut entries = vec![];
        for root in &self.roots {
            entries.extend(root.entries()?);
        }
        Ok(entries)
    }

    fn close(&self) -> Result<()> {
        close_all(&self.roots)
    }
}

/// An in-memory name → bytes map
///
/// Used by embedders that already hold class bytes, and by tests.
#[derive(Default)]
pub struct MemoryRoot {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryRoot {
    pub fn new() -> MemoryRoot {
        MemoryRoot::default()
    }

    /// Insert an entry. Names without a `.class` suffix gain one.
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let mut name = name.into();
        if !name.ends_with(".class") {
            name.push_str(".class");
        }
        self.entries.insert(name, bytes);
    }
}

impl ClassProviderRoot for MemoryRoot {
    fn class_bytes(&self, entry: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(entry).cloned())
    }

    fn entries(&self) -> Result<Vec<ClassEntry<'_>>> {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| ClassEntry::new(name.clone(), self as &dyn ClassProviderRoot))
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn directory_root_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("com").join("example");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Foo.class"), b"fake bytes").unwrap();
        std::fs::write(nested.join("notes.txt"), b"skip me").unwrap();

        let root = DirectoryRoot::new(dir.path());
        let entries = root.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "com/example/Foo.class");
        assert_eq!(entries[0].read().unwrap().unwrap(), b"fake bytes");
        assert_eq!(
            root.class_bytes("com/example/Foo.class").unwrap().unwrap(),
            b"fake bytes"
        );
        assert!(root.class_bytes("com/example/Bar.class").unwrap().is_none());
    }

    #[test]
    fn archive_root_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("test.jar");
        let file = File::create(&jar).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("com/example/Foo.class", options).unwrap();
        writer.write_all(b"fake bytes").unwrap();
        writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
        writer.write_all(b"Manifest-Version: 1.0\n").unwrap();
        writer.finish().unwrap();

        let root = ArchiveRoot::open(&jar).unwrap();
        let entries = root.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "com/example/Foo.class");
        assert_eq!(
            root.class_bytes("com/example/Foo.class").unwrap().unwrap(),
            b"fake bytes"
        );
        assert!(root.class_bytes("missing/Entry.class").unwrap().is_none());

        root.close().unwrap();
        assert!(root.class_bytes("com/example/Foo.class").is_err());
    }

    #[test]
    fn stacked_root_fetches_in_order() {
        let mut first = MemoryRoot::new();
        first.insert("a/A", b"from first".to_vec());
        let mut second = MemoryRoot::new();
        second.insert("a/A", b"from second".to_vec());
        second.insert("b/B", b"only second".to_vec());

        let stacked = StackedRoot::new(vec![Box::new(first), Box::new(second)]);
        assert_eq!(
            stacked.class_bytes("a/A.class").unwrap().unwrap(),
            b"from first"
        );
        assert_eq!(
            stacked.class_bytes("b/B.class").unwrap().unwrap(),
            b"only second"
        );
        assert_eq!(stacked.entries().unwrap().len(), 3);
    }
}
