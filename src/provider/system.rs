//! The platform class-library root
//!
//! Locates the archive(s) backing the running platform's standard class
//! library: `$JAVA_HOME/lib/rt.jar` on legacy layouts, the `jmods/*.jmod`
//! archives (class entries under `classes/`) on modular JDKs. The jimage
//! `lib/modules` store is not an archive and is not supported.

use super::roots::{ArchiveRoot, ClassEntry, ClassProviderRoot, StackedRoot};
use crate::errors::{Error, Result};
use std::path::{Path, PathBuf};

/// A root over the running platform's standard class library
pub struct SystemRoot {
    inner: StackedRoot,
}

impl SystemRoot {
    /// Locate the class library under `$JAVA_HOME`
    pub fn locate() -> Result<SystemRoot> {
        let java_home = std::env::var_os("JAVA_HOME").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "JAVA_HOME is not set; cannot locate the platform class library",
            ))
        })?;
        Self::open(Path::new(&java_home))
    }

    /// Open the class library of the JDK or JRE installed at `java_home`
    pub fn open(java_home: &Path) -> Result<SystemRoot> {
        let mut archives: Vec<Box<dyn ClassProviderRoot>> = vec![];

        let rt_jar = java_home.join("lib").join("rt.jar");
        if rt_jar.is_file() {
            archives.push(Box::new(ArchiveRoot::open(rt_jar)?));
        } else {
            let jmods = java_home.join("jmods");
            if jmods.is_dir() {
                let mut paths: Vec<PathBuf> = std::fs::read_dir(&jmods)?
                    .filter_map(|dirent| dirent.ok())
                    .map(|dirent| dirent.path())
                    .filter(|path| path.extension().map_or(false, |ext| ext == "jmod"))
                    .collect();
                paths.sort();
                for path in paths {
                    archives.push(Box::new(ArchiveRoot::open_with_prefix(
                        path,
                        Some("classes/".to_string()),
                    )?));
                }
            }
        }

        if archives.is_empty() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!(
                    "no class-library archive under {} (looked for lib/rt.jar and jmods/)",
                    java_home.display()
                ),
            )));
        }
        log::debug!(
            "platform class library resolved to {} archive(s)",
            archives.len()
        );
        Ok(SystemRoot {
            inner: StackedRoot::new(archives),
        })
    }
}

impl ClassProviderRoot for SystemRoot {
    fn class_bytes(&self, entry: &str) -> Result<Option<Vec<u8>>> {
        self.inner.class_bytes(entry)
    }

    fn entries(&self) -> Result<Vec<ClassEntry<'_>>> {
        self.inner.entries()
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }
}
