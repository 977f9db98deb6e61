//! Script bundle discovery
//!
//! A bundle is a directory under the scripts root containing an entry point
//! (`main.lua` by default). Other files in the directory are reachable from
//! the entry point through `import`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{LunaError, Result};

/// Entry point source of a bundle, read fresh from its source
#[derive(Debug, Clone)]
pub struct BundleEntry {
    pub name: String,
    pub folder: PathBuf,
    pub source: String,
}

/// Where bundles come from
pub trait BundleSource {
    /// Names of every available bundle, sorted
    fn list_bundles(&self) -> Result<Vec<String>>;

    /// Read the entry point of bundle `name`
    fn read_entry(&self, name: &str) -> Result<BundleEntry>;

    /// Where bundles are read from, for display
    fn location(&self) -> String;
}

/// Bundles laid out as `<root>/<name>/<entry_point>`
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryBundles {
    root: PathBuf,
    entry_point: String,
}

impl DirectoryBundles {
    pub fn new(root: impl Into<PathBuf>, entry_point: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            entry_point: entry_point.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn folder(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl BundleSource for DirectoryBundles {
    fn list_bundles(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(LunaError::Bundle(format!(
                "scripts directory '{}' does not exist",
                self.root.display()
            )));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.join(&self.entry_point).is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => log::warn!("Skipping bundle with non UTF-8 name {:?}", raw),
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_entry(&self, name: &str) -> Result<BundleEntry> {
        let folder = self.folder(name);
        let path = folder.join(&self.entry_point);
        if !path.is_file() {
            return Err(LunaError::Bundle(format!(
                "bundle '{}' has no {} in {}",
                name,
                self.entry_point,
                folder.display()
            )));
        }

        let source = fs::read_to_string(&path)?;
        Ok(BundleEntry {
            name: name.to_string(),
            folder,
            source,
        })
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
