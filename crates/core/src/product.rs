//! Build products and their naming conventions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// A named, versioned artifact produced by a builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    name: String,
    version: Version,
    path: PathBuf,
    /// Further files the product is only complete with.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    companions: Vec<PathBuf>,
}

impl Product {
    /// Creates a new product expected at `path`.
    pub fn new(name: impl Into<String>, version: Version, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version,
            path: path.into(),
            companions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Filesystem location of the artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the same product expected at another location.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn companions(&self) -> &[PathBuf] {
        &self.companions
    }

    pub fn with_companions(mut self, companions: Vec<PathBuf>) -> Self {
        self.companions = companions;
        self
    }

    /// Returns true if the artifact and every companion are present. Never cached.
    pub fn exists(&self) -> bool {
        self.path.exists() && self.companions.iter().all(|p| p.exists())
    }

    /// `major.minor`: 3.9.1 -> 3.9
    pub fn ver(&self) -> String {
        self.version.ver()
    }

    /// `majorminor`: 3.9.1 -> 39
    pub fn ver_nodot(&self) -> String {
        self.version.ver_nodot()
    }

    /// Product-version: Python-3.9.1
    pub fn name_version(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Lower-cased product with major.minor: python3.9
    pub fn name_ver(&self) -> String {
        format!("{}{}", self.name.to_lowercase(), self.ver())
    }

    /// Archive name of the source release: Python-3.9.1.tgz
    pub fn archive_name(&self) -> String {
        format!("{}.tgz", self.name_version())
    }

    /// Dynamic library name: libpython3.9.dylib
    pub fn dylib_name(&self) -> String {
        format!("lib{}.dylib", self.name_ver())
    }

    /// Static library name: libpython3.9.a
    pub fn staticlib_name(&self) -> String {
        format!("lib{}.a", self.name_ver())
    }
}
