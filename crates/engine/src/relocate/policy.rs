//! Which libraries get bundled and which are assumed present on the target.

use std::path::{Path, PathBuf};

/// Where a bare library name (no directory) is looked up.
pub const FALLBACK_LIBRARY_DIR: &str = "/usr/local/lib";

/// Install trees whose libraries are not part of the base system.
pub const DEFAULT_VENDOR_PREFIXES: &[&str] = &[
    "/usr/local/",
    "/opt/local/",
    "/opt/homebrew/",
    "/Users/",
    "/home/",
];

/// What to do with one load reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Copy `source` into the bundle and rewrite the reference.
    Vendored { source: PathBuf },

    /// Leave the reference untouched.
    System,
}

#[derive(Debug, Clone)]
pub struct RelocationPolicy {
    vendor_prefixes: Vec<PathBuf>,
    fallback_dir: PathBuf,
}

impl Default for RelocationPolicy {
    fn default() -> Self {
        let mut vendor_prefixes: Vec<PathBuf> =
            DEFAULT_VENDOR_PREFIXES.iter().map(PathBuf::from).collect();
        let home = dirs::home_dir()
            .filter(|home| home.parent().is_some())
            .filter(|home| !vendor_prefixes.iter().any(|p| home.starts_with(p)));
        if let Some(home) = home {
            vendor_prefixes.push(home);
        }
        Self {
            vendor_prefixes,
            fallback_dir: PathBuf::from(FALLBACK_LIBRARY_DIR),
        }
    }
}

impl RelocationPolicy {
    /// A policy with no vendor prefixes and the given fallback directory.
    pub fn new(fallback_dir: impl Into<PathBuf>) -> Self {
        Self {
            vendor_prefixes: Vec::new(),
            fallback_dir: fallback_dir.into(),
        }
    }

    /// Adds a vendor prefix.
    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.vendor_prefixes.push(prefix.into());
        self
    }

    pub fn vendor_prefixes(&self) -> &[PathBuf] {
        &self.vendor_prefixes
    }

    /// Classifies a load reference as it appears in `otool -L` output.
    ///
    /// `@rpath/`, `@loader_path/` and `@executable_path/` references are
    /// always `System`: they are already relative.
    pub fn classify(&self, reference: &str) -> Disposition {
        let path = Path::new(reference);
        let directory = path.parent().filter(|dir| !dir.as_os_str().is_empty());

        match directory {
            None => match path.file_name() {
                Some(name) => Disposition::Vendored {
                    source: self.fallback_dir.join(name),
                },
                None => Disposition::System,
            },
            Some(dir) if self.vendor_prefixes.iter().any(|p| dir.starts_with(p)) => {
                Disposition::Vendored {
                    source: path.to_path_buf(),
                }
            }
            Some(_) => Disposition::System,
        }
    }

    pub fn is_vendored(&self, reference: &str) -> bool {
        matches!(self.classify(reference), Disposition::Vendored { .. })
    }
}
