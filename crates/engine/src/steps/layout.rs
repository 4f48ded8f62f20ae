//! On-disk layout of a build directory.

use std::path::{Path, PathBuf};

use pybundle_core::{Product, Settings};

/// Default build directory, relative to the working directory.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// Where archives, sources and installed products live.
///
/// ```text
/// build/
///   downloads/   source archives
///   src/         extracted sources, one directory per product-version
///   lib/         install prefixes, one directory per product
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    pub root: PathBuf,
    pub downloads: PathBuf,
    pub src: PathBuf,
    pub lib: PathBuf,
}

impl BuildLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            downloads: root.join("downloads"),
            src: root.join("src"),
            lib: root.join("lib"),
            root,
        }
    }

    /// Layout rooted at the `build_dir` setting, resolved against `work_dir`.
    pub fn from_settings(settings: &Settings, work_dir: &Path) -> Self {
        let build_dir = settings.get_str("build_dir").unwrap_or(DEFAULT_BUILD_DIR);
        Self::new(work_dir.join(build_dir))
    }

    /// Install prefix of a product: `lib/<lower-cased name>`.
    pub fn prefix(&self, product: &Product) -> PathBuf {
        self.lib.join(product.name().to_lowercase())
    }

    /// Extracted source tree: `src/<name>-<version>`.
    pub fn source_dir(&self, product: &Product) -> PathBuf {
        self.src.join(product.name_version())
    }

    /// Download target for an archive. Uses the last URL segment when there is one.
    pub fn archive_path(&self, product: &Product, url: Option<&str>) -> PathBuf {
        let file_name = url
            .map(|u| u.split(['?', '#']).next().unwrap_or(u))
            .and_then(|u| u.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| product.archive_name());
        self.downloads.join(file_name)
    }
}
