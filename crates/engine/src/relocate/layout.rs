//! Locating binaries and the library directory inside a bundle.

use std::fs;
use std::path::{Path, PathBuf};

use pybundle_core::{BundleError, Result};

/// Binaries to relocate and where their libraries go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLayout {
    pub roots: Vec<PathBuf>,
    pub lib_dir: PathBuf,
}

impl BundleLayout {
    /// Inspects `path`.
    ///
    /// A directory bundle (`Foo.app`, `foo.mxo`, ...) must contain
    /// `Contents/`; its roots are the files in `Contents/MacOS` and its
    /// libraries go to `Contents/Frameworks`. A single binary is its own root
    /// with libraries in a sibling `Frameworks` directory.
    pub fn discover(path: &Path, lib_dir: Option<&Path>) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|source| BundleError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let (roots, default_lib_dir) = if metadata.is_dir() {
            let contents = path.join("Contents");
            if !contents.is_dir() {
                return Err(BundleError::invalid_setting(
                    "bundle",
                    format!("{} has no Contents directory", path.display()),
                ));
            }
            (
                executables_in(&contents.join("MacOS"))?,
                contents.join("Frameworks"),
            )
        } else {
            let parent = path.parent().unwrap_or_else(|| Path::new("."));
            (vec![path.to_path_buf()], parent.join("Frameworks"))
        };

        Ok(Self {
            roots,
            lib_dir: lib_dir.map(Path::to_path_buf).unwrap_or(default_lib_dir),
        })
    }
}

/// Regular files directly inside `dir`, sorted. A missing directory has none.
fn executables_in(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
