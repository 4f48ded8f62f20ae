//! Pybundle Parser - Recipefile DSL parser using nom combinators.
//!
//! ```text
//! recipe "static-python" {
//!     settings { mac_dep_target = "10.13" }
//!     project "python" {
//!         builder "xz" { version = "5.2.5" }
//!         builder "python" {
//!             version = "3.9.2"
//!             flavor = "static"
//!             depends_on = ["xz"]
//!         }
//!     }
//! }
//! default = "static-python"
//! ```

mod ast;
mod combinators;
mod error;
mod lexer;
mod parser;

pub use error::ParseError;
pub use parser::{parse_override, parse_recipefile};

use std::path::Path;

use pybundle_core::{BundleError, Recipefile, Result};

/// Parses a Recipefile from the given path.
pub fn parse_file(path: &Path) -> Result<Recipefile> {
    let content = std::fs::read_to_string(path).map_err(|e| BundleError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_recipefile(&content, path)
}

/// Parses a Recipefile from a string.
pub fn parse_str(content: &str) -> Result<Recipefile> {
    parse_recipefile(content, Path::new("<string>"))
}
