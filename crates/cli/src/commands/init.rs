//! Init command implementation.

use std::fs;
use std::path::Path;

use pybundle_core::{BundleError, Result};

use crate::discovery::RECIPEFILE_NAME;
use crate::output;

const TEMPLATE: &str = r#"# pybundle Recipefile
#
# Settings cascade recipe -> project -> builder; `pybundle build --config key=value`
# overrides recipe settings.

recipe "shared-python" {
  description = "Shared Python with its base libraries"

  settings {
    mac_dep_target = "10.13"
  }

  project "python" {
    builder "bzip2" { version = "1.0.8" }
    builder "openssl" { version = "1.1.1g" }
    builder "xz" { version = "5.2.5" }

    builder "python" {
      product = "Python"
      version = "3.9.2"
      flavor = "shared"
      depends_on = ["bzip2", "openssl", "xz"]

      settings {
        remove_packages = ["idlelib", "tkinter", "turtledemo"]
      }
    }
  }
}

default = "shared-python"
"#;

/// Writes a starter Recipefile into the current directory.
pub fn execute(force: bool) -> Result<()> {
    let path = Path::new(RECIPEFILE_NAME);

    if path.exists() && !force {
        return Err(BundleError::invalid_setting(
            "force",
            format!("{} already exists, use --force to overwrite", RECIPEFILE_NAME),
        ));
    }

    fs::write(path, TEMPLATE)?;

    output::success(&format!("Created {}", RECIPEFILE_NAME));
    output::info("Run 'pybundle list --detailed' to see its recipes");

    Ok(())
}
