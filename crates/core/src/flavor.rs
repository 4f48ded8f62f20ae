//! Build flavors of a runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BundleError;

/// How a runtime is linked and packaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildFlavor {
    /// A static library linked into the plugin.
    Static,
    /// A shared library shipped next to the plugin.
    #[default]
    Shared,
    /// A framework bundle.
    Framework,
}

impl BuildFlavor {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildFlavor::Static => "static",
            BuildFlavor::Shared => "shared",
            BuildFlavor::Framework => "framework",
        }
    }
}

impl fmt::Display for BuildFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildFlavor {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(BuildFlavor::Static),
            "shared" => Ok(BuildFlavor::Shared),
            "framework" => Ok(BuildFlavor::Framework),
            other => Err(BundleError::invalid_setting(
                "flavor",
                format!("unknown flavor '{}' (expected static, shared or framework)", other),
            )),
        }
    }
}
