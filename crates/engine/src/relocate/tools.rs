//! Access to the platform's linkage inspection and editing tools.

use std::path::Path;

use pybundle_core::{BundleError, Result};

use crate::runner::{Invocation, Shell};
use crate::steps::path_str;

/// Reads and edits the load commands of a binary.
pub trait LinkTools {
    /// Raw `otool -L` style listing of the binary's install name and references.
    fn list_linkage(&self, binary: &Path) -> Result<String>;

    /// Changes the binary's own install name.
    fn set_id(&self, binary: &Path, new_id: &str) -> Result<()>;

    /// Redirects one load reference of the binary.
    fn change_reference(&self, binary: &Path, old: &str, new: &str) -> Result<()>;
}

/// `otool` and `install_name_tool`, run through a [`Shell`].
#[derive(Debug, Clone)]
pub struct MachOTools {
    shell: Shell,
    otool: String,
    install_name_tool: String,
}

impl MachOTools {
    /// Uses the tools found on `PATH`, falling back to their bare names.
    pub fn new(shell: Shell) -> Self {
        let resolve = |name: &str| {
            Shell::locate(name)
                .map(|path| path_str(&path))
                .unwrap_or_else(|| name.to_string())
        };
        Self {
            otool: resolve("otool"),
            install_name_tool: resolve("install_name_tool"),
            shell,
        }
    }

    /// Fails early when either tool is missing.
    pub fn check_available(&self) -> Result<()> {
        for tool in [&self.otool, &self.install_name_tool] {
            if Shell::locate(tool).is_none() {
                return Err(BundleError::ShellCommand {
                    command: tool.clone(),
                    exit_code: None,
                    stderr: format!("{} not found on PATH", tool),
                });
            }
        }
        Ok(())
    }
}

impl LinkTools for MachOTools {
    fn list_linkage(&self, binary: &Path) -> Result<String> {
        let output = self
            .shell
            .inspect(&self.otool, &["-L".to_string(), path_str(binary)])?;
        Ok(output.stdout)
    }

    fn set_id(&self, binary: &Path, new_id: &str) -> Result<()> {
        self.shell.run_invocation(
            &Invocation::new(&self.install_name_tool)
                .args(["-id", new_id])
                .arg(path_str(binary)),
        )?;
        Ok(())
    }

    fn change_reference(&self, binary: &Path, old: &str, new: &str) -> Result<()> {
        self.shell.run_invocation(
            &Invocation::new(&self.install_name_tool)
                .args(["-change", old, new])
                .arg(path_str(binary)),
        )?;
        Ok(())
    }
}
