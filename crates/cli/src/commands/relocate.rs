//! Relocate command implementation.

use std::path::{Path, PathBuf};

use pybundle_core::{BundleError, Result};
use pybundle_engine::{BundleLayout, MachOTools, Relocator, Shell};

use crate::output;

/// Makes `bundle` self-contained.
pub fn execute(
    bundle: &Path,
    extra_libs: &[PathBuf],
    lib_dir: Option<&Path>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let layout = BundleLayout::discover(bundle, lib_dir)?;

    let mut shell = Shell::new().with_dry_run(dry_run);
    if dry_run {
        shell = shell.with_transcript();
    }

    let tools = MachOTools::new(shell.clone());
    if !layout.roots.is_empty() || !extra_libs.is_empty() {
        tools.check_available()?;
    }

    if !json {
        if dry_run {
            output::info("Dry run mode - no files will be changed");
        }
        output::info(&format!("Relocating {}", bundle.display()));
        output::key_value("library dir", &layout.lib_dir.display().to_string());
    }

    let report = Relocator::new(tools, shell.clone()).process(
        &layout.roots,
        extra_libs,
        &layout.lib_dir,
    )?;

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| BundleError::Io(std::io::Error::other(e)))?;
        println!("{}", rendered);
    } else {
        output::relocation_summary(&report);
        if dry_run {
            output::transcript(&shell.transcript());
        }
    }

    Ok(())
}
