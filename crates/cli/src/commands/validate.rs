//! Validate command implementation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use console::style;
use pybundle_core::{BundleError, Result};
use pybundle_engine::{Recipe, StepsRegistry};
use pybundle_parser::ParseError;

use crate::discovery::{self, RECIPEFILE_NAME};
use crate::output;

/// Checks the syntax of the Recipefile and the graph of every recipe in it.
pub fn execute(file: Option<&Path>) -> Result<()> {
    let path = locate(file)?;
    output::info(&format!("Validating {}...", path.display()));

    let src = fs::read_to_string(&path).map_err(|source| BundleError::FileRead {
        path: path.clone(),
        source,
    })?;

    let recipefile = pybundle_parser::parse_recipefile(&src, &path).inspect_err(|e| {
        eprintln!("{:?}", miette::Report::new(ParseError::from_error(e, &src)));
    })?;

    let missing_default = recipefile
        .default_recipe
        .as_deref()
        .filter(|name| recipefile.get_recipe(name).is_none());
    if let Some(default) = missing_default {
        return Err(BundleError::RecipeNotFound(format!(
            "{} (declared as default)",
            default
        )));
    }

    let registry = StepsRegistry::with_defaults();
    let work_dir = discovery::working_dir(&path);
    let mut first_error = None;
    for spec in &recipefile.recipes {
        match Recipe::from_spec(spec, &Default::default(), &registry, &work_dir) {
            Ok(_) => println!("  {} {}", style("✓").green(), spec.name),
            Err(e) => {
                println!("  {} {} - {}", style("✗").red(), style(&spec.name).red(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }

    output::success(&format!(
        "Recipefile is valid ({} recipes, {} builders)",
        recipefile.recipes.len(),
        recipefile
            .recipes
            .iter()
            .map(|r| r.builder_count())
            .sum::<usize>()
    ));

    Ok(())
}

/// `file`, or the Recipefile found above the current directory.
fn locate(file: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = file {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    discovery::find_recipefile_from(&cwd).ok_or_else(|| BundleError::FileRead {
        path: cwd.join(RECIPEFILE_NAME),
        source: io::Error::new(
            io::ErrorKind::NotFound,
            "no Recipefile in this directory or any parent",
        ),
    })
}
