//! Build command implementation.

use std::path::Path;

use pybundle_core::{Result, Settings};
use pybundle_engine::{BuildEvent, Executor, Recipe, Shell, StepsRegistry};
use tracing::debug;

use crate::discovery::Catalog;
use crate::output::{self, BuildProgress};

/// Parses `--config key=value` arguments into recipe-level overrides.
pub fn parse_overrides(config: &[String]) -> Result<Settings> {
    let mut overrides = Settings::new();
    for assignment in config {
        let (key, value) = pybundle_parser::parse_override(assignment)?;
        debug!("override {} = {}", key, value);
        overrides.insert(key, value);
    }
    Ok(overrides)
}

/// Builds a recipe.
pub fn execute(
    file: Option<&Path>,
    recipe: Option<&str>,
    config: &[String],
    dry_run: bool,
) -> Result<()> {
    let catalog = Catalog::load(file)?;
    let spec = catalog.resolve(recipe)?;
    let overrides = parse_overrides(config)?;

    let mut recipe = Recipe::from_spec(
        spec,
        &overrides,
        &StepsRegistry::with_defaults(),
        catalog.working_dir(),
    )?;

    let mut shell = Shell::new().with_dry_run(dry_run);
    if dry_run {
        shell = shell.with_transcript();
        output::info("Dry run mode - no commands will be executed");
    }
    output::info(&format!("Building recipe: {}", recipe.name()));

    let mut progress = BuildProgress::default();
    let mut executor = Executor::new(&shell)
        .with_callback(Box::new(move |event: &BuildEvent| progress.on_event(event)));
    let outcome = executor.execute(&mut recipe);

    output::build_summary(executor.report());
    if dry_run {
        output::transcript(&shell.transcript());
    }

    outcome.map(|_| ())
}
