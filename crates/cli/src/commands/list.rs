//! List command implementation.

use std::path::Path;

use console::style;
use pybundle_core::{BuilderSpec, Result};

use crate::discovery::{Catalog, Origin};

/// Lists the built-in recipes and those of the Recipefile.
pub fn execute(file: Option<&Path>, detailed: bool) -> Result<()> {
    let catalog = Catalog::load(file)?;

    println!("{}", style("Available recipes:").bold());
    println!();

    for (recipe, origin) in catalog.recipes() {
        print!("  {}", style(&recipe.name).cyan().bold());
        if catalog.is_default(&recipe.name) {
            print!(" {}", style("(default)").yellow());
        }
        if origin == Origin::Builtin {
            print!(" {}", style("(built-in)").dim());
        }
        if let Some(desc) = recipe.description.as_ref().filter(|_| !detailed) {
            print!(" - {}", style(desc).dim());
        }
        println!();

        if !detailed {
            continue;
        }

        if let Some(desc) = &recipe.description {
            println!("    {}", style(desc).dim());
        }
        for project in &recipe.projects {
            println!("    project {}", style(&project.name).bold());
            for builder in &project.builders {
                println!("      {}", describe(builder));
            }
        }
        println!();
    }

    Ok(())
}

/// `name version [flavor] <- deps`
fn describe(builder: &BuilderSpec) -> String {
    let mut line = format!("{} {}", builder.name, builder.version);
    if builder.kind != builder.name {
        line.push_str(&format!(" ({})", builder.kind));
    }
    if let Some(flavor) = builder.flavor {
        line.push_str(&format!(" [{}]", flavor));
    }
    if !builder.depends_on.is_empty() {
        line.push_str(&format!(
            " {} {}",
            style("<-").dim(),
            builder.depends_on.join(", ")
        ));
    }
    line
}
