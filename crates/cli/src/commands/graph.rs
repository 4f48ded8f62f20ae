//! Graph command implementation.

use std::path::Path;

use clap::ValueEnum;
use pybundle_core::{BundleError, Result};
use pybundle_engine::{Project, Recipe, StepsRegistry};
use serde::Serialize;

use crate::discovery::Catalog;

/// Output format of `graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Ascii,
    Dot,
    Json,
}

#[derive(Debug, Serialize)]
struct RecipeGraph {
    recipe: String,
    projects: Vec<ProjectGraph>,
}

#[derive(Debug, Serialize)]
struct ProjectGraph {
    project: String,
    builders: Vec<BuilderNode>,
}

/// One builder, listed in execution order.
#[derive(Debug, Serialize)]
struct BuilderNode {
    name: String,
    product: String,
    depends_on: Vec<String>,
}

impl RecipeGraph {
    fn from_recipe(recipe: &Recipe) -> Self {
        Self {
            recipe: recipe.name().to_string(),
            projects: recipe.projects().iter().map(ProjectGraph::from_project).collect(),
        }
    }
}

impl ProjectGraph {
    fn from_project(project: &Project) -> Self {
        let builders = project.builders();
        Self {
            project: project.name().to_string(),
            builders: project
                .ordered()
                .map(|builder| BuilderNode {
                    name: builder.name().to_string(),
                    product: builder.product().name_version(),
                    depends_on: builder
                        .depends_on()
                        .iter()
                        .map(|&i| builders[i].name().to_string())
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Shows the build order of one recipe, or of every recipe.
pub fn execute(file: Option<&Path>, recipe: Option<&str>, format: GraphFormat) -> Result<()> {
    let catalog = Catalog::load(file)?;
    let specs = match recipe {
        Some(name) => vec![catalog.resolve(Some(name))?],
        None => catalog.recipes().into_iter().map(|(spec, _)| spec).collect(),
    };

    let registry = StepsRegistry::with_defaults();
    let graphs = specs
        .into_iter()
        .map(|spec| {
            Recipe::from_spec(spec, &Default::default(), &registry, catalog.working_dir())
                .map(|recipe| RecipeGraph::from_recipe(&recipe))
        })
        .collect::<Result<Vec<_>>>()?;

    let rendered = match format {
        GraphFormat::Ascii => render_ascii(&graphs),
        GraphFormat::Dot => render_dot(&graphs),
        GraphFormat::Json => serde_json::to_string_pretty(&graphs)
            .map_err(|e| BundleError::Io(std::io::Error::other(e)))?,
    };
    println!("{}", rendered);

    Ok(())
}

fn render_ascii(graphs: &[RecipeGraph]) -> String {
    let mut out = String::new();
    for graph in graphs {
        out.push_str(&format!("● {}\n", graph.recipe));
        for project in &graph.projects {
            out.push_str(&format!("  ▸ {}\n", project.project));
            let last = project.builders.len().saturating_sub(1);
            for (i, builder) in project.builders.iter().enumerate() {
                let branch = if i == last { "└─" } else { "├─" };
                out.push_str(&format!("    {} {}", branch, builder.product));
                if !builder.depends_on.is_empty() {
                    out.push_str(&format!(" <- {}", builder.depends_on.join(", ")));
                }
                out.push('\n');
            }
        }
    }
    out.trim_end().to_string()
}

/// Graphviz output; one cluster per project, edges point from dependency to dependent.
fn render_dot(graphs: &[RecipeGraph]) -> String {
    let mut out = String::from("digraph pybundle {\n  rankdir=LR;\n  node [shape=box];\n");
    for graph in graphs {
        for project in &graph.projects {
            let prefix = format!("{}/{}", graph.recipe, project.project);
            out.push_str(&format!(
                "\n  subgraph \"cluster_{}\" {{\n    label=\"{}\";\n",
                prefix, prefix
            ));
            for builder in &project.builders {
                out.push_str(&format!(
                    "    \"{}/{}\" [label=\"{}\"];\n",
                    prefix, builder.name, builder.product
                ));
            }
            out.push_str("  }\n");
            for builder in &project.builders {
                for dep in &builder.depends_on {
                    out.push_str(&format!(
                        "  \"{}/{}\" -> \"{}/{}\";\n",
                        prefix, dep, prefix, builder.name
                    ));
                }
            }
        }
    }
    out.push('}');
    out
}
