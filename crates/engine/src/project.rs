//! A project: builders sharing settings, run in dependency order.

use std::path::Path;

use pybundle_core::{BuildState, BundleError, ProjectSpec, Result, Settings};
use tracing::{info, warn};

use crate::builder::Builder;
use crate::dag::BuildGraph;
use crate::executor::BuildEvent;
use crate::runner::Shell;
use crate::steps::StepsRegistry;

/// An ordered group of builders and their execution order.
#[derive(Debug)]
pub struct Project {
    name: String,
    settings: Settings,
    builders: Vec<Builder>,
    graph: BuildGraph,
    order: Vec<usize>,
}

impl Project {
    /// Expands a project declaration into wired builders.
    ///
    /// Fails on an unknown `depends_on` name or a dependency cycle, before
    /// anything runs.
    pub fn from_spec(
        spec: &ProjectSpec,
        recipe_settings: &Settings,
        registry: &StepsRegistry,
        work_dir: &Path,
    ) -> Result<Self> {
        let settings = Settings::merge(recipe_settings, &spec.settings);
        let mut graph = BuildGraph::new(spec.builders.iter().map(|b| b.name.as_str()));

        for (index, builder) in spec.builders.iter().enumerate() {
            for dependency in &builder.depends_on {
                let target = graph.index_of(dependency).ok_or_else(|| {
                    BundleError::BuilderNotFound(format!(
                        "{} (required by '{}' in project '{}')",
                        dependency, builder.name, spec.name
                    ))
                })?;
                graph.add_dependency(index, target);
            }
        }
        let order = graph.execution_order()?;

        let builders = spec
            .builders
            .iter()
            .enumerate()
            .map(|(index, builder)| {
                Builder::from_spec(
                    builder,
                    &settings,
                    graph.dependencies(index),
                    registry,
                    work_dir,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: spec.name.clone(),
            settings,
            builders,
            graph,
            order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Recipe settings merged with the project's own.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Builders in declaration order.
    pub fn builders(&self) -> &[Builder] {
        &self.builders
    }

    pub fn graph(&self) -> &BuildGraph {
        &self.graph
    }

    /// Builders in execution order.
    pub fn ordered(&self) -> impl Iterator<Item = &Builder> {
        self.order.iter().map(|&index| &self.builders[index])
    }

    /// Runs every builder in execution order.
    ///
    /// A builder only starts once each predecessor is installed and, outside
    /// dry-run, its product exists. After install the builder's own product
    /// must exist too.
    pub fn build(&mut self, shell: &Shell, emit: &mut dyn FnMut(BuildEvent)) -> Result<()> {
        info!("Building project {}", self.name);
        let checks_products = !shell.is_dry_run();

        for index in self.order.clone() {
            let mut dependencies = Vec::new();
            for &pred in self.builders[index].depends_on() {
                let pred = &self.builders[pred];
                if pred.state() != BuildState::Installed
                    || (checks_products && !pred.product().exists())
                {
                    return Err(BundleError::MissingProduct {
                        builder: pred.name().to_string(),
                        product: pred.product().name_version(),
                        path: pred.product().path().to_path_buf(),
                    });
                }
                dependencies.push(pred.as_dependency());
            }

            let builder = &mut self.builders[index];
            emit(BuildEvent::BuilderStarted {
                project: self.name.clone(),
                builder: builder.name().to_string(),
                product: builder.product().name_version(),
            });

            let result = builder.build(shell, &dependencies).and_then(|outcome| {
                if checks_products && !builder.product().exists() {
                    builder.fail();
                    return Err(BundleError::MissingProduct {
                        builder: builder.name().to_string(),
                        product: builder.product().name_version(),
                        path: builder.product().path().to_path_buf(),
                    });
                }
                Ok(outcome)
            });

            match result {
                Ok(outcome) => emit(BuildEvent::BuilderFinished {
                    project: self.name.clone(),
                    builder: builder.name().to_string(),
                    download_skipped: outcome.download_skipped,
                }),
                Err(e) => {
                    warn!("{}", e);
                    emit(BuildEvent::BuilderFailed {
                        project: self.name.clone(),
                        builder: builder.name().to_string(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pybundle_core::{BuilderSpec, Version};

    fn spec(builders: Vec<BuilderSpec>) -> ProjectSpec {
        builders
            .into_iter()
            .fold(ProjectSpec::new("libs"), ProjectSpec::with_builder)
    }

    fn autotools(name: &str, deps: &[&str]) -> BuilderSpec {
        BuilderSpec::new(name, Version::new(1, 0, 0))
            .with_kind("autotools")
            .with_depends_on(deps.iter().map(|d| d.to_string()).collect())
            .with_settings(Settings::new().with("artifact", format!("lib/lib{}.a", name)))
    }

    #[test]
    fn test_execution_order_follows_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::from_spec(
            &spec(vec![
                autotools("c", &["b"]),
                autotools("b", &["a"]),
                autotools("a", &[]),
            ]),
            &Settings::new(),
            &StepsRegistry::with_defaults(),
            dir.path(),
        )
        .unwrap();

        let names: Vec<&str> = project.ordered().map(Builder::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(project.builders()[0].depends_on(), &[1]);
    }

    #[test]
    fn test_unknown_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let err = Project::from_spec(
            &spec(vec![autotools("python", &["zlib"])]),
            &Settings::new(),
            &StepsRegistry::with_defaults(),
            dir.path(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), "BuilderNotFoundError");
        let message = err.to_string();
        assert!(message.contains("zlib"));
        assert!(message.contains("python"));
    }

    #[test]
    fn test_cycle_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Project::from_spec(
            &spec(vec![autotools("a", &["b"]), autotools("b", &["a"])]),
            &Settings::new(),
            &StepsRegistry::with_defaults(),
            dir.path(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "DependencyCycleError");
    }

    #[test]
    fn test_settings_cascade() {
        let dir = tempfile::tempdir().unwrap();
        let project_spec = spec(vec![autotools("a", &[])])
            .with_settings(Settings::new().with("jobs", 4i64).with("mode", "project"));
        let recipe_settings = Settings::new().with("mode", "recipe").with("color", true);

        let project = Project::from_spec(
            &project_spec,
            &recipe_settings,
            &StepsRegistry::with_defaults(),
            dir.path(),
        )
        .unwrap();

        let settings = project.builders()[0].settings();
        assert_eq!(settings.get_str("mode"), Some("project"));
        assert_eq!(settings.get_bool("color"), Some(true));
        assert_eq!(settings.get_str("artifact"), Some("lib/liba.a"));
        assert_eq!(recipe_settings.get_str("mode"), Some("recipe"));
    }

    #[test]
    fn test_dry_run_reaches_installed() {
        let dir = tempfile::tempdir().unwrap();
        let mut project = Project::from_spec(
            &spec(vec![autotools("b", &["a"]), autotools("a", &[])]),
            &Settings::new().with("url", "https://example.org/${name}-${version}.tar.gz"),
            &StepsRegistry::with_defaults(),
            dir.path(),
        )
        .unwrap();

        let shell = Shell::new().with_dry_run(true).with_transcript();
        let mut events = Vec::new();
        project
            .build(&shell, &mut |e: BuildEvent| events.push(e))
            .unwrap();

        assert!(
            project
                .builders()
                .iter()
                .all(|b| b.state() == BuildState::Installed)
        );
        let started: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                BuildEvent::BuilderStarted { builder, .. } => Some(builder.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["a", "b"]);
        assert!(shell.transcript().iter().any(|l| l.contains("curl")));
    }
}
