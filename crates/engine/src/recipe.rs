//! A recipe: the unit a user builds by name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pybundle_core::{BundleError, RecipeSpec, Result, Settings};

use crate::executor::{BuildReport, Executor};
use crate::project::Project;
use crate::runner::Shell;
use crate::steps::StepsRegistry;

/// Projects built in declared order.
#[derive(Debug)]
pub struct Recipe {
    name: String,
    description: Option<String>,
    settings: Settings,
    projects: Vec<Project>,
}

impl Recipe {
    /// Expands a recipe declaration.
    ///
    /// `overrides` sit on top of the recipe's own settings, so project and
    /// builder settings still win over them. All validation happens here:
    /// unknown kinds, unknown dependencies, cycles and shared product paths.
    pub fn from_spec(
        spec: &RecipeSpec,
        overrides: &Settings,
        registry: &StepsRegistry,
        work_dir: &Path,
    ) -> Result<Self> {
        let settings = Settings::merge(&spec.settings, overrides);
        let projects = spec
            .projects
            .iter()
            .map(|project| Project::from_spec(project, &settings, registry, work_dir))
            .collect::<Result<Vec<_>>>()?;

        let recipe = Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            settings,
            projects,
        };
        recipe.check_unique_products()?;
        Ok(recipe)
    }

    fn check_unique_products(&self) -> Result<()> {
        let mut owners: HashMap<PathBuf, String> = HashMap::new();
        for project in &self.projects {
            for builder in project.builders() {
                let owner = format!("{}/{}", project.name(), builder.name());
                let path = builder.product().path().to_path_buf();
                if let Some(first) = owners.get(&path) {
                    return Err(BundleError::DuplicateProduct {
                        first: first.clone(),
                        second: owner,
                        path,
                    });
                }
                owners.insert(path, owner);
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Recipe settings, overrides applied.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub(crate) fn projects_mut(&mut self) -> &mut [Project] {
        &mut self.projects
    }

    /// `(project, builder)` pairs in the order they will run.
    pub fn plan(&self) -> Vec<(String, String)> {
        self.projects
            .iter()
            .flat_map(|project| {
                project
                    .ordered()
                    .map(move |builder| (project.name().to_string(), builder.name().to_string()))
            })
            .collect()
    }

    /// Builds every project, stopping at the first failure.
    pub fn build(&mut self, shell: &Shell) -> Result<BuildReport> {
        Executor::new(shell).execute(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::steps::{BuildLayout, BuildSteps, StepContext};
    use pybundle_core::{BuildState, BuilderSpec, Product, ProjectSpec, Step, Version};
    use std::cell::RefCell;
    use std::rc::Rc;

    type CallLog = Rc<RefCell<Vec<(String, Step)>>>;

    /// Counts hook calls, installs a stub product and optionally fails.
    struct Counting {
        log: CallLog,
        fail_builder: Option<String>,
    }

    impl Counting {
        fn record(&self, ctx: &StepContext, step: Step) -> Result<()> {
            self.log
                .borrow_mut()
                .push((ctx.builder.to_string(), step));
            if self.fail_builder.as_deref() == Some(ctx.builder) {
                return Err(BundleError::ShellCommand {
                    command: "make".into(),
                    exit_code: Some(1),
                    stderr: String::new(),
                });
            }
            Ok(())
        }
    }

    impl BuildSteps for Counting {
        fn kind(&self) -> &str {
            "counting"
        }

        fn product_path(&self, layout: &BuildLayout, product: &Product, _: &Settings) -> Result<PathBuf> {
            Ok(layout.prefix(product).join("lib").join(product.staticlib_name()))
        }

        fn download(&self, ctx: &StepContext) -> Result<()> {
            self.record(ctx, Step::Download)
        }

        fn pre_build(&self, ctx: &StepContext) -> Result<()> {
            self.record(ctx, Step::PreBuild)
        }

        fn build(&self, ctx: &StepContext) -> Result<()> {
            self.record(ctx, Step::Build)
        }

        fn install(&self, ctx: &StepContext) -> Result<()> {
            self.record(ctx, Step::Install)?;
            let path = ctx.product.path();
            ctx.shell.create_dir_all(path.parent().unwrap_or(path))?;
            std::fs::write(path, ctx.settings.to_string())?;
            Ok(())
        }
    }

    fn registry(log: &CallLog, fail_builder: Option<&str>) -> StepsRegistry {
        let log = log.clone();
        let fail_builder = fail_builder.map(str::to_string);
        let mut registry = StepsRegistry::new();
        registry.register("counting", move || {
            Box::new(Counting {
                log: log.clone(),
                fail_builder: fail_builder.clone(),
            })
        });
        registry
    }

    fn counting(name: &str, deps: &[&str]) -> BuilderSpec {
        BuilderSpec::new(name, Version::new(1, 0, 0))
            .with_kind("counting")
            .with_depends_on(deps.iter().map(|d| d.to_string()).collect())
    }

    fn chain() -> RecipeSpec {
        RecipeSpec::new("chain").with_project(
            ProjectSpec::new("libs")
                .with_builder(counting("c", &["b"]))
                .with_builder(counting("a", &[]))
                .with_builder(counting("b", &["a"])),
        )
    }

    fn builders_run(log: &CallLog) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in log.borrow().iter() {
            if names.last() != Some(name) {
                names.push(name.clone());
            }
        }
        names
    }

    #[test]
    fn test_chain_builds_in_dependency_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let mut recipe =
            Recipe::from_spec(&chain(), &Settings::new(), &registry(&log, None), dir.path())
                .unwrap();

        assert_eq!(
            recipe.plan(),
            vec![
                ("libs".to_string(), "a".to_string()),
                ("libs".to_string(), "b".to_string()),
                ("libs".to_string(), "c".to_string()),
            ]
        );

        let report = recipe.build(&Shell::new()).unwrap();
        assert_eq!(builders_run(&log), vec!["a", "b", "c"]);
        assert_eq!(report.executed, vec!["libs/a", "libs/b", "libs/c"]);
        assert!(report.is_success());
    }

    #[test]
    fn test_cycle_fails_before_any_step() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let spec = RecipeSpec::new("cycle").with_project(
            ProjectSpec::new("libs")
                .with_builder(counting("a", &["c"]))
                .with_builder(counting("b", &["a"]))
                .with_builder(counting("c", &["b"])),
        );

        let err = Recipe::from_spec(&spec, &Settings::new(), &registry(&log, None), dir.path())
            .unwrap_err();

        assert_eq!(err.kind(), "DependencyCycleError");
        for name in ["a", "b", "c"] {
            assert!(err.to_string().contains(name));
        }
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_failure_stops_dependents() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let mut recipe = Recipe::from_spec(
            &chain(),
            &Settings::new(),
            &registry(&log, Some("a")),
            dir.path(),
        )
        .unwrap();

        let shell = Shell::new();
        let mut executor = Executor::new(&shell);
        let err = executor.execute(&mut recipe).unwrap_err();

        assert_eq!(err.kind(), "BuildStepError");
        assert_eq!(builders_run(&log), vec!["a"]);
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(executor.report().failed.len(), 1);
        assert_eq!(executor.report().failed[0].0, "libs/a");

        let states: Vec<BuildState> = recipe.projects()[0]
            .builders()
            .iter()
            .map(Builder::state)
            .collect();
        assert_eq!(
            states,
            vec![BuildState::Pending, BuildState::Failed, BuildState::Pending]
        );
    }

    #[test]
    fn test_rebuild_skips_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let registry = registry(&log, None);

        let mut first = Recipe::from_spec(&chain(), &Settings::new(), &registry, dir.path()).unwrap();
        first.build(&Shell::new()).unwrap();

        let mut second = Recipe::from_spec(&chain(), &Settings::new(), &registry, dir.path()).unwrap();
        let report = second.build(&Shell::new()).unwrap();

        assert_eq!(report.skipped_downloads.len(), 3);
        let downloads = log
            .borrow()
            .iter()
            .filter(|(_, step)| *step == Step::Download)
            .count();
        assert_eq!(downloads, 3);
    }

    #[test]
    fn test_duplicate_products_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let log = CallLog::default();
        let spec = RecipeSpec::new("dup")
            .with_project(ProjectSpec::new("one").with_builder(counting("xz", &[])))
            .with_project(ProjectSpec::new("two").with_builder(counting("xz", &[])));

        let err = Recipe::from_spec(&spec, &Settings::new(), &registry(&log, None), dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "DuplicateProductError");
        assert!(err.to_string().contains("one/xz"));
        assert!(err.to_string().contains("two/xz"));
    }

    #[test]
    fn test_overrides_sit_below_project_and_builder() {
        let dir = tempfile::tempdir().unwrap();
        let spec = RecipeSpec::new("r")
            .with_settings(Settings::new().with("mode", "recipe").with("opt", "recipe"))
            .with_project(
                ProjectSpec::new("p")
                    .with_settings(Settings::new().with("mode", "project"))
                    .with_builder(counting("a", &[])),
            );
        let overrides = Settings::new().with("mode", "cli").with("opt", "cli");
        let recipe = Recipe::from_spec(
            &spec,
            &overrides,
            &registry(&CallLog::default(), None),
            dir.path(),
        )
        .unwrap();

        let settings = recipe.projects()[0].builders()[0].settings();
        assert_eq!(settings.get_str("mode"), Some("project"));
        assert_eq!(settings.get_str("opt"), Some("cli"));
        assert_eq!(spec.settings.get_str("opt"), Some("recipe"));
    }
}
