//! A builder: one product, its settings and its lifecycle.

use std::fmt;
use std::path::{Path, PathBuf};

use pybundle_core::{
    BuildFlavor, BuildState, BuilderSpec, BundleError, Product, Result, Settings, Step,
};
use tracing::{debug, info};

use crate::runner::Shell;
use crate::steps::{BuildLayout, BuildSteps, Dependency, StepContext, StepsRegistry};

/// What happened while a builder ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    /// The product already existed, so nothing was downloaded.
    pub download_skipped: bool,
}

/// Compiles and installs exactly one product.
pub struct Builder {
    name: String,
    kind: String,
    flavor: Option<BuildFlavor>,
    product: Product,
    settings: Settings,
    layout: BuildLayout,
    prefix: PathBuf,
    depends_on: Vec<usize>,
    state: BuildState,
    steps: Box<dyn BuildSteps>,
}

impl Builder {
    /// Builds a builder from its declaration.
    ///
    /// `parent` holds the merged recipe and project settings. `depends_on`
    /// are indices of predecessors in the owning project.
    pub fn from_spec(
        spec: &BuilderSpec,
        parent: &Settings,
        depends_on: Vec<usize>,
        registry: &StepsRegistry,
        work_dir: &Path,
    ) -> Result<Self> {
        let steps = registry.create(&spec.name, &spec.kind)?;

        let mut own = Settings::new()
            .with("builder", spec.name.as_str())
            .with("kind", spec.kind.as_str())
            .with("name", spec.product_name())
            .with("version", spec.version.to_string())
            .with("release", spec.version.finalize().to_string());
        if let Some(flavor) = spec.flavor {
            own.insert("flavor", flavor.as_str());
        }
        match (&spec.url, steps.default_url()) {
            (Some(url), _) => own.insert("url", url.as_str()),
            (None, Some(url)) => own.insert("url", url),
            (None, None) => {}
        }
        own.update(&spec.settings);

        let settings = Settings::merge(parent, &own);
        let layout = BuildLayout::from_settings(&settings, work_dir);
        let product = Product::new(spec.product_name(), spec.version.clone(), "");
        let path = steps.product_path(&layout, &product, &settings)?;
        let companions = steps.companion_paths(&layout, &product, &settings)?;
        let prefix = steps.install_prefix(&layout, &product, &settings)?;

        Ok(Self {
            name: spec.name.clone(),
            kind: spec.kind.clone(),
            flavor: spec.flavor,
            product: product.with_path(path).with_companions(companions),
            settings,
            layout,
            prefix,
            depends_on,
            state: BuildState::Pending,
            steps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn flavor(&self) -> Option<BuildFlavor> {
        self.flavor
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    /// Fully merged settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    /// Install prefix, which is also `${prefix}` in its commands.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Indices of predecessors in the owning project.
    pub fn depends_on(&self) -> &[usize] {
        &self.depends_on
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// This builder as seen by its dependents.
    pub fn as_dependency(&self) -> Dependency {
        Dependency {
            name: self.name.clone(),
            kind: self.kind.clone(),
            product: self.product.clone(),
            prefix: self.prefix.clone(),
        }
    }

    /// Runs every lifecycle step in order.
    ///
    /// The download is skipped when the product already exists. The first
    /// failing step marks the builder failed and ends the run.
    pub fn build(&mut self, shell: &Shell, dependencies: &[Dependency]) -> Result<BuildOutcome> {
        let ctx = StepContext {
            builder: &self.name,
            product: &self.product,
            settings: &self.settings,
            layout: &self.layout,
            prefix: &self.prefix,
            shell,
            dependencies,
        };
        let steps = &self.steps;
        let mut outcome = BuildOutcome::default();

        for step in Step::ALL {
            if step == Step::Download && self.product.exists() {
                info!(
                    "{} exists, skipping download",
                    self.product.path().display()
                );
                outcome.download_skipped = true;
                self.state.advance(step.completed_state());
                continue;
            }

            debug!("{}: {}", self.name, step);
            let result = match step {
                Step::Download => steps.download(&ctx),
                Step::PreBuild => steps.pre_build(&ctx),
                Step::Build => steps.build(&ctx),
                Step::PostBuild => steps.post_build(&ctx),
                Step::Install => steps.install(&ctx),
            };

            if let Err(source) = result {
                self.state.advance(BuildState::Failed);
                return Err(BundleError::BuildStep {
                    builder: self.name.clone(),
                    step,
                    source: Box::new(source),
                });
            }
            self.state.advance(step.completed_state());
        }

        Ok(outcome)
    }

    /// Marks the builder failed outside its own steps.
    pub(crate) fn fail(&mut self) {
        self.state.advance(BuildState::Failed);
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("product", &self.product)
            .field("depends_on", &self.depends_on)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pybundle_core::Version;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records the steps it runs and fails on request.
    struct Scripted {
        log: Rc<RefCell<Vec<Step>>>,
        fail_at: Option<Step>,
    }

    impl Scripted {
        fn record(&self, step: Step) -> Result<()> {
            self.log.borrow_mut().push(step);
            if self.fail_at == Some(step) {
                return Err(BundleError::ShellCommand {
                    command: "make".into(),
                    exit_code: Some(2),
                    stderr: "boom".into(),
                });
            }
            Ok(())
        }
    }

    impl BuildSteps for Scripted {
        fn kind(&self) -> &str {
            "scripted"
        }

        fn product_path(&self, layout: &BuildLayout, product: &Product, _: &Settings) -> Result<PathBuf> {
            Ok(layout.prefix(product).join("lib.a"))
        }

        fn download(&self, _: &StepContext) -> Result<()> {
            self.record(Step::Download)
        }

        fn pre_build(&self, _: &StepContext) -> Result<()> {
            self.record(Step::PreBuild)
        }

        fn build(&self, _: &StepContext) -> Result<()> {
            self.record(Step::Build)
        }

        fn post_build(&self, _: &StepContext) -> Result<()> {
            self.record(Step::PostBuild)
        }

        fn install(&self, _: &StepContext) -> Result<()> {
            self.record(Step::Install)
        }
    }

    fn registry(log: &Rc<RefCell<Vec<Step>>>, fail_at: Option<Step>) -> StepsRegistry {
        let log = log.clone();
        let mut registry = StepsRegistry::new();
        registry.register("scripted", move || {
            Box::new(Scripted {
                log: log.clone(),
                fail_at,
            })
        });
        registry
    }

    fn spec() -> BuilderSpec {
        BuilderSpec::new("lib", Version::new(1, 0, 0)).with_kind("scripted")
    }

    #[test]
    fn test_steps_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = Rc::default();
        let registry = registry(&log, None);
        let mut builder =
            Builder::from_spec(&spec(), &Settings::new(), vec![], &registry, dir.path()).unwrap();

        let outcome = builder.build(&Shell::new(), &[]).unwrap();

        assert!(!outcome.download_skipped);
        assert_eq!(*log.borrow(), Step::ALL.to_vec());
        assert_eq!(builder.state(), BuildState::Installed);
    }

    #[test]
    fn test_failure_stops_and_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let log = Rc::default();
        let registry = registry(&log, Some(Step::Build));
        let mut builder =
            Builder::from_spec(&spec(), &Settings::new(), vec![], &registry, dir.path()).unwrap();

        let err = builder.build(&Shell::new(), &[]).unwrap_err();

        assert_eq!(
            *log.borrow(),
            vec![Step::Download, Step::PreBuild, Step::Build]
        );
        assert_eq!(builder.state(), BuildState::Failed);
        match err {
            BundleError::BuildStep { builder, step, .. } => {
                assert_eq!(builder, "lib");
                assert_eq!(step, Step::Build);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_existing_product_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let log = Rc::default();
        let registry = registry(&log, None);
        let mut builder =
            Builder::from_spec(&spec(), &Settings::new(), vec![], &registry, dir.path()).unwrap();

        let path = builder.product().path().to_path_buf();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"archive").unwrap();

        let outcome = builder.build(&Shell::new(), &[]).unwrap();
        assert!(outcome.download_skipped);
        assert!(!log.borrow().contains(&Step::Download));
        assert!(log.borrow().contains(&Step::Install));
    }

    #[test]
    fn test_synthesized_settings() {
        let dir = tempfile::tempdir().unwrap();
        let registry = StepsRegistry::with_defaults();
        let spec = BuilderSpec::new("python", Version::parse("3.9.2rc1").unwrap())
            .with_product("Python")
            .with_flavor(BuildFlavor::Static)
            .with_settings(Settings::new().with("mac_dep_target", "11.0"));
        let parent = Settings::new()
            .with("mac_dep_target", "10.13")
            .with("build_dir", "out");

        let builder = Builder::from_spec(&spec, &parent, vec![], &registry, dir.path()).unwrap();
        let settings = builder.settings();

        assert_eq!(settings.get_str("name"), Some("Python"));
        assert_eq!(settings.get_str("version"), Some("3.9.2rc1"));
        assert_eq!(settings.get_str("release"), Some("3.9.2"));
        assert_eq!(settings.get_str("flavor"), Some("static"));
        assert_eq!(settings.get_str("mac_dep_target"), Some("11.0"));
        assert!(settings.get_str("url").unwrap().contains("${release}"));
        assert_eq!(
            builder.product().path(),
            dir.path().join("out/lib/python-static/lib/libpython3.9.a")
        );
        assert_eq!(builder.prefix(), dir.path().join("out/lib/python-static"));
        assert_eq!(builder.as_dependency().prefix, builder.prefix());
    }

    #[test]
    fn test_partial_openssl_install_is_not_a_product() {
        let dir = tempfile::tempdir().unwrap();
        let spec = BuilderSpec::new("openssl", Version::parse("1.1.1g").unwrap());
        let mut builder = Builder::from_spec(
            &spec,
            &Settings::new(),
            vec![],
            &StepsRegistry::with_defaults(),
            dir.path(),
        )
        .unwrap();

        let lib = dir.path().join("build/lib/openssl/lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("libssl.a"), b"archive").unwrap();
        assert!(!builder.product().exists());

        let outcome = builder
            .build(&Shell::new().with_dry_run(true), &[])
            .unwrap();
        assert!(!outcome.download_skipped);

        std::fs::write(lib.join("libcrypto.a"), b"archive").unwrap();
        assert!(builder.product().exists());
    }

    #[test]
    fn test_unknown_kind() {
        let dir = tempfile::tempdir().unwrap();
        let spec = BuilderSpec::new("zlib", Version::new(1, 2, 13)).with_kind("cmake");
        let err = Builder::from_spec(
            &spec,
            &Settings::new(),
            vec![],
            &StepsRegistry::with_defaults(),
            dir.path(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "UnknownBuilderKindError");
    }
}
