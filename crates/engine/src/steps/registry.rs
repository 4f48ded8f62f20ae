//! Lookup of build strategies by kind name.

use std::collections::BTreeMap;

use pybundle_core::{BundleError, Result};

use super::{AutotoolsSteps, BuildSteps, Bzip2Steps, OpensslSteps, PythonSteps, XzSteps};

/// Creates a fresh strategy instance.
pub type StepsFactory = Box<dyn Fn() -> Box<dyn BuildSteps>>;

/// Maps kind names to strategy factories.
#[derive(Default)]
pub struct StepsRegistry {
    factories: BTreeMap<String, StepsFactory>,
}

impl StepsRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("bzip2", || Box::new(Bzip2Steps));
        registry.register("openssl", || Box::new(OpensslSteps));
        registry.register("xz", || Box::new(XzSteps));
        registry.register("python", || Box::new(PythonSteps));
        registry.register("autotools", || Box::new(AutotoolsSteps));
        registry
    }

    /// Registers a kind, replacing any previous factory of the same name.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn BuildSteps> + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Instantiates the strategy for `kind` on behalf of `builder`.
    pub fn create(&self, builder: &str, kind: &str) -> Result<Box<dyn BuildSteps>> {
        self.factories
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| BundleError::UnknownBuilderKind {
                builder: builder.to_string(),
                kind: kind.to_string(),
            })
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
