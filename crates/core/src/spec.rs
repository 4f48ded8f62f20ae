//! Declarative recipe, project and builder definitions.

use serde::{Deserialize, Serialize};

use crate::flavor::BuildFlavor;
use crate::settings::Settings;
use crate::version::Version;

/// A recipe: the top-level collection of projects a user builds in one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSpec {
    /// Recipe name (identifier).
    pub name: String,

    /// Human-readable description.
    pub description: Option<String>,

    /// Settings inherited by every project.
    pub settings: Settings,

    /// Projects, built in declaration order.
    pub projects: Vec<ProjectSpec>,
}

/// A project: an ordered group of builders sharing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Project name.
    pub name: String,

    /// Settings inherited by every builder of the project.
    pub settings: Settings,

    /// Builders owned by the project.
    pub builders: Vec<BuilderSpec>,
}

/// A builder: compiles and installs exactly one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderSpec {
    /// Builder name, unique within its project.
    pub name: String,

    /// Name of the build strategy (`bzip2`, `openssl`, `xz`, `python`, `autotools`).
    pub kind: String,

    /// Product name; defaults to the builder name.
    pub product: Option<String>,

    /// Product version.
    pub version: Version,

    /// Build flavor for runtimes.
    pub flavor: Option<BuildFlavor>,

    /// Source archive URL template.
    pub url: Option<String>,

    /// Names of builders of the same project that must be installed first.
    pub depends_on: Vec<String>,

    /// Builder-level settings; these win over project and recipe settings.
    pub settings: Settings,
}

impl RecipeSpec {
    /// Creates an empty recipe.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            settings: Settings::new(),
            projects: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Appends a project.
    pub fn with_project(mut self, project: ProjectSpec) -> Self {
        self.projects.push(project);
        self
    }

    /// Total number of builders across projects.
    pub fn builder_count(&self) -> usize {
        self.projects.iter().map(|p| p.builders.len()).sum()
    }
}

impl ProjectSpec {
    /// Creates an empty project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Settings::new(),
            builders: Vec::new(),
        }
    }

    /// Sets the settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Appends a builder.
    pub fn with_builder(mut self, builder: BuilderSpec) -> Self {
        self.builders.push(builder);
        self
    }

    /// Gets a builder by name.
    pub fn get_builder(&self, name: &str) -> Option<&BuilderSpec> {
        self.builders.iter().find(|b| b.name == name)
    }
}

impl BuilderSpec {
    /// Creates a builder whose kind is its name.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        let name = name.into();
        Self {
            kind: name.clone(),
            name,
            product: None,
            version,
            flavor: None,
            url: None,
            depends_on: Vec::new(),
            settings: Settings::new(),
        }
    }

    /// Sets the strategy kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the product name.
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Sets the flavor.
    pub fn with_flavor(mut self, flavor: BuildFlavor) -> Self {
        self.flavor = Some(flavor);
        self
    }

    /// Sets the source URL template.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets dependencies.
    pub fn with_depends_on(mut self, deps: Vec<String>) -> Self {
        self.depends_on = deps;
        self
    }

    /// Sets the settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Product name, falling back to the builder name.
    pub fn product_name(&self) -> &str {
        self.product.as_deref().unwrap_or(&self.name)
    }
}
