//! Recipefile discovery and recipe lookup.

use std::path::{Path, PathBuf};

use pybundle_core::{BundleError, RecipeSpec, Recipefile, Result};
use pybundle_engine::recipes;

/// Default Recipefile name.
pub const RECIPEFILE_NAME: &str = "Recipefile";

/// Finds the Recipefile by searching from `start` upwards.
pub fn find_recipefile_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(RECIPEFILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Where a recipe was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Recipefile,
    Builtin,
}

/// Recipes from the Recipefile, if any, followed by the built-in ones.
///
/// A Recipefile recipe shadows a built-in recipe of the same name.
#[derive(Debug)]
pub struct Catalog {
    recipefile: Option<Recipefile>,
    builtin: Vec<RecipeSpec>,
    working_dir: PathBuf,
}

impl Catalog {
    /// Loads `file`, or the Recipefile found above the current directory.
    ///
    /// An explicit `file` must exist; a missing discovered one is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let path = match file {
            Some(path) => Some(path.to_path_buf()),
            None => find_recipefile_from(&cwd),
        };

        let recipefile = path
            .as_deref()
            .map(pybundle_parser::parse_file)
            .transpose()?;
        let working_dir = path
            .as_deref()
            .map(working_dir)
            .unwrap_or(cwd);

        Ok(Self {
            recipefile,
            builtin: recipes::builtin(),
            working_dir,
        })
    }

    /// Directory builds run in: the Recipefile's directory, else the current one.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Every visible recipe with its origin.
    pub fn recipes(&self) -> Vec<(&RecipeSpec, Origin)> {
        let declared: Vec<&RecipeSpec> = self
            .recipefile
            .iter()
            .flat_map(|file| file.recipes.iter())
            .collect();
        let shadowed = |name: &str| declared.iter().any(|r| r.name == name);

        let mut all: Vec<_> = declared
            .iter()
            .map(|recipe| (*recipe, Origin::Recipefile))
            .collect();
        all.extend(
            self.builtin
                .iter()
                .filter(|recipe| !shadowed(&recipe.name))
                .map(|recipe| (recipe, Origin::Builtin)),
        );
        all
    }

    /// Looks up `name`, or the Recipefile's default recipe when `name` is `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<&RecipeSpec> {
        let name = match name {
            Some(name) => name,
            None => self
                .recipefile
                .as_ref()
                .and_then(|file| file.default_recipe.as_deref())
                .ok_or_else(|| {
                    BundleError::invalid_setting(
                        "recipe",
                        "no recipe given and no default recipe declared",
                    )
                })?,
        };

        self.recipes()
            .into_iter()
            .map(|(recipe, _)| recipe)
            .find(|recipe| recipe.name == name)
            .ok_or_else(|| BundleError::RecipeNotFound(name.to_string()))
    }

    /// Whether `name` is the Recipefile's default recipe.
    pub fn is_default(&self, name: &str) -> bool {
        self.recipefile
            .as_ref()
            .and_then(|file| file.default_recipe.as_deref())
            == Some(name)
    }
}

/// Returns the working directory for a Recipefile (its parent directory).
pub fn working_dir(recipefile_path: &Path) -> PathBuf {
    recipefile_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
