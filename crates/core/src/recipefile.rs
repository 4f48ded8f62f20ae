//! Recipefile structure representing the parsed configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::spec::RecipeSpec;

/// The root structure representing a parsed Recipefile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipefile {
    /// Path to the Recipefile.
    pub path: PathBuf,

    /// Recipes in declaration order.
    pub recipes: Vec<RecipeSpec>,

    /// Default recipe to build when no name is given.
    pub default_recipe: Option<String>,
}

impl Recipefile {
    /// Creates a new empty Recipefile.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recipes: Vec::new(),
            default_recipe: None,
        }
    }

    /// Adds a recipe, replacing an earlier one with the same name.
    pub fn add_recipe(&mut self, recipe: RecipeSpec) {
        match self.recipes.iter_mut().find(|r| r.name == recipe.name) {
            Some(existing) => *existing = recipe,
            None => self.recipes.push(recipe),
        }
    }

    /// Sets the default recipe.
    pub fn set_default_recipe(&mut self, name: impl Into<String>) {
        self.default_recipe = Some(name.into());
    }

    /// Gets a recipe by name.
    pub fn get_recipe(&self, name: &str) -> Option<&RecipeSpec> {
        self.recipes.iter().find(|r| r.name == name)
    }

    /// Returns all recipe names.
    pub fn recipe_names(&self) -> Vec<&str> {
        self.recipes.iter().map(|r| r.name.as_str()).collect()
    }
}

impl Default for Recipefile {
    fn default() -> Self {
        Self::new("")
    }
}
