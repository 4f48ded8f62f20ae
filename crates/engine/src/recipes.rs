//! Recipes available without a Recipefile.

use pybundle_core::{BuildFlavor, BuilderSpec, ProjectSpec, RecipeSpec, Settings, Version};

use crate::steps::DEFAULT_MAC_DEP_TARGET;

const BZIP2_VERSION: Version = Version::new(1, 0, 8);
const XZ_VERSION: Version = Version::new(5, 2, 5);
const PYTHON_VERSION: Version = Version::new(3, 9, 2);

/// `static-python`, `shared-python` and `framework-python`.
pub fn builtin() -> Vec<RecipeSpec> {
    [
        BuildFlavor::Static,
        BuildFlavor::Shared,
        BuildFlavor::Framework,
    ]
    .into_iter()
    .map(python_recipe)
    .collect()
}

/// Looks up a built-in recipe by name.
pub fn find(name: &str) -> Option<RecipeSpec> {
    builtin().into_iter().find(|recipe| recipe.name == name)
}

fn python_recipe(flavor: BuildFlavor) -> RecipeSpec {
    let project = ProjectSpec::new("python")
        .with_builder(BuilderSpec::new("bzip2", BZIP2_VERSION))
        .with_builder(BuilderSpec::new("openssl", Version::new(1, 1, 1).with_tag("g")))
        .with_builder(BuilderSpec::new("xz", XZ_VERSION))
        .with_builder(
            BuilderSpec::new("python", PYTHON_VERSION)
                .with_product("Python")
                .with_flavor(flavor)
                .with_depends_on(vec!["bzip2".into(), "openssl".into(), "xz".into()]),
        );

    RecipeSpec::new(format!("{}-python", flavor))
        .with_description(format!("{} Python {} with bzip2, OpenSSL and xz", flavor, PYTHON_VERSION))
        .with_settings(Settings::new().with("mac_dep_target", DEFAULT_MAC_DEP_TARGET))
        .with_project(project)
}
