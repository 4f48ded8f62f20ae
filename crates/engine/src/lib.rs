//! Pybundle Engine - Builds recipes in dependency order and relocates the
//! resulting binaries into self-contained bundles.

mod builder;
mod dag;
mod executor;
mod project;
mod recipe;
pub mod recipes;
pub mod relocate;
mod runner;
pub mod steps;

pub use builder::{BuildOutcome, Builder};
pub use dag::BuildGraph;
pub use executor::{BuildCallback, BuildEvent, BuildReport, Executor};
pub use project::Project;
pub use recipe::Recipe;
pub use relocate::{
    BundleLayout, LinkTools, MachOTools, RelocationPolicy, RelocationReport, Relocator, Rewrite,
    RewritePlan,
};
pub use runner::{CompletedProcess, Invocation, Shell};
pub use steps::{BuildLayout, BuildSteps, StepsRegistry};
