//! Pybundle Core - Core types for the pybundle build and relocation toolchain.

mod error;
mod flavor;
pub mod interpolation;
mod product;
mod recipefile;
mod settings;
mod spec;
mod state;
mod version;

pub use error::{BundleError, Result, Span};
pub use flavor::BuildFlavor;
pub use interpolation::{InterpolationContext, interpolate};
pub use product::Product;
pub use recipefile::Recipefile;
pub use settings::{SettingValue, Settings};
pub use spec::{BuilderSpec, ProjectSpec, RecipeSpec};
pub use state::{BuildState, Step};
pub use version::Version;
