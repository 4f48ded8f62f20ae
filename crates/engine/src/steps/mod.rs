//! Build strategies: how each kind of builder downloads, configures, compiles
//! and installs its product.

mod layout;
mod libraries;
mod python;
mod registry;

use std::path::{Path, PathBuf};

use pybundle_core::interpolation::{InterpolationContext, interpolate};
use pybundle_core::{BuildFlavor, BundleError, Product, Result, Settings};
use tracing::{debug, info};

use crate::runner::{CompletedProcess, Invocation, Shell};

pub use layout::{BuildLayout, DEFAULT_BUILD_DIR};
pub use libraries::{AutotoolsSteps, Bzip2Steps, OpensslSteps, XzSteps};
pub use python::PythonSteps;
pub use registry::{StepsFactory, StepsRegistry};

/// Deployment target exported to every toolchain invocation when unset.
pub const DEFAULT_MAC_DEP_TARGET: &str = "10.13";

/// An installed predecessor, as seen by a dependent builder.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub kind: String,
    pub product: Product,
    /// Install prefix of the dependency.
    pub prefix: PathBuf,
}

/// Everything a step may read while it runs.
pub struct StepContext<'a> {
    pub builder: &'a str,
    pub product: &'a Product,
    pub settings: &'a Settings,
    pub layout: &'a BuildLayout,
    /// Install prefix of this builder, as chosen by its strategy.
    pub prefix: &'a Path,
    pub shell: &'a Shell,
    pub dependencies: &'a [Dependency],
}

impl StepContext<'_> {
    pub fn prefix(&self) -> PathBuf {
        self.prefix.to_path_buf()
    }

    pub fn source_dir(&self) -> PathBuf {
        self.layout.source_dir(self.product)
    }

    /// Build flavor, from the `flavor` setting.
    pub fn flavor(&self) -> Result<BuildFlavor> {
        match self.settings.get("flavor") {
            Some(value) => value.to_string().parse(),
            None => Ok(BuildFlavor::default()),
        }
    }

    pub fn mac_dep_target(&self) -> String {
        self.settings
            .get("mac_dep_target")
            .map(|v| v.to_string())
            .unwrap_or_else(|| DEFAULT_MAC_DEP_TARGET.to_string())
    }

    /// Finds an installed predecessor by kind.
    pub fn dependency(&self, kind: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.kind == kind)
    }

    /// Values available to `${...}` placeholders: every setting plus layout paths.
    pub fn substitutions(&self) -> InterpolationContext {
        InterpolationContext::from_settings(self.settings)
            .with_value("prefix", path_str(&self.prefix()))
            .with_value("source_dir", path_str(&self.source_dir()))
            .with_value("lib_dir", path_str(&self.layout.lib))
            .with_value("name_version", self.product.name_version())
            .with_value("ver", self.product.ver())
            .with_value("ver_nodot", self.product.ver_nodot())
            .with_value("dylib_name", self.product.dylib_name())
    }

    /// A toolchain command run from the source directory with the deployment target exported.
    pub fn toolchain(&self, program: &str) -> Invocation {
        Invocation::new(program)
            .current_dir(self.source_dir())
            .env("MACOSX_DEPLOYMENT_TARGET", self.mac_dep_target())
    }

    /// Substitutes placeholders and runs a mutating invocation.
    pub fn run(&self, invocation: Invocation) -> Result<CompletedProcess> {
        let invocation = invocation.substitute(&self.substitutions())?;
        self.shell.run_invocation(&invocation)
    }

    /// Source archive URL with placeholders resolved.
    pub fn url(&self) -> Result<String> {
        let template = self.settings.get_str("url").ok_or_else(|| {
            BundleError::invalid_setting(
                "url",
                format!("builder '{}' has no source url", self.builder),
            )
        })?;
        interpolate(template, &self.substitutions())
    }
}

/// Lifecycle hooks of one kind of builder.
///
/// Hooks run in the order `download`, `pre_build`, `build`, `post_build`,
/// `install`. Only `build` has no default.
pub trait BuildSteps {
    /// Name under which the strategy is registered.
    fn kind(&self) -> &str;

    /// Source URL template used when a builder does not set `url`.
    fn default_url(&self) -> Option<&str> {
        None
    }

    /// Where the finished artifact lives.
    fn product_path(
        &self,
        layout: &BuildLayout,
        product: &Product,
        settings: &Settings,
    ) -> Result<PathBuf>;

    /// Directory the product installs into, exported as `${prefix}`.
    fn install_prefix(
        &self,
        layout: &BuildLayout,
        product: &Product,
        _settings: &Settings,
    ) -> Result<PathBuf> {
        Ok(layout.prefix(product))
    }

    /// Further files that must exist before the product counts as built.
    fn companion_paths(
        &self,
        _layout: &BuildLayout,
        _product: &Product,
        _settings: &Settings,
    ) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn download(&self, ctx: &StepContext) -> Result<()> {
        download_source(ctx)
    }

    fn pre_build(&self, _ctx: &StepContext) -> Result<()> {
        Ok(())
    }

    fn build(&self, ctx: &StepContext) -> Result<()>;

    fn post_build(&self, _ctx: &StepContext) -> Result<()> {
        Ok(())
    }

    fn install(&self, _ctx: &StepContext) -> Result<()> {
        Ok(())
    }
}

/// Fetches the source archive with curl and unpacks it with tar.
///
/// Both are skipped when their output already exists.
pub fn download_source(ctx: &StepContext) -> Result<()> {
    let url = ctx.url()?;
    let archive = ctx.layout.archive_path(ctx.product, Some(&url));

    ctx.shell.create_dir_all(&ctx.layout.downloads)?;
    if archive.exists() {
        debug!("{} already downloaded", archive.display());
    } else {
        info!("Downloading {}", ctx.product.name_version());
        ctx.shell.run_invocation(
            &Invocation::new("curl")
                .args(["-L", "--fail", url.as_str(), "-o"])
                .arg(path_str(&archive)),
        )?;
    }

    let source_dir = ctx.source_dir();
    if source_dir.exists() {
        debug!("{} already unpacked", source_dir.display());
    } else {
        ctx.shell.create_dir_all(&ctx.layout.src)?;
        ctx.shell.run_invocation(
            &Invocation::new("tar")
                .arg("-C")
                .arg(path_str(&ctx.layout.src))
                .arg("-xf")
                .arg(path_str(&archive)),
        )?;
    }

    Ok(())
}

pub(crate) fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
