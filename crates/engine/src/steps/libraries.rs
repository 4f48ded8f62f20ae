//! Static base libraries linked into the runtime.

use std::path::PathBuf;

use pybundle_core::{BundleError, Product, Result, Settings};

use super::{BuildLayout, BuildSteps, StepContext};

/// bzip2: a plain Makefile, no configure step.
#[derive(Debug, Default)]
pub struct Bzip2Steps;

impl BuildSteps for Bzip2Steps {
    fn kind(&self) -> &str {
        "bzip2"
    }

    fn default_url(&self) -> Option<&str> {
        Some("https://sourceware.org/pub/bzip2/${name}-${version}.tar.gz")
    }

    fn product_path(&self, layout: &BuildLayout, product: &Product, _: &Settings) -> Result<PathBuf> {
        Ok(layout.prefix(product).join("lib").join("libbz2.a"))
    }

    fn build(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("make"))?;
        Ok(())
    }

    fn install(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("make").args(["install", "PREFIX=${prefix}"]))?;
        Ok(())
    }
}

/// OpenSSL, static only and without its test suite.
#[derive(Debug, Default)]
pub struct OpensslSteps;

impl BuildSteps for OpensslSteps {
    fn kind(&self) -> &str {
        "openssl"
    }

    fn default_url(&self) -> Option<&str> {
        Some("https://www.openssl.org/source/${name}-${version}.tar.gz")
    }

    fn product_path(&self, layout: &BuildLayout, product: &Product, _: &Settings) -> Result<PathBuf> {
        Ok(layout.prefix(product).join("lib").join("libssl.a"))
    }

    fn companion_paths(&self, layout: &BuildLayout, product: &Product, _: &Settings) -> Result<Vec<PathBuf>> {
        Ok(vec![layout.prefix(product).join("lib").join("libcrypto.a")])
    }

    fn pre_build(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(
            ctx.toolchain("./config")
                .args(["no-shared", "no-tests", "--prefix=${prefix}"]),
        )?;
        Ok(())
    }

    fn build(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("make"))?;
        Ok(())
    }

    fn install(&self, ctx: &StepContext) -> Result<()> {
        // install_sw skips the man pages
        ctx.run(ctx.toolchain("make").arg("install_sw"))?;
        Ok(())
    }
}

/// xz (liblzma), static only.
#[derive(Debug, Default)]
pub struct XzSteps;

impl BuildSteps for XzSteps {
    fn kind(&self) -> &str {
        "xz"
    }

    fn default_url(&self) -> Option<&str> {
        Some("https://tukaani.org/xz/${name}-${version}.tar.gz")
    }

    fn product_path(&self, layout: &BuildLayout, product: &Product, _: &Settings) -> Result<PathBuf> {
        Ok(layout.prefix(product).join("lib").join("liblzma.a"))
    }

    fn pre_build(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("./configure").args([
            "--disable-shared",
            "--enable-static",
            "--prefix=${prefix}",
        ]))?;
        Ok(())
    }

    fn build(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("make"))?;
        Ok(())
    }

    fn install(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("make").arg("install"))?;
        Ok(())
    }
}

/// Any `./configure && make && make install` project.
///
/// Reads `configure_args` (list) and `artifact`, the product path relative to
/// the install prefix.
#[derive(Debug, Default)]
pub struct AutotoolsSteps;

impl BuildSteps for AutotoolsSteps {
    fn kind(&self) -> &str {
        "autotools"
    }

    fn product_path(
        &self,
        layout: &BuildLayout,
        product: &Product,
        settings: &Settings,
    ) -> Result<PathBuf> {
        let artifact = settings.get_str("artifact").ok_or_else(|| {
            BundleError::invalid_setting(
                "artifact",
                format!(
                    "autotools builder for '{}' must name its artifact",
                    product.name()
                ),
            )
        })?;
        Ok(layout.prefix(product).join(artifact))
    }

    fn pre_build(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(
            ctx.toolchain("./configure")
                .args(ctx.settings.get_list("configure_args"))
                .arg("--prefix=${prefix}"),
        )?;
        Ok(())
    }

    fn build(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("make"))?;
        Ok(())
    }

    fn install(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("make").arg("install"))?;
        Ok(())
    }
}
