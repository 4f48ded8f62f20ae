//! CPython built from source in static, shared or framework form.

use std::path::{Path, PathBuf};

use pybundle_core::{BuildFlavor, BundleError, Product, Result, Settings};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{BuildLayout, BuildSteps, StepContext, path_str};
use crate::runner::Invocation;

/// Stdlib packages dropped from the install unless `remove_packages` says otherwise.
const DEFAULT_REMOVED_PACKAGES: &[&str] = &[
    "idlelib",
    "lib2to3",
    "tkinter",
    "turtledemo",
    "turtle.py",
    "ctypes",
    "curses",
    "ensurepip",
    "venv",
];

/// `lib-dynload` modules dropped from shared and framework installs.
const DEFAULT_REMOVED_EXTENSIONS: &[&str] = &[
    "_tkinter",
    "_ctypes",
    "_multibytecodec",
    "_codecs_jp",
    "_codecs_hk",
    "_codecs_cn",
    "_codecs_kr",
    "_codecs_tw",
    "_codecs_iso2022",
    "_curses",
    "_curses_panel",
];

/// Scripts dropped from `bin`, each completed with `<ver>`.
const DEFAULT_REMOVED_BINARIES: &[&str] = &[
    "2to3-",
    "idle",
    "easy_install-",
    "pip",
    "pyvenv-",
    "pydoc",
];

/// Stdlib entries left outside the zip.
const UNZIPPED: &[&str] = &["lib-dynload", "os.py"];

#[derive(Debug, Default)]
pub struct PythonSteps;

impl PythonSteps {
    fn flavor(settings: &Settings) -> Result<BuildFlavor> {
        match settings.get("flavor") {
            Some(value) => value.to_string().parse(),
            None => Ok(BuildFlavor::default()),
        }
    }

    /// Framework installs live inside the framework bundle. Static and
    /// shared installs get a prefix of their own, `lib/python-<flavor>`,
    /// so both can share a build directory.
    fn install_root(layout: &BuildLayout, product: &Product, flavor: BuildFlavor) -> PathBuf {
        match flavor {
            BuildFlavor::Framework => layout
                .lib
                .join(format!("{}.framework", product.name()))
                .join("Versions")
                .join(product.ver()),
            BuildFlavor::Static | BuildFlavor::Shared => layout.lib.join(format!(
                "{}-{}",
                product.name().to_lowercase(),
                flavor
            )),
        }
    }

    /// `lib/python3.9` under the install root.
    fn stdlib_dir(root: &Path, product: &Product) -> PathBuf {
        root.join("lib").join(product.name_ver())
    }

    fn configure_args(ctx: &StepContext, flavor: BuildFlavor) -> Vec<String> {
        let mut args = match flavor {
            BuildFlavor::Static => vec!["--disable-shared".to_string()],
            BuildFlavor::Shared => vec!["--enable-shared".to_string()],
            BuildFlavor::Framework => vec![format!("--enable-framework={}", path_str(&ctx.layout.lib))],
        };
        args.push("--prefix=${prefix}".to_string());
        args.extend(
            ["--without-doc-strings", "--enable-ipv6", "--without-ensurepip"]
                .into_iter()
                .map(str::to_string),
        );
        let optimize = ctx
            .settings
            .get_bool("optimize")
            .unwrap_or(flavor == BuildFlavor::Static);
        if optimize {
            args.push("--with-lto".to_string());
            args.push("--enable-optimizations".to_string());
        }
        if let Some(openssl) = ctx.dependency("openssl") {
            args.push(format!("--with-openssl={}", path_str(&openssl.prefix)));
        }
        args.extend(ctx.settings.get_list("configure_args"));
        args
    }

    fn removed_packages(settings: &Settings, product: &Product) -> Vec<String> {
        if settings.contains_key("remove_packages") {
            return settings.get_list("remove_packages");
        }
        let mut names: Vec<String> = DEFAULT_REMOVED_PACKAGES
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.push(format!("config-{}-darwin", product.ver()));
        names
    }

    /// Extension module names; a static interpreter has its modules linked in.
    fn removed_extensions(settings: &Settings, flavor: BuildFlavor) -> Vec<String> {
        if settings.contains_key("remove_extensions") {
            return settings.get_list("remove_extensions");
        }
        match flavor {
            BuildFlavor::Static => Vec::new(),
            BuildFlavor::Shared | BuildFlavor::Framework => DEFAULT_REMOVED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    fn removed_binaries(settings: &Settings, product: &Product) -> Vec<String> {
        if settings.contains_key("remove_binaries") {
            return settings.get_list("remove_binaries");
        }
        DEFAULT_REMOVED_BINARIES
            .iter()
            .map(|name| format!("{}{}", name, product.ver()))
            .collect()
    }

    /// Drops `Setup.local` into the source tree and applies `patches`.
    fn prepare_source(ctx: &StepContext) -> Result<()> {
        let source_dir = ctx.source_dir();
        if let Some(setup) = ctx.settings.get_str("setup_local") {
            let target = source_dir.join("Modules").join("Setup.local");
            ctx.shell.copy_file(Path::new(setup), &target)?;
        }
        for patch in ctx.settings.get_list("patches") {
            ctx.run(ctx.toolchain("patch").args(["-p1", "-i"]).arg(patch))?;
        }
        Ok(())
    }

    /// Removes caches, tests, docs and the configured packages, extensions
    /// and scripts.
    fn clean(ctx: &StepContext, root: &Path, flavor: BuildFlavor) -> Result<()> {
        let stdlib = Self::stdlib_dir(root, ctx.product);
        info!("Cleaning {}", root.display());

        for path in matching_paths(root, |name| {
            name == "__pycache__" || name.ends_with(".pyc") || name.ends_with(".pyo")
        }) {
            ctx.shell.remove(&path)?;
        }

        for path in matching_paths(&stdlib, |name| name == "test" || name == "tests") {
            ctx.shell.remove(&path)?;
        }

        for path in matching_paths(&stdlib.join("distutils").join("command"), |name| {
            name.ends_with(".exe")
        }) {
            ctx.shell.remove(&path)?;
        }

        ctx.shell.remove(&stdlib.join("site-packages"))?;
        ctx.shell.remove(&root.join("lib").join("pkgconfig"))?;
        ctx.shell.remove(&root.join("share"))?;

        for name in Self::removed_packages(ctx.settings, ctx.product) {
            ctx.shell.remove(&stdlib.join(name))?;
        }

        let dynload = stdlib.join("lib-dynload");
        for name in Self::removed_extensions(ctx.settings, flavor) {
            let module = format!("{}.cpython-{}-darwin.so", name, ctx.product.ver_nodot());
            ctx.shell.remove(&dynload.join(module))?;
        }

        let bin = root.join("bin");
        for name in Self::removed_binaries(ctx.settings, ctx.product) {
            ctx.shell.remove(&bin.join(name))?;
        }

        Ok(())
    }

    /// Moves the stdlib into `lib/python<ver_nodot>.zip`, leaving the
    /// unzipped entries and an empty `site-packages` behind.
    fn zip_stdlib(ctx: &StepContext, root: &Path) -> Result<()> {
        let stdlib = Self::stdlib_dir(root, ctx.product);
        let archive = root
            .join("lib")
            .join(format!("{}{}.zip", ctx.product.name().to_lowercase(), ctx.product.ver_nodot()));
        info!("Zipping {} into {}", stdlib.display(), archive.display());

        ctx.shell.remove(&archive)?;
        ctx.run(
            Invocation::new("zip")
                .current_dir(stdlib.clone())
                .args(["-q", "-r", "-y"])
                .arg(path_str(&archive))
                .args([".", "-x", "lib-dynload/*", "os.py"]),
        )?;

        let entries = WalkDir::new(&stdlib)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok());
        for entry in entries {
            let keep = entry
                .file_name()
                .to_str()
                .is_some_and(|name| UNZIPPED.contains(&name));
            if !keep {
                ctx.shell.remove(entry.path())?;
            }
        }

        ctx.shell.create_dir_all(&stdlib.join("site-packages"))
    }

    /// Rewrites the install name of the shared library to `dylib_id`.
    fn set_dylib_id(ctx: &StepContext, id: &str, flavor: BuildFlavor) -> Result<()> {
        if flavor == BuildFlavor::Static {
            return Err(BundleError::invalid_setting(
                "dylib_id",
                "a static build has no shared library to rename",
            ));
        }
        let dylib = PythonSteps.product_path(ctx.layout, ctx.product, ctx.settings)?;
        ctx.shell.chmod(&dylib, 0o755)?;
        ctx.run(
            Invocation::new("install_name_tool")
                .args(["-id", id])
                .arg(path_str(&dylib)),
        )?;
        Ok(())
    }
}

impl BuildSteps for PythonSteps {
    fn kind(&self) -> &str {
        "python"
    }

    fn default_url(&self) -> Option<&str> {
        Some("https://www.python.org/ftp/python/${release}/${name}-${version}.tgz")
    }

    fn install_prefix(
        &self,
        layout: &BuildLayout,
        product: &Product,
        settings: &Settings,
    ) -> Result<PathBuf> {
        Ok(Self::install_root(layout, product, Self::flavor(settings)?))
    }

    fn product_path(
        &self,
        layout: &BuildLayout,
        product: &Product,
        settings: &Settings,
    ) -> Result<PathBuf> {
        let flavor = Self::flavor(settings)?;
        let root = Self::install_root(layout, product, flavor);
        Ok(match flavor {
            BuildFlavor::Static => root.join("lib").join(product.staticlib_name()),
            BuildFlavor::Shared => root.join("lib").join(product.dylib_name()),
            BuildFlavor::Framework => root.join(product.name()),
        })
    }

    fn pre_build(&self, ctx: &StepContext) -> Result<()> {
        let flavor = ctx.flavor()?;
        Self::prepare_source(ctx)?;
        ctx.run(
            ctx.toolchain("./configure")
                .args(Self::configure_args(ctx, flavor)),
        )?;
        Ok(())
    }

    fn build(&self, ctx: &StepContext) -> Result<()> {
        ctx.run(ctx.toolchain("make"))?;
        // altinstall leaves an unversioned `python3` out of the prefix
        ctx.run(ctx.toolchain("make").arg("altinstall"))?;
        Ok(())
    }

    /// Strips the installed tree, then optionally zips the stdlib and
    /// renames the shared library.
    fn post_build(&self, ctx: &StepContext) -> Result<()> {
        let flavor = ctx.flavor()?;
        let root = ctx.prefix();
        Self::clean(ctx, &root, flavor)?;

        if ctx.settings.get_bool("ziplib").unwrap_or(false) {
            Self::zip_stdlib(ctx, &root)?;
        } else {
            debug!("ziplib not set, stdlib left unzipped");
        }

        if let Some(id) = ctx.settings.get_str("dylib_id") {
            Self::set_dylib_id(ctx, id, flavor)?;
        }

        Ok(())
    }
}

/// Paths under `root` whose file name matches, without descending into matches.
fn matching_paths(root: &Path, matches: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else {
            continue;
        };
        if entry.file_name().to_str().is_some_and(&matches) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            found.push(entry.into_path());
        }
    }
    found
}
