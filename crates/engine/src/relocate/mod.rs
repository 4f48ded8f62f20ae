//! Bundle relocation: copy vendored shared libraries into a bundle and
//! rewrite linkage to `@rpath`.
//!
//! A run has three phases:
//!
//! 1. **Closure walk**: starting from the roots, every vendored reference is
//!    copied into the library directory and the copy is walked in turn.
//! 2. **Planning**: each walked binary gets `SetId` and `ChangeReference`
//!    edits for its vendored install name and references.
//! 3. **Application**: edits run through [`LinkTools`]. There is no rollback;
//!    a partially relocated bundle is fixed by running again.

mod layout;
mod otool;
mod policy;
mod tools;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use pybundle_core::{BundleError, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::runner::Shell;

pub use layout::BundleLayout;
pub use otool::{Linkage, parse_linkage};
pub use policy::{DEFAULT_VENDOR_PREFIXES, Disposition, FALLBACK_LIBRARY_DIR, RelocationPolicy};
pub use tools::{LinkTools, MachOTools};

/// One edit to a binary's load commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Rewrite {
    /// `install_name_tool -id`
    SetId { old_id: String, new_id: String },

    /// `install_name_tool -change`
    ChangeReference { old: String, new: String },
}

impl Rewrite {
    pub fn old_ref(&self) -> &str {
        match self {
            Rewrite::SetId { old_id, .. } => old_id,
            Rewrite::ChangeReference { old, .. } => old,
        }
    }

    pub fn new_ref(&self) -> &str {
        match self {
            Rewrite::SetId { new_id, .. } => new_id,
            Rewrite::ChangeReference { new, .. } => new,
        }
    }
}

/// Edits per binary, binaries in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewritePlan {
    edits: BTreeMap<PathBuf, Vec<Rewrite>>,
}

impl RewritePlan {
    /// Adds an edit unless the binary already has it.
    pub fn push(&mut self, binary: &Path, rewrite: Rewrite) {
        let edits = self.edits.entry(binary.to_path_buf()).or_default();
        if !edits.contains(&rewrite) {
            edits.push(rewrite);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Total number of edits.
    pub fn len(&self) -> usize {
        self.edits.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[Rewrite])> {
        self.edits
            .iter()
            .map(|(binary, edits)| (binary.as_path(), edits.as_slice()))
    }

    pub fn get(&self, binary: &Path) -> &[Rewrite] {
        self.edits.get(binary).map(Vec::as_slice).unwrap_or_default()
    }
}

/// State of one closure walk.
///
/// Binaries are keyed by their path inside the bundle, even when dry-run
/// left the copy undone and the source was inspected instead.
#[derive(Debug, Default)]
pub struct Closure {
    visited: BTreeSet<PathBuf>,
    copied: Vec<PathBuf>,
    linkage: BTreeMap<PathBuf, Linkage>,
}

impl Closure {
    pub fn visited(&self) -> &BTreeSet<PathBuf> {
        &self.visited
    }

    /// Destinations copied during the walk, in copy order.
    pub fn copied(&self) -> &[PathBuf] {
        &self.copied
    }

    pub fn linkage(&self, binary: &Path) -> Option<&Linkage> {
        self.linkage.get(binary)
    }
}

/// Outcome of [`Relocator::process`].
#[derive(Debug, Clone, Serialize)]
pub struct RelocationReport {
    pub copied: Vec<PathBuf>,
    pub visited: Vec<PathBuf>,
    pub plan: RewritePlan,
}

/// Makes bundles self-contained.
pub struct Relocator<T> {
    tools: T,
    shell: Shell,
    policy: RelocationPolicy,
}

impl<T: LinkTools> Relocator<T> {
    pub fn new(tools: T, shell: Shell) -> Self {
        Self {
            tools,
            shell,
            policy: RelocationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RelocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RelocationPolicy {
        &self.policy
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    fn linkage_of(&self, binary: &Path) -> Result<Linkage> {
        let text = self.tools.list_linkage(binary)?;
        Ok(parse_linkage(binary, &text))
    }

    /// Vendored references of `binary`.
    pub fn discover_dependencies(&self, binary: &Path) -> Result<BTreeSet<String>> {
        Ok(self
            .linkage_of(binary)?
            .references
            .into_iter()
            .filter(|reference| self.policy.is_vendored(reference))
            .collect())
    }

    /// Walks a binary where it is, copying its vendored closure into `lib_dir`.
    pub fn walk(&self, closure: &mut Closure, binary: &Path, lib_dir: &Path) -> Result<()> {
        self.examine(closure, binary, binary, lib_dir)
    }

    /// Inspects `inspected`, recording the result under `key`.
    fn examine(
        &self,
        closure: &mut Closure,
        inspected: &Path,
        key: &Path,
        lib_dir: &Path,
    ) -> Result<()> {
        if !closure.visited.insert(key.to_path_buf()) {
            return Ok(());
        }
        debug!("Examining {}", inspected.display());

        let linkage = self.linkage_of(inspected)?;
        for reference in &linkage.references {
            if let Disposition::Vendored { source } = self.policy.classify(reference) {
                self.copy_into_bundle(closure, &source, lib_dir)?;
            }
        }
        closure.linkage.insert(key.to_path_buf(), linkage);
        Ok(())
    }

    /// Copies `library` to `lib_dir/<file name>` unless it is already there,
    /// then walks it.
    ///
    /// Returns the destination path.
    pub fn copy_into_bundle(
        &self,
        closure: &mut Closure,
        library: &Path,
        lib_dir: &Path,
    ) -> Result<PathBuf> {
        let file_name = library.file_name().ok_or_else(|| {
            BundleError::invalid_setting(
                "library",
                format!("{} has no file name", library.display()),
            )
        })?;
        let destination = lib_dir.join(file_name);
        if closure.visited.contains(&destination) {
            return Ok(destination);
        }

        if destination.exists() {
            debug!("{} already exists, not copying", destination.display());
        } else {
            self.shell.copy_file(library, &destination)?;
            closure.copied.push(destination.clone());
        }

        // Dry-run leaves the destination missing; read the source instead.
        let inspected = if destination.exists() {
            destination.clone()
        } else {
            library.to_path_buf()
        };
        self.examine(closure, &inspected, &destination, lib_dir)?;
        Ok(destination)
    }

    /// Edits that make every walked binary load its vendored libraries from `@rpath`.
    ///
    /// Only libraries inside `lib_dir` get a new install name.
    pub fn plan_rewrites(&self, closure: &Closure, lib_dir: &Path) -> RewritePlan {
        let mut plan = RewritePlan::default();

        for (binary, linkage) in &closure.linkage {
            let vendored_id = linkage
                .id
                .as_ref()
                .filter(|id| self.policy.is_vendored(id));
            if let (true, Some(id)) = (binary.parent() == Some(lib_dir), vendored_id) {
                plan.push(
                    binary,
                    Rewrite::SetId {
                        old_id: id.clone(),
                        new_id: rpath_reference(binary),
                    },
                );
            }

            for reference in &linkage.references {
                if self.policy.is_vendored(reference) {
                    plan.push(
                        binary,
                        Rewrite::ChangeReference {
                            old: reference.clone(),
                            new: rpath_reference(Path::new(reference)),
                        },
                    );
                }
            }
        }

        plan
    }

    /// Runs every edit in the plan, stopping at the first failure.
    pub fn apply_rewrites(&self, plan: &RewritePlan) -> Result<()> {
        for (binary, edits) in plan.iter() {
            for edit in edits {
                let result = match edit {
                    Rewrite::SetId { new_id, .. } => self.tools.set_id(binary, new_id),
                    Rewrite::ChangeReference { old, new } => {
                        self.tools.change_reference(binary, old, new)
                    }
                };
                result.map_err(|source| BundleError::Relocation {
                    binary: binary.to_path_buf(),
                    old_ref: edit.old_ref().to_string(),
                    new_ref: edit.new_ref().to_string(),
                    source: Box::new(source),
                })?;
            }
        }
        Ok(())
    }

    /// Relocates `roots` into `lib_dir`.
    ///
    /// Libraries already in `lib_dir` are walked first, then
    /// `extra_libraries` are copied in, then the roots are walked.
    pub fn process(
        &self,
        roots: &[PathBuf],
        extra_libraries: &[PathBuf],
        lib_dir: &Path,
    ) -> Result<RelocationReport> {
        self.shell.create_dir_all(lib_dir)?;
        let mut closure = Closure::default();

        for library in existing_libraries(lib_dir)? {
            self.walk(&mut closure, &library, lib_dir)?;
        }
        for library in extra_libraries {
            self.copy_into_bundle(&mut closure, library, lib_dir)?;
        }
        for root in roots {
            self.walk(&mut closure, root, lib_dir)?;
        }

        let plan = self.plan_rewrites(&closure, lib_dir);
        info!(
            "{} binaries examined, {} libraries copied, {} edits",
            closure.visited.len(),
            closure.copied.len(),
            plan.len()
        );
        self.apply_rewrites(&plan)?;

        Ok(RelocationReport {
            copied: closure.copied,
            visited: closure.visited.into_iter().collect(),
            plan,
        })
    }
}

/// `@rpath/<file name>`
fn rpath_reference(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("@rpath/{}", name)
}

/// `.dylib` files already in `lib_dir`, sorted.
fn existing_libraries(lib_dir: &Path) -> Result<Vec<PathBuf>> {
    if !lib_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut libraries = Vec::new();
    for entry in fs::read_dir(lib_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "dylib") {
            libraries.push(path);
        }
    }
    libraries.sort();
    Ok(libraries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use walkdir::WalkDir;

    /// In-memory load commands. A path seen for the first time inherits the
    /// linkage of a known binary with the same file name, the way a copy does.
    #[derive(Default)]
    struct FakeTools {
        binaries: RefCell<BTreeMap<PathBuf, Linkage>>,
        edits: RefCell<Vec<String>>,
        fail_on: Option<String>,
    }

    impl FakeTools {
        fn with_binary(self, path: &Path, id: Option<&str>, references: &[&str]) -> Self {
            self.binaries.borrow_mut().insert(
                path.to_path_buf(),
                Linkage {
                    id: id.map(str::to_string),
                    references: references.iter().map(|r| r.to_string()).collect(),
                },
            );
            self
        }

        fn lookup(&self, binary: &Path) -> Result<Linkage> {
            let mut binaries = self.binaries.borrow_mut();
            if let Some(linkage) = binaries.get(binary) {
                return Ok(linkage.clone());
            }
            let inherited = binaries
                .iter()
                .find(|(path, _)| path.file_name() == binary.file_name())
                .map(|(_, linkage)| linkage.clone())
                .ok_or_else(|| BundleError::ShellCommand {
                    command: format!("otool -L {}", binary.display()),
                    exit_code: Some(1),
                    stderr: "No such file or directory".into(),
                })?;
            binaries.insert(binary.to_path_buf(), inherited.clone());
            Ok(inherited)
        }

        fn edit(&self, binary: &Path, apply: impl FnOnce(&mut Linkage)) -> Result<()> {
            if self.fail_on.as_deref() == binary.file_name().and_then(|n| n.to_str()) {
                return Err(BundleError::ShellCommand {
                    command: "install_name_tool".into(),
                    exit_code: Some(1),
                    stderr: "header too small".into(),
                });
            }
            self.lookup(binary)?;
            let mut binaries = self.binaries.borrow_mut();
            if let Some(linkage) = binaries.get_mut(binary) {
                apply(linkage);
            }
            self.edits.borrow_mut().push(binary.display().to_string());
            Ok(())
        }
    }

    impl LinkTools for FakeTools {
        fn list_linkage(&self, binary: &Path) -> Result<String> {
            let linkage = self.lookup(binary)?;
            let mut text = format!("{}:\n", binary.display());
            for entry in linkage.id.iter().chain(&linkage.references) {
                text.push_str(&format!(
                    "\t{} (compatibility version 1.0.0, current version 1.0.0)\n",
                    entry
                ));
            }
            Ok(text)
        }

        fn set_id(&self, binary: &Path, new_id: &str) -> Result<()> {
            self.edit(binary, |linkage| linkage.id = Some(new_id.to_string()))
        }

        fn change_reference(&self, binary: &Path, old: &str, new: &str) -> Result<()> {
            self.edit(binary, |linkage| {
                for reference in &mut linkage.references {
                    if reference == old {
                        *reference = new.to_string();
                    }
                }
            })
        }
    }

    /// A bundle with `MacOS/` roots and a vendor tree of real files.
    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let fixture = Self {
                dir: tempfile::tempdir().unwrap(),
            };
            fs::create_dir_all(fixture.vendor()).unwrap();
            fs::create_dir_all(fixture.bundle().join("MacOS")).unwrap();
            fixture
        }

        fn vendor(&self) -> PathBuf {
            self.dir.path().join("vendor/lib")
        }

        fn bundle(&self) -> PathBuf {
            self.dir.path().join("app/Contents")
        }

        fn lib_dir(&self) -> PathBuf {
            self.bundle().join("Frameworks")
        }

        fn root(&self, name: &str) -> PathBuf {
            let path = self.bundle().join("MacOS").join(name);
            fs::write(&path, name).unwrap();
            path
        }

        /// Creates a vendored library file and returns its reference string.
        fn library(&self, name: &str) -> String {
            let path = self.vendor().join(name);
            fs::write(&path, format!("binary {}", name)).unwrap();
            path.display().to_string()
        }

        fn policy(&self) -> RelocationPolicy {
            RelocationPolicy::new(self.vendor()).with_prefix(self.dir.path().join("vendor"))
        }

        fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
            WalkDir::new(self.dir.path())
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| (entry.path().to_path_buf(), fs::read(entry.path()).unwrap()))
                .collect()
        }
    }

    const SYSTEM: &str = "/usr/lib/libSystem.B.dylib";

    #[test]
    fn test_discover_dependencies() {
        let fx = Fixture::new();
        let libz = fx.library("libz.dylib");
        let app = fx.root("app");
        let tools = FakeTools::default().with_binary(
            &app,
            None,
            &[libz.as_str(), SYSTEM, "@rpath/libq.dylib"],
        );

        let relocator = Relocator::new(tools, Shell::new()).with_policy(fx.policy());
        let deps = relocator.discover_dependencies(&app).unwrap();
        assert_eq!(deps, BTreeSet::from([libz]));
    }

    #[test]
    fn test_diamond_copies_once() {
        let fx = Fixture::new();
        let libz = fx.library("libz.dylib");
        let x = fx.root("x");
        let y = fx.root("y");
        let tools = FakeTools::default()
            .with_binary(&x, None, &[libz.as_str(), SYSTEM])
            .with_binary(&y, None, &[libz.as_str()])
            .with_binary(Path::new(&libz), Some(libz.as_str()), &[SYSTEM]);

        let relocator = Relocator::new(tools, Shell::new()).with_policy(fx.policy());
        let report = relocator
            .process(&[x.clone(), y.clone()], &[], &fx.lib_dir())
            .unwrap();

        let copied_z = fx.lib_dir().join("libz.dylib");
        assert_eq!(report.copied, vec![copied_z.clone()]);
        assert_eq!(report.visited.len(), 3);
        assert_eq!(fs::read(&copied_z).unwrap(), b"binary libz.dylib");

        assert_eq!(
            report.plan.get(&copied_z),
            &[Rewrite::SetId {
                old_id: libz.clone(),
                new_id: "@rpath/libz.dylib".into(),
            }]
        );
        for root in [&x, &y] {
            assert_eq!(
                report.plan.get(root),
                &[Rewrite::ChangeReference {
                    old: libz.clone(),
                    new: "@rpath/libz.dylib".into(),
                }]
            );
        }
        assert_eq!(report.plan.len(), 3);
    }

    #[test]
    fn test_system_libraries_untouched() {
        let fx = Fixture::new();
        let libz = fx.library("libz.dylib");
        let app = fx.root("app");
        let tools = FakeTools::default()
            .with_binary(&app, None, &[SYSTEM, libz.as_str()])
            .with_binary(Path::new(&libz), Some(libz.as_str()), &[SYSTEM]);

        let relocator = Relocator::new(tools, Shell::new()).with_policy(fx.policy());
        let report = relocator.process(&[app], &[], &fx.lib_dir()).unwrap();

        assert!(!fx.lib_dir().join("libSystem.B.dylib").exists());
        assert!(
            report
                .plan
                .iter()
                .flat_map(|(_, edits)| edits)
                .all(|edit| edit.old_ref() != SYSTEM)
        );
    }

    #[test]
    fn test_transitive_and_bare_references() {
        let fx = Fixture::new();
        let liba = fx.library("liba.dylib");
        let libb = fx.library("libb.dylib");
        let app = fx.root("app");
        let tools = FakeTools::default()
            .with_binary(&app, None, &[liba.as_str()])
            .with_binary(Path::new(&liba), Some(liba.as_str()), &["libb.dylib"])
            .with_binary(Path::new(&libb), Some("libb.dylib"), &[]);

        let relocator = Relocator::new(tools, Shell::new()).with_policy(fx.policy());
        let report = relocator.process(&[app], &[], &fx.lib_dir()).unwrap();

        let copied_a = fx.lib_dir().join("liba.dylib");
        let copied_b = fx.lib_dir().join("libb.dylib");
        assert_eq!(report.copied, vec![copied_a.clone(), copied_b.clone()]);
        assert!(report.plan.get(&copied_a).contains(&Rewrite::ChangeReference {
            old: "libb.dylib".into(),
            new: "@rpath/libb.dylib".into(),
        }));
        assert!(report.plan.get(&copied_b).contains(&Rewrite::SetId {
            old_id: "libb.dylib".into(),
            new_id: "@rpath/libb.dylib".into(),
        }));
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let fx = Fixture::new();
        let liba = fx.library("liba.dylib");
        let libb = fx.library("libb.dylib");
        let app = fx.root("app");
        let tools = FakeTools::default()
            .with_binary(&app, None, &[liba.as_str(), libb.as_str(), SYSTEM])
            .with_binary(Path::new(&liba), Some(liba.as_str()), &[libb.as_str()])
            .with_binary(Path::new(&libb), Some(libb.as_str()), &[SYSTEM]);

        let relocator = Relocator::new(tools, Shell::new()).with_policy(fx.policy());
        let first = relocator
            .process(std::slice::from_ref(&app), &[], &fx.lib_dir())
            .unwrap();
        assert!(!first.plan.is_empty());
        let edits_after_first = relocator.tools().edits.borrow().len();
        let before = fx.snapshot();

        let second = relocator.process(&[app], &[], &fx.lib_dir()).unwrap();

        assert!(second.plan.is_empty());
        assert!(second.copied.is_empty());
        assert_eq!(relocator.tools().edits.borrow().len(), edits_after_first);
        assert_eq!(fx.snapshot(), before);
    }

    #[test]
    fn test_extra_and_existing_libraries() {
        let fx = Fixture::new();
        let libextra = fx.library("libextra.dylib");
        fs::create_dir_all(fx.lib_dir()).unwrap();
        let existing = fx.lib_dir().join("libexisting.dylib");
        fs::write(&existing, b"placed by another tool").unwrap();
        fs::write(fx.lib_dir().join("README"), b"not a library").unwrap();

        let tools = FakeTools::default()
            .with_binary(
                &existing,
                Some("/usr/local/lib/libexisting.dylib"),
                &[libextra.as_str()],
            )
            .with_binary(Path::new(&libextra), Some(libextra.as_str()), &[]);

        let relocator = Relocator::new(tools, Shell::new())
            .with_policy(fx.policy().with_prefix("/usr/local/"));
        let report = relocator
            .process(&[], &[PathBuf::from(&libextra)], &fx.lib_dir())
            .unwrap();

        let copied = fx.lib_dir().join("libextra.dylib");
        assert_eq!(report.copied, vec![copied.clone()]);
        assert_eq!(
            report.plan.get(&existing),
            &[
                Rewrite::SetId {
                    old_id: "/usr/local/lib/libexisting.dylib".into(),
                    new_id: "@rpath/libexisting.dylib".into(),
                },
                Rewrite::ChangeReference {
                    old: libextra.clone(),
                    new: "@rpath/libextra.dylib".into(),
                },
            ]
        );
        assert!(!report.visited.contains(&fx.lib_dir().join("README")));
    }

    #[test]
    fn test_dry_run_plans_without_copying() {
        let fx = Fixture::new();
        let libz = fx.library("libz.dylib");
        let app = fx.root("app");
        let tools = FakeTools::default()
            .with_binary(&app, None, &[libz.as_str()])
            .with_binary(Path::new(&libz), Some(libz.as_str()), &[]);
        let shell = Shell::new().with_dry_run(true).with_transcript();

        let relocator = Relocator::new(tools, shell.clone()).with_policy(fx.policy());
        let report = relocator.process(&[app], &[], &fx.lib_dir()).unwrap();

        assert!(!fx.lib_dir().exists());
        let copied_z = fx.lib_dir().join("libz.dylib");
        assert_eq!(report.copied, vec![copied_z.clone()]);
        assert_eq!(report.plan.get(&copied_z).len(), 1);
        assert!(shell.transcript().iter().any(|line| line.starts_with("cp ")));
    }

    #[test]
    fn test_failed_edit_names_binary_and_references() {
        let fx = Fixture::new();
        let libz = fx.library("libz.dylib");
        let app = fx.root("app");
        let tools = FakeTools {
            fail_on: Some("app".into()),
            ..Default::default()
        }
        .with_binary(&app, None, &[libz.as_str()])
        .with_binary(Path::new(&libz), None, &[]);

        let relocator = Relocator::new(tools, Shell::new()).with_policy(fx.policy());
        let err = relocator.process(&[app.clone()], &[], &fx.lib_dir()).unwrap_err();

        assert_eq!(err.kind(), "RelocationError");
        match err {
            BundleError::Relocation {
                binary,
                old_ref,
                new_ref,
                ..
            } => {
                assert_eq!(binary, app);
                assert_eq!(old_ref, libz);
                assert_eq!(new_ref, "@rpath/libz.dylib");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_plan_is_ordered_and_deduplicated() {
        let mut plan = RewritePlan::default();
        let edit = Rewrite::ChangeReference {
            old: "libz.dylib".into(),
            new: "@rpath/libz.dylib".into(),
        };
        plan.push(Path::new("/b/y"), edit.clone());
        plan.push(Path::new("/b/x"), edit.clone());
        plan.push(Path::new("/b/x"), edit);

        assert_eq!(plan.len(), 2);
        let binaries: Vec<&Path> = plan.iter().map(|(binary, _)| binary).collect();
        assert_eq!(binaries, vec![Path::new("/b/x"), Path::new("/b/y")]);
    }
}
