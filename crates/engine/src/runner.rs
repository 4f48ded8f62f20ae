//! Logged, dry-run aware process and file operations.
//!
//! Every external tool is invoked with an explicit argument list, never
//! through a shell string. Operations that change the system (`run`, the file
//! helpers) are skipped in dry-run mode; inspection (`inspect`) always executes.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use pybundle_core::interpolation::{InterpolationContext, interpolate, interpolate_vec};
use pybundle_core::{BundleError, Result};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedProcess {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CompletedProcess {
    /// The result reported for a command skipped in dry-run mode.
    fn skipped() -> Self {
        Self::default()
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A single command line with its optional environment, directory and timeout.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for this call only.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Kills the process if it runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Replaces `${key}` placeholders in arguments and environment values.
    pub fn substitute(mut self, ctx: &InterpolationContext) -> Result<Self> {
        self.args = interpolate_vec(&self.args, ctx)?;
        for value in self.env.values_mut() {
            *value = interpolate(value, ctx)?;
        }
        Ok(self)
    }

    /// The command line as shown in logs and errors.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push('\'');
                line.push_str(arg);
                line.push('\'');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Process and file operations shared by build steps and relocation.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    dry_run: bool,
    timeout: Option<Duration>,
    transcript: Option<Rc<RefCell<Vec<String>>>>,
}

impl Shell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables dry run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets a timeout applied to calls that do not carry their own.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Records every mutating operation, whether or not it is executed.
    /// Clones of this shell share the record.
    pub fn with_transcript(mut self) -> Self {
        self.transcript = Some(Rc::default());
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Mutating operations recorded so far, in order.
    pub fn transcript(&self) -> Vec<String> {
        self.transcript
            .as_ref()
            .map(|t| t.borrow().clone())
            .unwrap_or_default()
    }

    /// Logs a mutating operation and reports whether it should actually run.
    fn announce(&self, operation: String) -> bool {
        if self.dry_run {
            info!("[dry-run] {}", operation);
        } else {
            info!("{}", operation);
        }
        if let Some(transcript) = &self.transcript {
            transcript.borrow_mut().push(operation);
        }
        !self.dry_run
    }

    /// Resolves a program name against `PATH`.
    pub fn locate(program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    /// Runs a mutating command, substituting `${key}` placeholders in `args`.
    pub fn run<S: AsRef<str>>(
        &self,
        program: &str,
        args: &[S],
        substitutions: &InterpolationContext,
    ) -> Result<CompletedProcess> {
        let invocation = Invocation::new(program)
            .args(args.iter().map(|a| a.as_ref().to_string()))
            .substitute(substitutions)?;
        self.run_invocation(&invocation)
    }

    /// Runs a mutating invocation. Skipped in dry-run mode.
    pub fn run_invocation(&self, invocation: &Invocation) -> Result<CompletedProcess> {
        if !self.announce(format!("$ {}", invocation.command_line())) {
            return Ok(CompletedProcess::skipped());
        }
        self.execute(invocation)
    }

    /// Runs a read-only command. Executes even in dry-run mode.
    pub fn inspect<S: AsRef<str>>(&self, program: &str, args: &[S]) -> Result<CompletedProcess> {
        let invocation = Invocation::new(program).args(args.iter().map(|a| a.as_ref().to_string()));
        self.inspect_invocation(&invocation)
    }

    pub fn inspect_invocation(&self, invocation: &Invocation) -> Result<CompletedProcess> {
        debug!("$ {}", invocation.command_line());
        self.execute(invocation)
    }

    fn execute(&self, invocation: &Invocation) -> Result<CompletedProcess> {
        let command_line = invocation.command_line();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| BundleError::ShellCommand {
            command: command_line.clone(),
            exit_code: None,
            stderr: e.to_string(),
        })?;

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let status = match invocation.timeout.or(self.timeout) {
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!("{} timed out after {:?}", command_line, timeout);
                    return Err(BundleError::ShellCommand {
                        command: command_line,
                        exit_code: None,
                        stderr: format!("timed out after {} seconds", timeout.as_secs_f64()),
                    });
                }
            },
            None => child.wait()?,
        };

        let result = CompletedProcess {
            stdout: stdout.map(join_output).unwrap_or_default(),
            stderr: stderr.map(join_output).unwrap_or_default(),
            exit_code: status.code().unwrap_or(-1),
        };

        for line in result.stdout.lines() {
            debug!("[{}] {}", invocation.program, line);
        }

        if status.success() {
            Ok(result)
        } else {
            for line in result.stderr.lines() {
                warn!("[{}] {}", invocation.program, line);
            }
            Err(BundleError::ShellCommand {
                command: command_line,
                exit_code: status.code(),
                stderr: result.stderr,
            })
        }
    }

    // ========================================================================
    // File operations
    // ========================================================================

    pub fn create_dir_all(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            return Ok(());
        }
        if !self.announce(format!("mkdir -p {}", path.display())) {
            return Ok(());
        }
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    /// Copies a file and makes the copy writable (mode `0o644`).
    pub fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if !self.announce(format!("cp {} {}", from.display(), to.display())) {
            return Ok(());
        }
        std::fs::copy(from, to).map_err(|e| BundleError::FileRead {
            path: from.to_path_buf(),
            source: e,
        })?;
        self.chmod(to, 0o644)
    }

    /// Removes a file or a directory tree. A missing path is not an error.
    pub fn remove(&self, path: &Path) -> Result<()> {
        let Ok(metadata) = std::fs::symlink_metadata(path) else {
            return Ok(());
        };
        if !self.announce(format!("rm -rf {}", path.display())) {
            return Ok(());
        }
        if metadata.is_dir() {
            std::fs::remove_dir_all(path)?;
        } else {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    #[cfg(unix)]
    pub fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        if !self.announce(format!("chmod {:o} {}", mode, path.display())) {
            return Ok(());
        }
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn chmod(&self, path: &Path, mode: u32) -> Result<()> {
        if self.announce(format!("chmod {:o} {}", mode, path.display())) {
            debug!("chmod ignored on this platform: {}", path.display());
        }
        Ok(())
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_output(handle: thread::JoinHandle<Vec<u8>>) -> String {
    handle
        .join()
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_echo() {
        let shell = Shell::new();
        let result = shell
            .run("echo", &["hello"], &InterpolationContext::new())
            .unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn test_run_substitutes_placeholders() {
        let shell = Shell::new();
        let ctx = InterpolationContext::new().with_value("prefix", "/opt/xz");
        let result = shell.run("echo", &["--prefix=${prefix}"], &ctx).unwrap();
        assert_eq!(result.stdout.trim(), "--prefix=/opt/xz");

        let err = shell.run("echo", &["${unknown}"], &ctx).unwrap_err();
        assert_eq!(err.kind(), "InterpolationError");
    }

    #[test]
    fn test_failing_command() {
        let shell = Shell::new();
        let err = shell
            .run("sh", &["-c", "echo oops >&2; exit 42"], &InterpolationContext::new())
            .unwrap_err();

        match err {
            BundleError::ShellCommand {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(42));
                assert!(stderr.contains("oops"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program() {
        let shell = Shell::new();
        let err = shell
            .inspect("pybundle-no-such-tool", &["-L"])
            .unwrap_err();
        assert!(matches!(
            err,
            BundleError::ShellCommand {
                exit_code: None,
                ..
            }
        ));
    }

    #[test]
    fn test_dry_run_skips_mutation_but_not_inspection() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let shell = Shell::new().with_dry_run(true);

        let result = shell
            .run(
                "touch",
                &[marker.to_string_lossy().as_ref()],
                &InterpolationContext::new(),
            )
            .unwrap();
        assert!(result.success());
        assert!(result.stdout.is_empty());
        assert!(!marker.exists());

        let result = shell.inspect("echo", &["visible"]).unwrap();
        assert_eq!(result.stdout.trim(), "visible");
    }

    #[test]
    fn test_invocation_env_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let shell = Shell::new();
        let invocation = Invocation::new("sh")
            .args(["-c", "echo $MACOSX_DEPLOYMENT_TARGET; pwd"])
            .env("MACOSX_DEPLOYMENT_TARGET", "10.13")
            .current_dir(dir.path());

        let result = shell.run_invocation(&invocation).unwrap();
        let mut lines = result.stdout.lines();
        assert_eq!(lines.next(), Some("10.13"));
        let pwd = PathBuf::from(lines.next().unwrap());
        assert_eq!(
            pwd.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_timeout_kills_process() {
        let shell = Shell::new();
        let invocation = Invocation::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(100));

        let err = shell.run_invocation(&invocation).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_file_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let shell = Shell::new();

        let nested = dir.path().join("a/b");
        shell.create_dir_all(&nested).unwrap();
        assert!(nested.is_dir());

        let source = dir.path().join("libfoo.dylib");
        std::fs::write(&source, b"binary").unwrap();
        let dest = nested.join("libfoo.dylib");
        shell.copy_file(&source, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"binary");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }

        shell.remove(&dir.path().join("a")).unwrap();
        assert!(!nested.exists());
        shell.remove(&dir.path().join("missing")).unwrap();
    }

    #[test]
    fn test_dry_run_file_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let shell = Shell::new().with_dry_run(true);

        let source = dir.path().join("libfoo.dylib");
        std::fs::write(&source, b"binary").unwrap();

        shell.create_dir_all(&dir.path().join("new")).unwrap();
        shell
            .copy_file(&source, &dir.path().join("copy.dylib"))
            .unwrap();
        shell.remove(&source).unwrap();

        assert!(!dir.path().join("new").exists());
        assert!(!dir.path().join("copy.dylib").exists());
        assert!(source.exists());
    }

    #[test]
    fn test_transcript_is_shared_by_clones() {
        let dir = tempfile::tempdir().unwrap();
        let shell = Shell::new().with_dry_run(true).with_transcript();
        let clone = shell.clone();

        clone
            .run("make", &["install"], &InterpolationContext::new())
            .unwrap();
        shell.remove(dir.path()).unwrap();
        shell.inspect("echo", &["not recorded"]).unwrap();

        assert_eq!(
            shell.transcript(),
            vec![
                "$ make install".to_string(),
                format!("rm -rf {}", dir.path().display()),
            ]
        );
        assert!(dir.path().exists());
    }

    #[test]
    fn test_chmod_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("libpython3.9.dylib");
        std::fs::write(&lib, b"binary").unwrap();

        let dry = Shell::new().with_dry_run(true).with_transcript();
        dry.chmod(&lib, 0o755).unwrap();
        assert_eq!(dry.transcript(), vec![format!("chmod 755 {}", lib.display())]);

        let shell = Shell::new().with_transcript();
        let copy = dir.path().join("copy.dylib");
        shell.copy_file(&lib, &copy).unwrap();
        assert_eq!(
            shell.transcript(),
            vec![
                format!("cp {} {}", lib.display(), copy.display()),
                format!("chmod 644 {}", copy.display()),
            ]
        );
    }

    #[test]
    fn test_command_line_quotes_whitespace() {
        let invocation = Invocation::new("tar").args(["-C", "my dir", "-xf", "a.tgz"]);
        assert_eq!(invocation.command_line(), "tar -C 'my dir' -xf a.tgz");
    }
}
