// src/exec/command.rs

//! Command description: argument vector, environment overlay, working
//! directory and the optional low-level configuration hook.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use crate::errors::{ExecError, Result};

/// Shell used by [`CommandSpec::shell`].
pub const SHELL: &str = "/bin/sh";

/// Search path used when neither the overlay nor this process sets `PATH`.
const FALLBACK_PATH: &str = "/bin:/usr/bin";

/// Caller-supplied hook applied to the `tokio::process::Command` after every
/// other setting, so it can override arguments, environment or directory.
///
/// Stdio is always bound afterwards by the launcher.
pub type ConfigHook = Arc<dyn Fn(&mut Command) + Send + Sync>;

/// Everything needed to start one process.
///
/// Built with the chained setters below and then handed to
/// [`crate::exec::launch`] by reference; a spec can be launched many times.
#[derive(Clone, Default)]
pub struct CommandSpec {
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    staging_threshold: Option<usize>,
    hook: Option<ConfigHook>,
}

impl CommandSpec {
    /// Create a spec for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            args: vec![program.into()],
            ..Self::default()
        }
    }

    /// Create a spec from a full argument vector (program first).
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Split `text` on runs of whitespace and use the tokens as the argument
    /// vector.
    ///
    /// This is not a shell parser: quotes and escapes are kept verbatim inside
    /// the tokens. Use [`CommandSpec::shell`] when shell syntax is needed.
    pub fn parse(text: &str) -> Self {
        Self::from_args(tokenize(text))
    }

    /// Run `text` through `/bin/sh -c`.
    pub fn shell(text: impl Into<String>) -> Self {
        Self::from_args([SHELL.to_string(), "-c".to_string(), text.into()])
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Override one environment variable (merged over the inherited env).
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Override multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kill the process if it has not exited after `duration`.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Stage literal text inputs of at most `bytes` through a temporary file
    /// instead of a pipe.
    pub fn staging_threshold(mut self, bytes: usize) -> Self {
        self.staging_threshold = Some(bytes);
        self
    }

    /// Install the low-level configuration hook.
    pub fn configure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Command) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    pub fn env_overrides(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn current_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn staging_limit(&self) -> Option<usize> {
        self.staging_threshold
    }

    /// Check that the program can be found and the working directory exists,
    /// without starting anything.
    ///
    /// Runs before any stdio is bound, so a command that cannot start leaves
    /// input and output files untouched. Lookup follows the child's view: a
    /// `PATH` in the overlay wins over the inherited one, and relative paths
    /// resolve against the working directory. A configuration hook may change
    /// either, so specs with a hook are left to the OS to judge.
    pub(crate) fn check_launchable(&self) -> Result<()> {
        let program = self.program().ok_or(ExecError::EmptyCommand)?;
        if self.hook.is_some() {
            return Ok(());
        }

        let not_found = |what: &str| ExecError::LaunchFailed {
            program: program.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, what.to_string()),
        };

        if let Some(ref dir) = self.working_dir {
            if !dir.is_dir() {
                return Err(not_found(&format!(
                    "working directory {} does not exist",
                    dir.display()
                )));
            }
        }

        let found = if program.contains('/') {
            self.resolve(Path::new(program)).is_file()
        } else {
            std::env::split_paths(&self.search_path())
                .any(|dir| self.resolve(&dir).join(program).is_file())
        };

        if found {
            Ok(())
        } else {
            Err(not_found("program not found"))
        }
    }

    fn search_path(&self) -> OsString {
        match self.env.get("PATH") {
            Some(path) => OsString::from(path),
            None => std::env::var_os("PATH").unwrap_or_else(|| OsString::from(FALLBACK_PATH)),
        }
    }

    /// `path` as the child would see it from its working directory.
    fn resolve(&self, path: &Path) -> PathBuf {
        let path = if path.as_os_str().is_empty() {
            Path::new(".")
        } else {
            path
        };
        match self.working_dir {
            Some(ref dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Build the OS process descriptor.
    ///
    /// Environment overrides are layered on top of the inherited environment;
    /// the hook runs last. Stdio is left untouched.
    pub(crate) fn to_command(&self) -> Result<Command> {
        let (program, rest) = self.args.split_first().ok_or(ExecError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(rest);
        cmd.envs(&self.env);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }

        // Never leave an orphan behind if the handle is dropped mid-flight.
        cmd.kill_on_drop(true);

        if let Some(ref hook) = self.hook {
            hook(&mut cmd);
        }

        Ok(cmd)
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("args", &self.args)
            .field("env", &self.env)
            .field("working_dir", &self.working_dir)
            .field("timeout", &self.timeout)
            .field("staging_threshold", &self.staging_threshold)
            .field("hook", &self.hook.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args.join(" "))
    }
}

/// Split a command line on runs of whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_whitespace_runs() {
        let spec = CommandSpec::parse("  wc   -l\t-c \n");
        assert_eq!(spec.argv(), ["wc", "-l", "-c"]);
        assert_eq!(spec.program(), Some("wc"));
    }

    #[test]
    fn parse_keeps_quotes_verbatim() {
        let spec = CommandSpec::parse(r#"echo "a b""#);
        assert_eq!(spec.argv(), ["echo", "\"a", "b\""]);
    }

    #[test]
    fn parse_of_blank_text_has_no_program() {
        let spec = CommandSpec::parse("   ");
        assert_eq!(spec.program(), None);
        assert!(matches!(spec.to_command(), Err(ExecError::EmptyCommand)));
    }

    #[test]
    fn shell_wraps_text_in_sh_c() {
        let spec = CommandSpec::shell("echo $HOME | wc -c");
        assert_eq!(spec.argv(), ["/bin/sh", "-c", "echo $HOME | wc -c"]);
    }

    #[test]
    fn later_env_overrides_win() {
        let spec = CommandSpec::new("env")
            .env("A", "1")
            .envs([("A", "2"), ("B", "3")]);
        assert_eq!(spec.env_overrides().get("A").map(String::as_str), Some("2"));
        assert_eq!(spec.env_overrides().len(), 2);
    }

    #[test]
    fn programs_on_path_are_launchable() {
        assert!(CommandSpec::new("sh").check_launchable().is_ok());
        assert!(CommandSpec::shell("exit 0").check_launchable().is_ok());
    }

    #[test]
    fn missing_program_is_caught_before_spawn() {
        match CommandSpec::new("procpipe-no-such-program").check_launchable() {
            Err(ExecError::LaunchFailed { program, source }) => {
                assert_eq!(program, "procpipe-no-such-program");
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected LaunchFailed, got {other:?}"),
        }
        assert!(CommandSpec::new("/no/such/dir/prog").check_launchable().is_err());
    }

    #[test]
    fn overlay_path_is_searched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("local-tool"), "#!/bin/sh\n").unwrap();

        let spec = CommandSpec::new("local-tool").env("PATH", dir.path().display().to_string());
        assert!(spec.check_launchable().is_ok());
        assert!(CommandSpec::new("local-tool").check_launchable().is_err());
    }

    #[test]
    fn relative_program_resolves_against_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run.sh"), "#!/bin/sh\n").unwrap();

        let spec = CommandSpec::new("./run.sh").working_dir(dir.path());
        assert!(spec.check_launchable().is_ok());
    }

    #[test]
    fn missing_working_dir_is_a_launch_failure() {
        let spec = CommandSpec::new("true").working_dir("/definitely/not/a/dir");
        assert!(matches!(
            spec.check_launchable(),
            Err(ExecError::LaunchFailed { ref source, .. }) if source.kind() == io::ErrorKind::NotFound
        ));
    }

    #[test]
    fn hooked_specs_are_not_checked() {
        let spec = CommandSpec::new("procpipe-no-such-program").configure(|_| {});
        assert!(spec.check_launchable().is_ok());
    }

    #[test]
    fn display_joins_arguments() {
        let spec = CommandSpec::new("ls").arg("-l").args(["-a", "/tmp"]);
        assert_eq!(spec.to_string(), "ls -l -a /tmp");
    }
}
