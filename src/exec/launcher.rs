// src/exec/launcher.rs

//! Process launcher.
//!
//! [`spawn`] binds stdin/stdout, starts the child and its stdin feed;
//! [`LaunchHandle::finish`] starts the stdout/stderr collectors, waits
//! (draining stdout concurrently), joins every pump and builds the
//! [`ProcessResult`]. [`launch`] does both. [`LaunchHandle::handle`] hands the
//! raw output pipes to caller-supplied consumers instead.

use std::future::Future;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::command::CommandSpec;
use super::input::{InputSource, bind_input};
use super::output::{ByteSink, OutputBinding, OutputTarget, bind_output};
use super::pump::{self, PumpFailure, PumpKind};
use super::result::{HandledExit, OutputHandle, ProcessResult};
use crate::errors::{ExecError, Result};

/// Exit code reported when the OS gives none (killed by a signal).
pub const SIGNALLED_EXIT_CODE: i32 = -1;

/// How long the stdin feed may keep running once the child has exited.
const FEED_GRACE: Duration = Duration::from_millis(100);

enum StdoutPump<'a> {
    /// Stdout went straight to a file.
    Redirected,
    /// Piped, not yet claimed by a collector or a caller's consumer.
    Pending(ChildStdout),
    /// Collected in memory by a background task.
    Captured(JoinHandle<io::Result<Vec<u8>>>),
    /// Copied into a borrowed sink while waiting. `pipe` is taken by the wait.
    Drain {
        pipe: Option<ChildStdout>,
        sink: ByteSink<'a>,
        failure: Option<io::Error>,
    },
}

/// Everything `finish` gathers before applying the pump-failure policy.
struct Collected {
    code: i32,
    stdout: Option<Vec<u8>>,
    stderr: Vec<u8>,
    failures: Vec<(PumpKind, io::Error)>,
}

/// A running (or finished, not yet collected) child process.
///
/// The stdin feed runs from spawn. Stdout and stderr collectors start on the
/// first [`LaunchHandle::wait`] or [`LaunchHandle::finish`], unless
/// [`LaunchHandle::handle`] claimed the pipes first.
///
/// Dropping the handle before it is finished kills the child.
pub struct LaunchHandle<'a> {
    program: String,
    child: Child,
    pid: Option<u32>,
    /// Configured timeout and the instant it runs out.
    timeout: Option<(Duration, Instant)>,
    feed: Option<JoinHandle<io::Result<u64>>>,
    stderr_pipe: Option<ChildStderr>,
    stderr: Option<JoinHandle<io::Result<Vec<u8>>>>,
    stdout: StdoutPump<'a>,
    status: Option<ExitStatus>,
    _staged: Option<NamedTempFile>,
}

/// Bind stdio, start the process and its stdin feed.
///
/// The program and working directory are checked, and input and output are
/// resolved, before anything is spawned: a command that cannot start never
/// leaves a child behind and never truncates an existing output file.
pub fn spawn<'a>(
    spec: &CommandSpec,
    input: InputSource,
    output: OutputTarget<'a>,
) -> Result<LaunchHandle<'a>> {
    let program = spec.program().ok_or(ExecError::EmptyCommand)?.to_string();

    debug!(
        command = %spec,
        input = input.kind(),
        output = output.kind(),
        "command to execute"
    );

    spec.check_launchable()?;

    let bound_in = bind_input(input, spec.staging_limit())?;
    let bound_out = bind_output(output)?;

    let mut cmd = spec.to_command()?;
    cmd.stdin(bound_in.stdio)
        .stdout(bound_out.stdio)
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ExecError::LaunchFailed {
        program: program.clone(),
        source,
    })?;
    let pid = child.id();

    info!(program = %program, pid, "process started");

    // Stdin feed first, so the child always has a reader for its output
    // and a writer for its input at the same time.
    let feed = match (bound_in.feed, child.stdin.take()) {
        (Some(source), Some(stdin)) => Some(pump::spawn_feed(source, stdin)),
        (Some(_), None) => {
            warn!(program = %program, "stdin pipe unavailable; input dropped");
            None
        }
        (None, _) => None,
    };

    let stdout = match bound_out.binding {
        OutputBinding::Redirect => StdoutPump::Redirected,
        OutputBinding::Capture => match child.stdout.take() {
            Some(pipe) => StdoutPump::Pending(pipe),
            None => StdoutPump::Redirected,
        },
        OutputBinding::Drain(sink) => StdoutPump::Drain {
            pipe: child.stdout.take(),
            sink,
            failure: None,
        },
    };

    Ok(LaunchHandle {
        program,
        pid,
        timeout: spec
            .timeout_duration()
            .and_then(|after| Some((after, Instant::now().checked_add(after)?))),
        feed,
        stderr_pipe: child.stderr.take(),
        stderr: None,
        stdout,
        status: None,
        child,
        _staged: bound_in.staged,
    })
}

/// Run `spec` to completion.
///
/// A nonzero exit is reported in the returned [`ProcessResult`], not as an
/// error.
pub async fn launch(
    spec: &CommandSpec,
    input: InputSource,
    output: OutputTarget<'_>,
) -> Result<ProcessResult> {
    spawn(spec, input, output)?.finish().await
}

/// Like [`launch`], but any failure (including a nonzero exit) comes back as
/// an error.
///
/// Returns the captured stdout when `output` is [`OutputTarget::Absent`], and
/// `None` when stdout went to a file or sink.
pub async fn try_launch(
    spec: &CommandSpec,
    input: InputSource,
    output: OutputTarget<'_>,
) -> Result<Option<OutputHandle>> {
    let result = launch(spec, input, output).await?;
    if result.success() {
        return Ok(result.into_success_stream());
    }

    Err(ExecError::NonZeroExit {
        program: spec.program().unwrap_or_default().to_string(),
        code: result.exit_code(),
        stderr: result.error_text().unwrap_or_default(),
    })
}

impl<'a> LaunchHandle<'a> {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Exit code, if [`LaunchHandle::wait`] already completed.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.map(exit_code_of)
    }

    /// Wait for the process to exit and return its exit code.
    ///
    /// Stdout is drained into a sink target while waiting. Calling this again
    /// returns the cached code without waiting on the OS a second time.
    pub async fn wait(&mut self) -> Result<i32> {
        self.start_collectors();

        let deadline = self.deadline();
        match before_deadline(deadline, self.wait_untimed()).await {
            Some(outcome) => outcome,
            None => Err(self.abort_on_timeout().await),
        }
    }

    /// Wait, join every pump and build the result.
    ///
    /// The timeout covers the pumps too: a background grandchild holding the
    /// output pipes open cannot stretch the launch past it. A pump failure on
    /// a successful process is kept as an annotation on the result; on a
    /// failed process it becomes the returned error.
    pub async fn finish(mut self) -> Result<ProcessResult> {
        self.start_collectors();

        let deadline = self.deadline();
        let collected = match before_deadline(deadline, self.collect()).await {
            Some(outcome) => outcome?,
            None => return Err(self.abort_on_timeout().await),
        };

        let Collected {
            code,
            stdout,
            stderr,
            failures,
        } = collected;
        let annotations = settle_failures(&self.program, code, failures)?;

        Ok(ProcessResult::from_exit(code, stdout, stderr, annotations))
    }

    /// Run caller-supplied consumers over the raw stdout and stderr pipes
    /// while the process executes, then wait for it.
    ///
    /// Each consumer runs on its own task, concurrently with the stdin feed
    /// and with each other. A consumer only runs if its pipe is still
    /// unclaimed: stdout bound to a file or sink, or pipes already taken by
    /// an earlier `wait`, leave the matching field of [`HandledExit`] `None`.
    /// A consumer error is a pump failure, under the same policy as
    /// [`LaunchHandle::finish`]. The timeout covers the consumers.
    pub async fn handle<FO, FutO, O, FE, FutE, E>(
        mut self,
        on_stdout: FO,
        on_stderr: FE,
    ) -> Result<HandledExit<O, E>>
    where
        FO: FnOnce(ChildStdout) -> FutO,
        FutO: Future<Output = io::Result<O>> + Send + 'static,
        O: Send + 'static,
        FE: FnOnce(ChildStderr) -> FutE,
        FutE: Future<Output = io::Result<E>> + Send + 'static,
        E: Send + 'static,
    {
        let mut stdout_task = match std::mem::replace(&mut self.stdout, StdoutPump::Redirected) {
            StdoutPump::Pending(pipe) => Some(tokio::spawn(on_stdout(pipe))),
            other => {
                self.stdout = other;
                None
            }
        };
        let mut stderr_task = self.stderr_pipe.take().map(|pipe| tokio::spawn(on_stderr(pipe)));

        let deadline = self.deadline();
        let settled = before_deadline(
            deadline,
            self.collect_handled(&mut stdout_task, &mut stderr_task),
        )
        .await;

        match settled {
            Some(outcome) => outcome,
            None => {
                if let Some(task) = stdout_task {
                    task.abort();
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                Err(self.abort_on_timeout().await)
            }
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|(_, at)| at)
    }

    /// Claim any still-unclaimed output pipe with an in-memory collector.
    fn start_collectors(&mut self) {
        if let Some(pipe) = self.stderr_pipe.take() {
            self.stderr = Some(pump::spawn_collect(pipe));
        }
        self.stdout = match std::mem::replace(&mut self.stdout, StdoutPump::Redirected) {
            StdoutPump::Pending(pipe) => StdoutPump::Captured(pump::spawn_collect(pipe)),
            other => other,
        };
    }

    async fn wait_untimed(&mut self) -> Result<i32> {
        if let Some(status) = self.status {
            return Ok(exit_code_of(status));
        }

        let status = self.wait_draining().await?;
        let code = exit_code_of(status);
        info!(
            program = %self.program,
            pid = self.pid,
            exit_code = code,
            success = status.success(),
            "process exited"
        );

        self.status = Some(status);
        Ok(code)
    }

    async fn wait_draining(&mut self) -> Result<ExitStatus> {
        let Self { child, stdout, .. } = self;

        let status = match stdout {
            StdoutPump::Drain { pipe, sink, failure } => match pipe.take() {
                Some(mut pipe) => {
                    let (status, drained) = tokio::join!(child.wait(), pump::drain(&mut pipe, &mut **sink));
                    match drained {
                        Ok(bytes) => debug!(bytes, "stdout drained into sink"),
                        Err(e) => *failure = Some(e),
                    }
                    status?
                }
                None => child.wait().await?,
            },
            _ => child.wait().await?,
        };

        Ok(status)
    }

    /// Stop the stdin feed once the child is gone. Whatever it had not
    /// delivered yet has no reader any more.
    async fn settle_feed(&mut self, failures: &mut Vec<(PumpKind, io::Error)>) {
        let Some(feed) = self.feed.as_mut() else {
            return;
        };

        let joined = pump::join_within(feed, FEED_GRACE).await;
        self.feed = None;

        match joined {
            Some(Ok(_)) => {}
            Some(Err(e)) => failures.push((PumpKind::Stdin, e)),
            None => debug!(
                program = %self.program,
                "process exited before its input was exhausted; feed stopped"
            ),
        }
    }

    fn take_drain_failure(&mut self, failures: &mut Vec<(PumpKind, io::Error)>) {
        if let StdoutPump::Drain { failure, .. } = &mut self.stdout {
            if let Some(e) = failure.take() {
                failures.push((PumpKind::Stdout, e));
            }
        }
    }

    async fn collect(&mut self) -> Result<Collected> {
        let code = self.wait_untimed().await?;

        let mut failures: Vec<(PumpKind, io::Error)> = Vec::new();
        self.settle_feed(&mut failures).await;
        self.take_drain_failure(&mut failures);

        let stdout = match &mut self.stdout {
            StdoutPump::Captured(handle) => {
                let joined = pump::join(handle).await;
                self.stdout = StdoutPump::Redirected;
                match joined {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        failures.push((PumpKind::Stdout, e));
                        None
                    }
                }
            }
            _ => None,
        };

        let stderr = match self.stderr.as_mut() {
            Some(handle) => {
                let joined = pump::join(handle).await;
                self.stderr = None;
                joined.unwrap_or_else(|e| {
                    failures.push((PumpKind::Stderr, e));
                    Vec::new()
                })
            }
            None => Vec::new(),
        };

        Ok(Collected {
            code,
            stdout,
            stderr,
            failures,
        })
    }

    async fn collect_handled<O, E>(
        &mut self,
        stdout_task: &mut Option<JoinHandle<io::Result<O>>>,
        stderr_task: &mut Option<JoinHandle<io::Result<E>>>,
    ) -> Result<HandledExit<O, E>> {
        let code = self.wait_untimed().await?;

        let mut failures: Vec<(PumpKind, io::Error)> = Vec::new();
        self.settle_feed(&mut failures).await;
        self.take_drain_failure(&mut failures);

        let stdout = match stdout_task.as_mut() {
            Some(task) => {
                let joined = pump::join(task).await;
                *stdout_task = None;
                joined
                    .map_err(|e| failures.push((PumpKind::Stdout, e)))
                    .ok()
            }
            None => None,
        };

        let stderr = match stderr_task.as_mut() {
            Some(task) => {
                let joined = pump::join(task).await;
                *stderr_task = None;
                joined
                    .map_err(|e| failures.push((PumpKind::Stderr, e)))
                    .ok()
            }
            None => None,
        };

        let pump_failures = settle_failures(&self.program, code, failures)?;

        Ok(HandledExit {
            exit_code: code,
            stdout,
            stderr,
            pump_failures,
        })
    }

    async fn abort_on_timeout(&mut self) -> ExecError {
        let after = self.timeout.map_or(Duration::ZERO, |(after, _)| after);
        warn!(program = %self.program, pid = self.pid, ?after, "process timed out; killing");

        if self.status.is_none() {
            if let Err(e) = self.child.kill().await {
                warn!(program = %self.program, error = %e, "failed to kill timed out process");
            }
        }
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
        if let Some(stderr) = self.stderr.take() {
            stderr.abort();
        }
        self.stderr_pipe = None;
        if let StdoutPump::Captured(handle) = std::mem::replace(&mut self.stdout, StdoutPump::Redirected) {
            handle.abort();
        }

        ExecError::TimedOut {
            program: self.program.clone(),
            after,
        }
    }
}

/// Run `work` to completion, or until `deadline` passes (then `None`).
async fn before_deadline<T, F>(deadline: Option<Instant>, work: F) -> Option<T>
where
    F: Future<Output = T>,
{
    match deadline {
        Some(at) => tokio::time::timeout_at(at, work).await.ok(),
        None => Some(work.await),
    }
}

/// Pump failures on a failed process: the first one is the error. On a
/// successful process: annotations.
fn settle_failures(
    program: &str,
    code: i32,
    failures: Vec<(PumpKind, io::Error)>,
) -> Result<Vec<PumpFailure>> {
    if code != 0 {
        return match failures.into_iter().next() {
            Some((pump, source)) => Err(ExecError::PumpIo { pump, source }),
            None => Ok(Vec::new()),
        };
    }

    let mut annotations = Vec::with_capacity(failures.len());
    for (pump, e) in &failures {
        warn!(program = %program, pump = %pump, error = %e, "pump failed");
        annotations.push(PumpFailure::new(*pump, e));
    }
    Ok(annotations)
}

fn exit_code_of(status: ExitStatus) -> i32 {
    status.code().unwrap_or(SIGNALLED_EXIT_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_output_is_captured() {
        let result = launch(&CommandSpec::new("echo").arg("hello world"), InputSource::Absent, OutputTarget::Absent)
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.success_text().as_deref(), Some("hello world\n"));
    }

    #[tokio::test]
    async fn nonexistent_program_is_launch_failure() {
        let err = launch(
            &CommandSpec::new("nonexistent_command_12345"),
            InputSource::Absent,
            OutputTarget::Absent,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExecError::LaunchFailed { ref program, .. } if program == "nonexistent_command_12345"));
    }

    #[tokio::test]
    async fn exit_code_and_stderr_on_failure() {
        let result = launch(
            &CommandSpec::shell("echo oops >&2; echo ignored; exit 42"),
            InputSource::Absent,
            OutputTarget::Absent,
        )
        .await
        .unwrap();

        assert_eq!(result.exit_code(), 42);
        assert!(result.success_stream().is_none());
        assert_eq!(result.error_text().as_deref(), Some("oops\n"));
    }

    #[tokio::test]
    async fn wait_is_idempotent() {
        let mut handle = spawn(&CommandSpec::shell("exit 3"), InputSource::Absent, OutputTarget::Absent).unwrap();
        assert!(handle.pid().is_some());
        assert_eq!(handle.exit_code(), None);

        assert_eq!(handle.wait().await.unwrap(), 3);
        assert_eq!(handle.wait().await.unwrap(), 3);
        assert_eq!(handle.exit_code(), Some(3));

        let result = handle.finish().await.unwrap();
        assert_eq!(result.exit_code(), 3);
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let spec = CommandSpec::new("sleep").arg("10").timeout(Duration::from_millis(100));
        let err = launch(&spec, InputSource::Absent, OutputTarget::Absent).await.unwrap_err();
        assert!(matches!(err, ExecError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn try_launch_folds_nonzero_exit_into_error() {
        let err = try_launch(&CommandSpec::shell("echo bad >&2; exit 1"), InputSource::Absent, OutputTarget::Absent)
            .await
            .unwrap_err();

        match err {
            ExecError::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, 1);
                assert_eq!(stderr, "bad\n");
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn try_launch_returns_output_on_success() {
        let out = try_launch(&CommandSpec::new("cat"), InputSource::text("abc"), OutputTarget::Absent)
            .await
            .unwrap()
            .expect("captured stdout");
        assert_eq!(out.into_string(), "abc");
    }

    #[test]
    fn pump_failures_on_success_become_annotations() {
        let failures = vec![
            (PumpKind::Stdout, io::Error::other("disk full")),
            (PumpKind::Stderr, io::Error::from(io::ErrorKind::UnexpectedEof)),
        ];

        let annotations = settle_failures("cat", 0, failures).unwrap();

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].to_string(), "stdout pump failed: disk full");
        assert_eq!(annotations[1].kind, io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn first_pump_failure_on_a_failed_process_is_the_error() {
        let failures = vec![
            (PumpKind::Stdin, io::Error::other("first")),
            (PumpKind::Stdout, io::Error::other("second")),
        ];

        let err = settle_failures("cat", 2, failures).unwrap_err();
        assert!(matches!(err, ExecError::PumpIo { pump: PumpKind::Stdin, .. }));
        assert!(settle_failures("cat", 2, Vec::new()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn timeout_covers_the_output_pumps() {
        let spec = CommandSpec::shell("sleep 5 & echo started").timeout(Duration::from_millis(200));
        let started = Instant::now();

        let err = launch(&spec, InputSource::Absent, OutputTarget::Absent).await.unwrap_err();

        assert!(matches!(err, ExecError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn feed_is_stopped_once_the_child_exits() {
        let (_writer, reader) = tokio::io::duplex(64);

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            launch(&CommandSpec::new("true"), InputSource::stream(reader), OutputTarget::Absent),
        )
        .await
        .expect("launch must not wait for an idle input stream")
        .unwrap();

        assert!(result.success());
        assert!(result.pump_failures().is_empty());
    }
}
