// tests/launch_semantics.rs

mod common;

use std::error::Error;
use std::io::Cursor;

use procpipe::exec::{CommandSpec, InputSource, OutputTarget, launch, spawn};
use tempfile::tempdir;
use tokio::io::AsyncReadExt;

use common::{binary_payload, init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn literal_text_is_fed_to_stdin() -> TestResult {
    init_tracing();

    let result = launch(&CommandSpec::parse("wc -l"), InputSource::text("hello\n"), OutputTarget::Absent).await?;

    assert!(result.success());
    assert_eq!(result.success_text().as_deref().map(str::trim), Some("1"));
    Ok(())
}

#[tokio::test]
async fn absent_input_reads_as_end_of_file() -> TestResult {
    init_tracing();

    // `cat` would block forever on an inherited terminal.
    let result = with_timeout(launch(&CommandSpec::new("cat"), InputSource::Absent, OutputTarget::Absent)).await?;

    assert!(result.success());
    assert_eq!(result.success_stream().map(|out| out.len()), Some(0));
    Ok(())
}

#[tokio::test]
async fn env_overrides_layer_over_the_inherited_environment() -> TestResult {
    init_tracing();

    let spec = CommandSpec::shell(r#"test -n "$PATH" && printf '%s' "$PROCPIPE_TEST_VAR""#)
        .env("PROCPIPE_TEST_VAR", "from-overlay");
    let result = launch(&spec, InputSource::Absent, OutputTarget::Absent).await?;

    assert!(result.success(), "PATH should still be inherited");
    assert_eq!(result.success_text().as_deref(), Some("from-overlay"));
    Ok(())
}

#[tokio::test]
async fn later_env_values_win() -> TestResult {
    let spec = CommandSpec::shell(r#"printf '%s' "$KEY""#)
        .envs([("KEY", "first")])
        .env("KEY", "second");
    let result = launch(&spec, InputSource::Absent, OutputTarget::Absent).await?;

    assert_eq!(result.success_text().as_deref(), Some("second"));
    Ok(())
}

#[tokio::test]
async fn working_directory_is_applied() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    std::fs::write(dir.path().join("only-here.txt"), "x")?;

    let result = launch(
        &CommandSpec::new("ls").working_dir(dir.path()),
        InputSource::Absent,
        OutputTarget::Absent,
    )
    .await?;

    assert_eq!(result.success_text().as_deref(), Some("only-here.txt\n"));
    Ok(())
}

#[tokio::test]
async fn configuration_hook_sees_the_prepared_command() -> TestResult {
    init_tracing();
    let dir = tempdir()?;

    let spec = CommandSpec::shell(r#"printf '%s' "$HOOKED""#)
        .working_dir(dir.path())
        .configure(|cmd| {
            cmd.env("HOOKED", "yes");
        });
    let result = launch(&spec, InputSource::Absent, OutputTarget::Absent).await?;

    assert_eq!(result.success_text().as_deref(), Some("yes"));
    Ok(())
}

#[tokio::test]
async fn success_carries_only_stdout() -> TestResult {
    init_tracing();

    let result = launch(
        &CommandSpec::shell("echo out; echo err >&2"),
        InputSource::Absent,
        OutputTarget::Absent,
    )
    .await?;

    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.success_text().as_deref(), Some("out\n"));
    assert!(result.error_stream().is_none());
    Ok(())
}

#[tokio::test]
async fn failure_carries_only_stderr() -> TestResult {
    init_tracing();

    let result = launch(
        &CommandSpec::shell("echo out; echo err >&2; exit 2"),
        InputSource::Absent,
        OutputTarget::Absent,
    )
    .await?;

    assert_eq!(result.exit_code(), 2);
    assert!(!result.success());
    assert!(result.success_stream().is_none());
    assert_eq!(result.error_text().as_deref(), Some("err\n"));
    Ok(())
}

#[tokio::test]
async fn failure_with_silent_stderr_still_has_an_error_stream() -> TestResult {
    let result = launch(&CommandSpec::new("false"), InputSource::Absent, OutputTarget::Absent).await?;

    assert_eq!(result.exit_code(), 1);
    assert_eq!(result.error_stream().map(|err| err.is_empty()), Some(true));
    Ok(())
}

#[tokio::test]
async fn n_bytes_round_trip_through_a_file() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let out = dir.path().join("copy.bin");
    let payload = binary_payload(300_000);

    let result = with_timeout(launch(
        &CommandSpec::new("cat"),
        InputSource::stream(Cursor::new(payload.clone())),
        OutputTarget::file(out.clone()),
    ))
    .await?;

    assert!(result.success());
    let written = std::fs::read(&out)?;
    assert_eq!(written.len(), payload.len());
    assert!(written == payload);
    Ok(())
}

#[tokio::test]
async fn output_file_is_truncated_not_appended() -> TestResult {
    let dir = tempdir()?;
    let out = dir.path().join("out.txt");
    std::fs::write(&out, "stale content that is longer than the new one\n")?;

    launch(&CommandSpec::parse("echo fresh"), InputSource::Absent, OutputTarget::file(out.clone())).await?;

    assert_eq!(std::fs::read_to_string(&out)?, "fresh\n");
    Ok(())
}

#[tokio::test]
async fn success_stream_can_feed_another_launch() -> TestResult {
    init_tracing();

    let first = launch(&CommandSpec::parse("seq 1 100"), InputSource::Absent, OutputTarget::Absent).await?;
    let handle = first.into_success_stream().ok_or("no captured output")?;

    let summed = launch(&CommandSpec::parse("wc -l"), handle.into(), OutputTarget::Absent).await?;
    assert_eq!(summed.success_text().as_deref().map(str::trim), Some("100"));
    Ok(())
}

#[tokio::test]
async fn success_stream_can_be_written_out() -> TestResult {
    let dir = tempdir()?;
    let path = dir.path().join("saved.txt");

    let result = launch(&CommandSpec::parse("echo saved"), InputSource::Absent, OutputTarget::Absent).await?;
    let handle = result.into_success_stream().ok_or("no captured output")?;
    let written = handle.to_file(&path).await?;

    assert_eq!(written, 6);
    assert_eq!(std::fs::read_to_string(&path)?, "saved\n");

    let result = launch(&CommandSpec::parse("echo temp"), InputSource::Absent, OutputTarget::Absent).await?;
    let staged = result
        .into_success_stream()
        .ok_or("no captured output")?
        .to_temp_file()?;
    assert_eq!(std::fs::read_to_string(staged.path())?, "temp\n");
    Ok(())
}

#[tokio::test]
async fn spawned_handle_reports_pid_and_caches_exit_code() -> TestResult {
    init_tracing();

    let mut handle = spawn(&CommandSpec::shell("exit 4"), InputSource::Absent, OutputTarget::Absent)?;
    assert!(handle.pid().is_some());
    assert_eq!(handle.program(), "/bin/sh");
    assert_eq!(handle.exit_code(), None);

    assert_eq!(handle.wait().await?, 4);
    assert_eq!(handle.wait().await?, 4);
    assert_eq!(handle.exit_code(), Some(4));

    let result = handle.finish().await?;
    assert_eq!(result.exit_code(), 4);
    Ok(())
}

#[tokio::test]
async fn idle_input_stream_does_not_hold_up_a_finished_process() -> TestResult {
    init_tracing();
    // The writer half stays alive, so the stream never ends.
    let (_writer, reader) = tokio::io::duplex(64);

    let result = with_timeout(launch(
        &CommandSpec::new("true"),
        InputSource::stream(reader),
        OutputTarget::Absent,
    ))
    .await?;

    assert!(result.success());
    Ok(())
}

#[tokio::test]
async fn handle_runs_caller_consumers_over_both_pipes() -> TestResult {
    init_tracing();

    let handle = spawn(
        &CommandSpec::shell("cat; echo err >&2"),
        InputSource::text("out\n"),
        OutputTarget::Absent,
    )?;
    let exit = with_timeout(handle.handle(
        |mut stdout| async move {
            let mut text = String::new();
            stdout.read_to_string(&mut text).await?;
            Ok::<_, std::io::Error>(text)
        },
        |mut stderr| async move {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes).await?;
            Ok::<_, std::io::Error>(bytes.len())
        },
    ))
    .await?;

    assert!(exit.success());
    assert_eq!(exit.stdout.as_deref(), Some("out\n"));
    assert_eq!(exit.stderr, Some(4));
    assert!(exit.pump_failures.is_empty());
    Ok(())
}

#[tokio::test]
async fn handle_skips_a_consumer_whose_pipe_is_bound_elsewhere() -> TestResult {
    let dir = tempdir()?;
    let out = dir.path().join("out.txt");

    let handle = spawn(
        &CommandSpec::shell("echo to-file; exit 3"),
        InputSource::Absent,
        OutputTarget::file(out.clone()),
    )?;
    let exit = handle
        .handle(
            |_stdout| async move { Ok::<_, std::io::Error>("unreachable") },
            |mut stderr| async move {
                let mut text = String::new();
                stderr.read_to_string(&mut text).await?;
                Ok::<_, std::io::Error>(text)
            },
        )
        .await?;

    assert_eq!(exit.exit_code, 3);
    assert!(exit.stdout.is_none());
    assert_eq!(exit.stderr.as_deref(), Some(""));
    assert_eq!(std::fs::read_to_string(&out)?, "to-file\n");
    Ok(())
}
