// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::Stdout;
use tracing::{debug, warn};

use crate::cli::{CliArgs, CliCommand, PipelineArgs, RunArgs};
use crate::config::{ConfigFile, load_and_validate};
use crate::exec::{CommandSpec, OutputTarget, ProcessResult, launch};
use crate::types::OutputSpec;

/// High-level entry point used by `main.rs`.
///
/// Returns the exit code the `procpipe` process should exit with: the exit
/// code of the (last) command that ran.
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        CliCommand::Run(run) => run_command(run).await,
        CliCommand::Pipeline(pipeline) => run_pipeline(pipeline).await,
    }
}

async fn run_command(args: RunArgs) -> Result<i32> {
    let spec = command_spec_from_args(&args);
    let input = args.input.into_source();

    let mut stdout = tokio::io::stdout();
    let target = output_target(&args.output, &mut stdout);

    let result = launch(&spec, input, target)
        .await
        .with_context(|| format!("running '{spec}'"))?;

    report(result).await
}

async fn run_pipeline(args: PipelineArgs) -> Result<i32> {
    let config_path = args.config;
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading pipeline file {}", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    let pipeline = cfg
        .pipeline()
        .context("pipeline file has no stages")?;

    let mut stdout = tokio::io::stdout();
    let target = output_target(&cfg.output, &mut stdout);

    let result = pipeline.run(target).await.context("running pipeline")?;
    report(result).await
}

fn command_spec_from_args(args: &RunArgs) -> CommandSpec {
    let mut spec = if args.shell {
        CommandSpec::shell(args.command.join(" "))
    } else {
        CommandSpec::from_args(args.command.iter().cloned())
    };

    spec = spec.envs(args.env.iter().cloned());

    if let Some(ref dir) = args.dir {
        spec = spec.working_dir(dir.clone());
    }
    if let Some(secs) = args.timeout {
        spec = spec.timeout(Duration::from_secs(secs));
    }
    if let Some(limit) = args.staging_threshold {
        spec = spec.staging_threshold(limit);
    }

    spec
}

fn output_target<'a>(spec: &OutputSpec, stdout: &'a mut Stdout) -> OutputTarget<'a> {
    match spec {
        OutputSpec::Capture => OutputTarget::Absent,
        OutputSpec::Stdout => OutputTarget::sink(stdout),
        OutputSpec::File(path) => OutputTarget::file(path.clone()),
    }
}

/// Print whatever the result carries: captured stdout on success, the
/// command's stderr on failure.
async fn report(result: ProcessResult) -> Result<i32> {
    for failure in result.pump_failures() {
        warn!(%failure, "output may be incomplete");
    }

    let code = result.exit_code();
    if result.success() {
        if let Some(out) = result.into_success_stream() {
            out.print().await?;
        }
    } else if let Some(err) = result.into_error_stream() {
        err.to_sink(&mut tokio::io::stderr()).await?;
    }

    debug!(exit_code = code, "reported result");
    Ok(code)
}

/// Simple dry-run output: print stages and their I/O.
fn print_dry_run(cfg: &ConfigFile) {
    println!("procpipe dry-run");
    println!("  input  = {}", cfg.input);
    println!("  output = {}", cfg.output);
    println!();

    println!("stages ({}):", cfg.stages.len());
    for (index, spec) in cfg.command_specs().iter().enumerate() {
        println!("  {index}: {spec}");
        if let Some(dir) = spec.current_dir() {
            println!("      dir: {}", dir.display());
        }
        if !spec.env_overrides().is_empty() {
            println!("      env: {:?}", spec.env_overrides());
        }
        if let Some(timeout) = spec.timeout_duration() {
            println!("      timeout: {timeout:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
