// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;
use crate::types::{InputSpec, OutputSpec};

/// Command-line arguments for `procpipe`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procpipe",
    version,
    about = "Run commands with their stdin/stdout bound to files, text or streams.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCPIPE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Run a single command.
    Run(RunArgs),
    /// Run a pipeline described in a TOML file.
    Pipeline(PipelineArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Run the command text through `/bin/sh -c`.
    #[arg(long)]
    pub shell: bool,

    /// Stdin source: `none`, `stdin`, `file:<path>` or `text:<literal>`.
    #[arg(long, value_name = "DESC", default_value = "none", value_parser = parse_input)]
    pub input: InputSpec,

    /// Stdout target: `stdout`, `capture` or `file:<path>`.
    #[arg(long, value_name = "DESC", default_value = "stdout", value_parser = parse_output)]
    pub output: OutputSpec,

    /// Environment override, may be repeated.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Working directory for the command.
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Kill the command after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Stage `text:` inputs up to this many bytes through a temp file.
    #[arg(long, value_name = "BYTES")]
    pub staging_threshold: Option<usize>,

    /// The command and its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
    /// Path to the pipeline file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Parse + validate and print the stages, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn parse_input(s: &str) -> Result<InputSpec, String> {
    s.parse().map_err(|e: crate::errors::ExecError| e.to_string())
}

fn parse_output(s: &str) -> Result<OutputSpec, String> {
    s.parse().map_err(|e: crate::errors::ExecError| e.to_string())
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}
