// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{CommandSpec, Pipeline};
use crate::types::{InputSpec, OutputSpec};

/// Pipeline file exactly as read from TOML, before validation.
///
/// ```toml
/// [defaults]
/// working_dir = "/tmp"
/// env = { LANG = "C" }
/// staging_threshold = 4096
/// timeout_secs = 30
///
/// [[stage]]
/// cmd = "cat"
/// input = "text:hello world"
///
/// [[stage]]
/// shell = "tr a-z A-Z"
/// output = "file:out.txt"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Settings shared by every stage, from `[defaults]`.
    #[serde(default)]
    pub defaults: DefaultsSection,

    /// Stages in execution order, from `[[stage]]`.
    #[serde(default, rename = "stage")]
    pub stages: Vec<StageConfig>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DefaultsSection {
    /// Working directory for stages that don't set their own.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Environment overrides applied to every stage. A stage's own `env`
    /// wins on key collision.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Stage literal text inputs up to this many bytes through a temp file.
    #[serde(default)]
    pub staging_threshold: Option<usize>,

    /// Per-stage timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// `[[stage]]` entry. Exactly one of `cmd`, `shell` or `args` must be set.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StageConfig {
    /// Whitespace-tokenized command line (no quoting).
    #[serde(default)]
    pub cmd: Option<String>,

    /// Command text run through `/bin/sh -c`.
    #[serde(default)]
    pub shell: Option<String>,

    /// Explicit argument vector, program first.
    #[serde(default)]
    pub args: Option<Vec<String>>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Input descriptor; first stage only.
    #[serde(default)]
    pub input: Option<String>,

    /// Output descriptor; last stage only.
    #[serde(default)]
    pub output: Option<String>,
}

impl StageConfig {
    /// Build the command for this stage, layering it over `defaults`.
    pub fn command_spec(&self, defaults: &DefaultsSection) -> CommandSpec {
        let spec = match (&self.cmd, &self.shell, &self.args) {
            (Some(cmd), _, _) => CommandSpec::parse(cmd),
            (None, Some(shell), _) => CommandSpec::shell(shell.clone()),
            (None, None, Some(args)) => CommandSpec::from_args(args.iter().cloned()),
            (None, None, None) => CommandSpec::default(),
        };

        let mut spec = spec
            .envs(defaults.env.iter().map(|(k, v)| (k.clone(), v.clone())))
            .envs(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(dir) = self.working_dir.as_ref().or(defaults.working_dir.as_ref()) {
            spec = spec.working_dir(dir.clone());
        }
        if let Some(secs) = self.timeout_secs.or(defaults.timeout_secs) {
            spec = spec.timeout(Duration::from_secs(secs));
        }
        if let Some(limit) = defaults.staging_threshold {
            spec = spec.staging_threshold(limit);
        }

        spec
    }
}

/// Validated pipeline file.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// it always has at least one runnable stage and parsed I/O descriptors.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub defaults: DefaultsSection,
    pub stages: Vec<StageConfig>,
    pub input: InputSpec,
    pub output: OutputSpec,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        defaults: DefaultsSection,
        stages: Vec<StageConfig>,
        input: InputSpec,
        output: OutputSpec,
    ) -> Self {
        Self {
            defaults,
            stages,
            input,
            output,
        }
    }

    /// Commands for every stage, in order.
    pub fn command_specs(&self) -> Vec<CommandSpec> {
        self.stages
            .iter()
            .map(|stage| stage.command_spec(&self.defaults))
            .collect()
    }

    /// Build the runnable pipeline, wiring the configured input into the
    /// first stage. The output descriptor is left to the caller.
    pub fn pipeline(&self) -> Option<Pipeline> {
        let mut specs = self.command_specs().into_iter();
        let first = specs.next()?;
        let pipeline = specs.fold(Pipeline::new(first), Pipeline::pipe);
        Some(pipeline.input(self.input.clone().into_source()))
    }
}
