// src/exec/pipeline.rs

//! Sequential pipelines: each stage's captured stdout becomes the next
//! stage's stdin.
//!
//! Stages run one after another, not concurrently, so that a failing stage
//! can stop the chain before anything downstream is launched.

use tracing::{debug, info};

use super::command::CommandSpec;
use super::input::InputSource;
use super::launcher::launch;
use super::output::OutputTarget;
use super::result::ProcessResult;
use crate::errors::Result;

/// An ordered chain of commands. Always holds at least one stage.
#[derive(Debug)]
pub struct Pipeline {
    input: InputSource,
    stages: Vec<CommandSpec>,
}

impl Pipeline {
    pub fn new(first: CommandSpec) -> Self {
        Self {
            input: InputSource::Absent,
            stages: vec![first],
        }
    }

    /// Stdin of the first stage.
    pub fn input(mut self, input: InputSource) -> Self {
        self.input = input;
        self
    }

    /// Append a stage.
    pub fn pipe(mut self, next: CommandSpec) -> Self {
        self.stages.push(next);
        self
    }

    /// Append a `/bin/sh -c` stage.
    pub fn pipe_shell(self, text: impl Into<String>) -> Self {
        self.pipe(CommandSpec::shell(text))
    }

    pub fn stages(&self) -> &[CommandSpec] {
        &self.stages
    }

    /// Run every stage; `output` binds the last stage's stdout.
    ///
    /// Returns the last stage's result, or the result of the first stage that
    /// exited nonzero (later stages are then never launched).
    pub async fn run(self, output: OutputTarget<'_>) -> Result<ProcessResult> {
        let Self { mut input, stages } = self;
        let Some((last, rest)) = stages.split_last() else {
            return Err(crate::errors::ExecError::EmptyCommand);
        };

        for (index, stage) in rest.iter().enumerate() {
            debug!(stage = index, command = %stage, "running pipeline stage");
            let result = launch(stage, input, OutputTarget::Absent).await?;

            if !result.success() {
                info!(
                    stage = index,
                    command = %stage,
                    exit_code = result.exit_code(),
                    "pipeline stage failed; skipping remaining stages"
                );
                return Ok(result);
            }

            input = result
                .into_success_stream()
                .map_or(InputSource::Absent, InputSource::from);
        }

        debug!(stage = rest.len(), command = %last, "running final pipeline stage");
        launch(last, input, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stages_feed_each_other() {
        let result = Pipeline::new(CommandSpec::new("cat"))
            .input(InputSource::text("b\na\nc\n"))
            .pipe(CommandSpec::new("sort"))
            .pipe_shell("tr a-z A-Z")
            .run(OutputTarget::Absent)
            .await
            .unwrap();

        assert_eq!(result.success_text().as_deref(), Some("A\nB\nC\n"));
    }

    #[tokio::test]
    async fn single_stage_pipeline_is_a_launch() {
        let result = Pipeline::new(CommandSpec::parse("echo one"))
            .run(OutputTarget::Absent)
            .await
            .unwrap();
        assert_eq!(result.success_text().as_deref(), Some("one\n"));
        assert_eq!(
            Pipeline::new(CommandSpec::new("true")).pipe_shell("x").stages().len(),
            2
        );
    }
}
