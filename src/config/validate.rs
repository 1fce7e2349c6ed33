// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, StageConfig};
use crate::errors::{ExecError, Result};
use crate::exec::tokenize;
use crate::types::{InputSpec, OutputSpec};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ExecError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let (input, output) = parse_io_descriptors(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.defaults, raw.stages, input, output))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_stages(cfg)?;
    validate_defaults(cfg)?;
    for (index, stage) in cfg.stages.iter().enumerate() {
        validate_stage_command(index, stage)?;
    }
    validate_io_placement(cfg)?;
    Ok(())
}

fn ensure_has_stages(cfg: &RawConfigFile) -> Result<()> {
    if cfg.stages.is_empty() {
        return Err(ExecError::ConfigError(
            "config must contain at least one [[stage]] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_defaults(cfg: &RawConfigFile) -> Result<()> {
    if cfg.defaults.timeout_secs == Some(0) {
        return Err(ExecError::ConfigError(
            "[defaults].timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_stage_command(index: usize, stage: &StageConfig) -> Result<()> {
    let set = [stage.cmd.is_some(), stage.shell.is_some(), stage.args.is_some()]
        .iter()
        .filter(|set| **set)
        .count();

    if set != 1 {
        return Err(ExecError::ConfigError(format!(
            "stage {index} must set exactly one of `cmd`, `shell` or `args` (got {set})"
        )));
    }

    let empty = match (&stage.cmd, &stage.shell, &stage.args) {
        (Some(cmd), _, _) => tokenize(cmd).is_empty(),
        (_, Some(shell), _) => shell.trim().is_empty(),
        (_, _, Some(args)) => args.first().is_none_or(|program| program.is_empty()),
        _ => true,
    };
    if empty {
        return Err(ExecError::ConfigError(format!(
            "stage {index} has an empty command"
        )));
    }

    if stage.timeout_secs == Some(0) {
        return Err(ExecError::ConfigError(format!(
            "stage {index}: timeout_secs must be >= 1 (got 0)"
        )));
    }

    Ok(())
}

fn validate_io_placement(cfg: &RawConfigFile) -> Result<()> {
    let last = cfg.stages.len() - 1;
    for (index, stage) in cfg.stages.iter().enumerate() {
        if index != 0 && stage.input.is_some() {
            return Err(ExecError::ConfigError(format!(
                "stage {index} sets `input`, but only the first stage reads external input"
            )));
        }
        if index != last && stage.output.is_some() {
            return Err(ExecError::ConfigError(format!(
                "stage {index} sets `output`, but only the last stage writes external output"
            )));
        }
    }
    Ok(())
}

fn parse_io_descriptors(cfg: &RawConfigFile) -> Result<(InputSpec, OutputSpec)> {
    let input = match cfg.stages.first().and_then(|s| s.input.as_deref()) {
        Some(desc) => desc.parse()?,
        None => InputSpec::default(),
    };
    let output = match cfg.stages.last().and_then(|s| s.output.as_deref()) {
        Some(desc) => desc.parse()?,
        None => OutputSpec::default(),
    };
    Ok((input, output))
}
