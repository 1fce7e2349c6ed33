#![allow(dead_code)]

use procpipe::config::{ConfigFile, DefaultsSection, RawConfigFile, StageConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct PipelineConfigBuilder {
    config: RawConfigFile,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                defaults: DefaultsSection::default(),
                stages: Vec::new(),
            },
        }
    }

    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.config.stages.push(stage);
        self
    }

    pub fn with_default_env(mut self, key: &str, value: &str) -> Self {
        self.config
            .defaults
            .env
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_default_working_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.config.defaults.working_dir = Some(dir.into());
        self
    }

    pub fn with_staging_threshold(mut self, bytes: usize) -> Self {
        self.config.defaults.staging_threshold = Some(bytes);
        self
    }

    /// The unvalidated form, for tests that expect validation to fail.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `StageConfig`.
pub struct StageConfigBuilder {
    stage: StageConfig,
}

impl StageConfigBuilder {
    /// Stage whose command line is whitespace-tokenized.
    pub fn cmd(cmd: &str) -> Self {
        Self {
            stage: StageConfig {
                cmd: Some(cmd.to_string()),
                ..StageConfig::default()
            },
        }
    }

    /// Stage run through `/bin/sh -c`.
    pub fn shell(text: &str) -> Self {
        Self {
            stage: StageConfig {
                shell: Some(text.to_string()),
                ..StageConfig::default()
            },
        }
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.stage.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.stage.working_dir = Some(dir.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.stage.timeout_secs = Some(secs);
        self
    }

    pub fn input(mut self, descriptor: &str) -> Self {
        self.stage.input = Some(descriptor.to_string());
        self
    }

    pub fn output(mut self, descriptor: &str) -> Self {
        self.stage.output = Some(descriptor.to_string());
        self
    }

    pub fn build(self) -> StageConfig {
        self.stage
    }
}
