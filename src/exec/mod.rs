// src/exec/mod.rs

//! Process execution layer.
//!
//! This module spawns commands with `tokio::process::Command`, wires their
//! standard streams to caller-supplied sources and targets, and reports the
//! outcome as a [`ProcessResult`].
//!
//! - [`command`] describes what to run ([`CommandSpec`]).
//! - [`input`] binds stdin ([`InputSource`]).
//! - [`output`] binds stdout ([`OutputTarget`]).
//! - [`pump`] moves bytes between pipes and endpoints on background tasks.
//! - [`launcher`] starts, waits for and collects a single process.
//! - [`result`] holds the outcome and its readable [`OutputHandle`].
//! - [`pipeline`] chains launches stage by stage.

pub mod command;
pub mod input;
pub mod launcher;
pub mod output;
pub mod pipeline;
pub mod pump;
pub mod result;

pub use command::{CommandSpec, ConfigHook, tokenize};
pub use input::{ByteStream, InputSource, standard_input};
pub use launcher::{LaunchHandle, launch, spawn, try_launch};
pub use output::{ByteSink, OutputTarget};
pub use pipeline::Pipeline;
pub use pump::{PumpFailure, PumpKind};
pub use result::{HandledExit, OutputHandle, ProcessResult};
