//! Receiving side of a dispatch.
//!
//! A command package gets the payload produced by [`crate::dispatch::Invocation::to_payload`].
//! [`run`] drives a [`Command`] through a fixed sequence of stages:
//! `validate → parse_args → init → execute`. The first failing stage stops the chain.

use std::path::PathBuf;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use crate::dispatch::CommandOptions;
use crate::error::{Error, Result};
use crate::util::{empty_dir, is_dir_empty};

/// Arguments of a command after they crossed the process boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub name: String,
    pub args: Vec<Option<String>>,
    pub options: CommandOptions,
}

#[derive(Deserialize)]
struct ReceivedOptions {
    name: String,
    #[serde(flatten)]
    options: CommandOptions,
}

/// Capabilities a command provides to the pipeline.
pub trait Command {
    /// Takes over parsed arguments.
    fn init(&mut self, ctx: &CommandContext) -> Result<()>;
    /// Does the actual work.
    fn execute(&mut self) -> Result<()>;
}

/// Checks the payload is a non-empty JSON array.
fn validate(payload: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::InvalidArguments(format!("payload is not JSON: {e}")))?;
    let Value::Array(values) = value else {
        return Err(Error::InvalidArguments("payload must be an array".to_string()));
    };
    if values.is_empty() {
        return Err(Error::InvalidArguments("payload must not be empty".to_string()));
    }
    Ok(values)
}

/// Splits the trailing options object off the positional arguments.
fn parse_args(mut values: Vec<Value>) -> Result<CommandContext> {
    let options = values
        .pop()
        .ok_or_else(|| Error::InvalidArguments("missing options".to_string()))?;
    let ReceivedOptions { name, options } = serde_json::from_value(options)
        .map_err(|e| Error::InvalidArguments(format!("invalid options: {e}")))?;
    let args = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(Error::InvalidArguments(format!(
                "argument {i} must be a string, got {other}"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CommandContext { name, args, options })
}

impl CommandContext {
    /// Runs the `validate` and `parse_args` stages on a raw payload.
    pub fn from_payload(payload: &str) -> Result<Self> {
        parse_args(validate(payload)?)
    }
}

/// Drives `command` through the whole pipeline.
pub fn run<C: Command + ?Sized>(payload: &str, command: &mut C) -> Result<()> {
    let ctx = CommandContext::from_payload(payload)?;
    debug!(command = %ctx.name, args = ?ctx.args, "running command");
    command.init(&ctx)?;
    command.execute()
}

/// Prepares a directory to receive a new project.
///
/// Fails on a non-empty directory unless `force` is set, in which case the directory is
/// cleared. Dot-files and `node_modules` don't count as content.
#[derive(Debug)]
pub struct InitCommand {
    dir: PathBuf,
    project_name: String,
    force: bool,
}

impl InitCommand {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            project_name: String::new(),
            force: false,
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }
}

impl Command for InitCommand {
    fn init(&mut self, ctx: &CommandContext) -> Result<()> {
        self.project_name = ctx.args.first().cloned().flatten().unwrap_or_default();
        self.force = ctx.options.force;
        debug!(project = %self.project_name, force = self.force, "init arguments");
        Ok(())
    }

    fn execute(&mut self) -> Result<()> {
        if !is_dir_empty(&self.dir)? {
            if !self.force {
                return Err(Error::DirectoryNotEmpty(self.dir.clone()));
            }
            warn!("clearing {}", self.dir.display());
            empty_dir(&self.dir)?;
        }
        info!("{} is ready for {}", self.dir.display(), self.project_name);
        Ok(())
    }
}
