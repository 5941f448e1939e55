//! Command dispatch.
//!
//! A command name is mapped to a package, the package is installed or updated in the store
//! (or taken from a local override path), its entry file is resolved and finally run in a
//! child process. The child's exit code becomes the exit code of the whole invocation.

use std::process::{Command, ExitStatus, Stdio};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use crate::config::{Runtime, Settings};
use crate::error::{Error, Result};
use crate::installer::Installer;
use crate::package::{Package, PackageOptions, PackageVersion};
use crate::version::VersionResolver;

/// Command name → package implementing it.
pub const COMMANDS: &[(&str, &str)] = &[("init", "@stencil-cli/init")];

/// Environment variables a child can read instead of its argv.
pub const ENV_ENTRY: &str = "STENCIL_ENTRY";
pub const ENV_ARGS: &str = "STENCIL_ARGS";

/// Looks up the package implementing `command`.
pub fn package_for(command: &str) -> Result<&'static str> {
    COMMANDS
        .iter()
        .find(|(name, _)| *name == command)
        .map(|(_, package)| *package)
        .ok_or_else(|| Error::UnknownCommand {
            name: command.to_string(),
            available: COMMANDS.iter().map(|(name, _)| name.to_string()).collect(),
        })
}

/// The options that cross the process boundary. Nothing else is forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOptions {
    #[serde(default)]
    pub force: bool,
}

/// One requested command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    /// Positional arguments in order; `None` for an omitted optional argument.
    pub args: Vec<Option<String>>,
    pub options: CommandOptions,
}

#[derive(Serialize)]
struct OptionsPayload<'a> {
    name: &'a str,
    #[serde(flatten)]
    options: &'a CommandOptions,
}

impl Invocation {
    pub fn new(command: impl Into<String>, args: Vec<Option<String>>, options: CommandOptions) -> Self {
        Self {
            command: command.into(),
            args,
            options,
        }
    }

    /// Serializes to a JSON array: the positional arguments followed by the options object
    /// (which also carries the command name).
    pub fn to_payload(&self) -> Result<String> {
        let mut values: Vec<Value> = self
            .args
            .iter()
            .map(|arg| arg.clone().map_or(Value::Null, Value::String))
            .collect();
        let options = serde_json::to_value(OptionsPayload {
            name: &self.command,
            options: &self.options,
        })
        .map_err(|e| Error::InvalidArguments(e.to_string()))?;
        values.push(options);
        serde_json::to_string(&values).map_err(|e| Error::InvalidArguments(e.to_string()))
    }
}

/// Runs a resolved entry file out of process.
pub trait Launcher {
    /// Runs `entry` with `payload` and returns the exit code to propagate.
    ///
    /// # Errors
    /// Returns [`Error::CommandExecution`] if the process can't be started or reports no code.
    fn launch(&self, entry: &str, payload: &str) -> Result<i32>;
}

/// Spawns `<runtime> <runtime args> <entry> <payload>` with inherited stdio.
pub struct ProcessLauncher {
    runtime: Runtime,
}

impl ProcessLauncher {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    fn command(&self, entry: &str, payload: &str) -> Command {
        let mut command = Command::new(&self.runtime.program);
        command
            .args(&self.runtime.args)
            .arg(entry)
            .arg(payload)
            .env(ENV_ENTRY, entry)
            .env(ENV_ARGS, payload)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        command
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, entry: &str, payload: &str) -> Result<i32> {
        debug!(program = %self.runtime.program, %entry, "spawning command process");
        let status = self
            .command(entry, payload)
            .status()
            .map_err(|e| {
                Error::CommandExecution(format!("could not start `{}`: {e}", self.runtime.program))
            })?;
        exit_code(status)
    }
}

/// Maps a child's exit status to the code this process should exit with.
fn exit_code(status: ExitStatus) -> Result<i32> {
    if let Some(code) = status.code() {
        return Ok(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Ok(128 + signal);
        }
    }
    Err(Error::CommandExecution(format!("child exited without a status code: {status}")))
}

/// Resolves commands to packages and runs them.
pub struct Dispatcher<'a> {
    settings: &'a Settings,
    resolver: &'a dyn VersionResolver,
    installer: &'a dyn Installer,
    launcher: &'a dyn Launcher,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        settings: &'a Settings,
        resolver: &'a dyn VersionResolver,
        installer: &'a dyn Installer,
        launcher: &'a dyn Launcher,
    ) -> Self {
        Self {
            settings,
            resolver,
            installer,
            launcher,
        }
    }

    /// Returns a package that is ready to be resolved: installed or updated in managed mode,
    /// untouched in override mode.
    pub fn prepare_package(&self, package_name: &str) -> Result<Package<'a>> {
        match &self.settings.target_path {
            None => {
                let target_path = self.settings.dependencies_dir();
                let store_dir = self.settings.store_dir();
                debug!(path = %target_path.display(), store = %store_dir.display(), "managed package");
                let mut package = Package::new(
                    PackageOptions {
                        target_path,
                        store_dir: Some(store_dir),
                        name: package_name.to_string(),
                        version: PackageVersion::Latest,
                    },
                    self.resolver,
                    self.installer,
                )?;
                if package.exists()? {
                    package.update()?;
                } else {
                    package.install()?;
                }
                Ok(package)
            }
            Some(target_path) => {
                debug!(path = %target_path.display(), "using local package override");
                Package::new(
                    PackageOptions {
                        target_path: target_path.clone(),
                        store_dir: None,
                        name: package_name.to_string(),
                        version: PackageVersion::Latest,
                    },
                    self.resolver,
                    self.installer,
                )
            }
        }
    }

    /// Runs `invocation` end to end and returns the exit code to terminate with.
    ///
    /// # Errors
    /// Any failure before the child starts aborts the dispatch; nothing is executed then.
    pub fn dispatch(&self, invocation: &Invocation) -> Result<i32> {
        let package_name = package_for(&invocation.command)?;
        let package = self.prepare_package(package_name)?;

        let Some(entry) = package.root_file_path()? else {
            return Err(Error::EntryNotFound {
                package: package_name.to_string(),
                path: package
                    .cache_file_path()
                    .unwrap_or_else(|| package.target_path().to_path_buf()),
            });
        };
        info!("running {} with {}@{} ({})", invocation.command, package.name(), package.version(), entry);

        let payload = invocation.to_payload()?;
        let code = self.launcher.launch(&entry, &payload)?;
        debug!(code, "command finished");
        Ok(code)
    }
}
