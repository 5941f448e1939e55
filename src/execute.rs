use anyhow::{Context, Result};
use colored::Colorize;
use stencil::cache::{clean, list_entries, prune};
use stencil::config::{Overrides, Settings};
use stencil::dispatch::{CommandOptions, Dispatcher, Invocation, ProcessLauncher};
use stencil::registry::RegistryClient;
use stencil::version::compare_greater;
use tracing::{debug, info};
use crate::cli::{CacheAction, StencilCommand, CLI};

/// Runs the parsed command line and returns the process exit code.
pub fn execute(cli: CLI) -> Result<i32> {
    let settings = preflight(&cli)?;
    match cli.command {
        StencilCommand::Init { project_name, force } => {
            execute_init(&settings, project_name, force)
        }
        StencilCommand::Cache { action } => {
            execute_cache(&settings, action)?;
            Ok(0)
        }
    }
}

fn preflight(cli: &CLI) -> Result<Settings> {
    info!("stencil {}", env!("CARGO_PKG_VERSION"));
    let overrides = Overrides {
        target_path: cli.target_path.clone(),
    };
    let settings = Settings::load(&overrides).context("could not load settings")?;
    debug!(home = %settings.cli_home.display(), "tool home");
    if let Some(target_path) = &settings.target_path {
        debug!(target_path = %target_path.display(), "local override");
    }
    Ok(settings)
}

pub fn execute_init(settings: &Settings, project_name: Option<String>, force: bool) -> Result<i32> {
    let registry = RegistryClient::new(settings.registry.clone())?;
    let launcher = ProcessLauncher::new(settings.runtime.clone());
    let dispatcher = Dispatcher::new(settings, &registry, &registry, &launcher);
    let invocation = Invocation::new("init", vec![project_name], CommandOptions { force });
    let code = dispatcher
        .dispatch(&invocation)
        .context("init failed")?;
    Ok(code)
}

pub fn execute_cache(settings: &Settings, action: CacheAction) -> Result<()> {
    let store_dir = settings.store_dir();
    match action {
        CacheAction::List => {
            let entries = list_entries(&store_dir)?;
            if entries.is_empty() {
                println!("No cached packages");
                return Ok(());
            }
            for (i, entry) in entries.iter().enumerate() {
                let newest = entries
                    .get(i + 1)
                    .is_none_or(|next| next.name != entry.name || !compare_greater(&next.version, &entry.version));
                let line = format!("{}@{}", entry.name, entry.version);
                if newest {
                    println!("{}", line.green());
                } else {
                    println!("{}", line);
                }
                println!("  {}", entry.path.display());
            }
        }
        CacheAction::Prune => {
            let removed = prune(&store_dir)?;
            for entry in &removed {
                println!("Removed {}@{}", entry.name, entry.version);
            }
            println!("Pruned {} cached version(s)", removed.len());
        }
        CacheAction::Clean => {
            clean(&store_dir)?;
            println!("Cache cleaned: {}", store_dir.display());
        }
    }
    Ok(())
}
