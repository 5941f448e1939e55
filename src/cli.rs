use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    /// Enable debug output
    #[clap(short, long, global = true)]
    pub(crate) debug: bool,
    /// Run commands from a local package checkout instead of the cached registry package
    #[clap(short = 't', long, global = true)]
    pub(crate) target_path: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: StencilCommand,
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum StencilCommand {
    /// Creates a new project or component from a template
    Init {
        /// Name of the project to create
        project_name: Option<String>,
        /// Clear a non-empty target directory
        #[clap(short, long)]
        force: bool,
    },
    /// Inspects or cleans the local command package cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand, Clone, PartialEq)]
pub enum CacheAction {
    /// List cached package versions
    List,
    /// Remove all but the newest cached version of each package
    Prune,
    /// Remove every cached package
    Clean,
}
