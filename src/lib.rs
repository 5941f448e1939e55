//! # Stencil Core Library
//!
//! `stencil` is a project-scaffolding CLI whose commands are not compiled in: each command
//! is a versioned package fetched from an npm-compatible registry, kept in a private store
//! under the tool's home directory and run out of process.
//!
//! This library holds everything behind the `stencil` binary.
//!
//! ## Modules Overview
//! - [`version`] – Resolving `latest` and comparing semantic versions
//! - [`registry`] – Talking to the registry (package documents, tarball downloads)
//! - [`cache`] – Store layout: cache paths, existence checks, listing and pruning
//! - [`installer`] – Verifying and unpacking package tarballs into the store
//! - [`package`] – The [`Package`] entity: prepare, exists, install, update, entry lookup
//! - [`dispatch`] – Mapping commands to packages and running them in a child process
//! - [`command`] – The receiving side: payload parsing and the command stage pipeline
//! - [`config`] – Startup settings (home, override path, registry, runtime)
//! - [`util`] – Manifest lookup and path helpers
//! - [`error`] – The library error type

pub mod error;
pub mod version;
pub mod registry;
pub mod cache;
pub mod installer;
pub mod package;
pub mod dispatch;
pub mod command;
pub mod config;
pub mod util;

pub use error::{Error, Result};
pub use version::*;
pub use installer::{InstallRequest, Installer};
pub use package::*;
pub use dispatch::*;
pub use config::Settings;
pub use registry::RegistryClient;
