//! Startup configuration.
//!
//! [`Settings`] is built once in `main` from, in increasing precedence: built-in defaults,
//! `{cli_home}/config.toml`, `STENCIL_*` environment variables and command-line flags.
//! It is then passed by reference to everything that needs it.

use std::path::{Path, PathBuf};
use directories::BaseDirs;
use serde::Deserialize;
use tracing::debug;
use crate::error::{Error, Result};
use crate::registry::DEFAULT_REGISTRY;

/// Tool home, relative to the user's home directory.
pub const DEFAULT_CLI_HOME: &str = ".stencil";
pub const CONFIG_FILE: &str = "config.toml";
/// Directory under the tool home that acts as install root for command packages.
pub const CACHE_DIR: &str = "dependencies";
pub const STORE_DIR: &str = "node_modules";

pub const ENV_CLI_HOME: &str = "STENCIL_CLI_HOME";
pub const ENV_TARGET_PATH: &str = "STENCIL_TARGET_PATH";
pub const ENV_REGISTRY: &str = "STENCIL_REGISTRY";
pub const ENV_RUNTIME: &str = "STENCIL_RUNTIME";

pub const DEFAULT_RUNTIME: &str = "node";
/// Constant launcher script: the entry path and payload arrive as the last two argv entries.
pub const NODE_BOOTSTRAP: &str =
    "const [entry, payload] = process.argv.slice(-2); require(entry).call(null, payload);";

/// Optional settings read from `{cli_home}/config.toml`.
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct FileConfig {
    pub registry: Option<String>,
    pub runtime: Option<String>,
    pub runtime_args: Option<Vec<String>>,
}

impl FileConfig {
    /// Loads the config file, or defaults if it doesn't exist.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file exists but is not valid TOML.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

/// Program used to run a command package's entry file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    pub program: String,
    /// Arguments placed before the entry path and payload.
    pub args: Vec<String>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            program: DEFAULT_RUNTIME.to_string(),
            args: vec!["-e".to_string(), NODE_BOOTSTRAP.to_string(), "--".to_string()],
        }
    }
}

/// Values coming from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub user_home: PathBuf,
    pub cli_home: PathBuf,
    /// Local package checkout; when set, cache management is bypassed.
    pub target_path: Option<PathBuf>,
    pub registry: String,
    pub runtime: Runtime,
}

impl Settings {
    /// Builds settings from the real user home and process environment.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let user_home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        let cwd = std::env::current_dir()?;
        Self::load_with(user_home, &cwd, |key| std::env::var(key).ok(), overrides)
    }

    /// Builds settings from explicit inputs.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the user home is unknown or missing, or the config file is invalid.
    pub fn load_with<F>(
        user_home: Option<PathBuf>,
        cwd: &Path,
        env: F,
        overrides: &Overrides,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user_home = user_home
            .filter(|home| home.exists())
            .ok_or_else(|| Error::Config("user home directory does not exist".to_string()))?;

        let non_empty = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let cli_home = user_home.join(non_empty(ENV_CLI_HOME).unwrap_or_else(|| DEFAULT_CLI_HOME.to_string()));
        let file = FileConfig::load_or_default(cli_home.join(CONFIG_FILE))?;

        let target_path = overrides
            .target_path
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .or_else(|| non_empty(ENV_TARGET_PATH).map(PathBuf::from))
            .map(|path| if path.is_absolute() { path } else { cwd.join(path) });

        let registry = non_empty(ENV_REGISTRY)
            .or(file.registry)
            .unwrap_or_else(|| DEFAULT_REGISTRY.to_string());

        let runtime = match (non_empty(ENV_RUNTIME).or(file.runtime), file.runtime_args) {
            (None, None) => Runtime::default(),
            (program, args) => {
                let default = Runtime::default();
                Runtime {
                    program: program.unwrap_or(default.program),
                    args: args.unwrap_or(default.args),
                }
            }
        };

        let settings = Self {
            user_home,
            cli_home,
            target_path,
            registry,
            runtime,
        };
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn config_file(&self) -> PathBuf {
        self.cli_home.join(CONFIG_FILE)
    }

    /// Install root of managed command packages.
    pub fn dependencies_dir(&self) -> PathBuf {
        self.cli_home.join(CACHE_DIR)
    }

    /// Private store holding one directory per cached package version.
    pub fn store_dir(&self) -> PathBuf {
        self.dependencies_dir().join(STORE_DIR)
    }
}
