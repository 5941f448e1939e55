use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while resolving, installing or dispatching a command package.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing construction options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The registry could not be reached or had nothing usable for the package.
    #[error("registry lookup for `{package}` failed: {reason}")]
    Registry { package: String, reason: String },

    /// Downloading or materializing a package failed.
    #[error("failed to install {package}@{version}: {reason}")]
    Install {
        package: String,
        version: String,
        reason: String,
    },

    #[error("unknown command `{name}` (available: {})", .available.join(", "))]
    UnknownCommand { name: String, available: Vec<String> },

    /// The package resolved fine but declares no entry file.
    #[error("no entry point found for `{package}` under {}", .path.display())]
    EntryNotFound { package: String, path: PathBuf },

    #[error("command execution failed: {0}")]
    CommandExecution(String),

    /// The serialized payload handed to a command is not usable.
    #[error("invalid command arguments: {0}")]
    InvalidArguments(String),

    #[error("directory {} is not empty, pass --force to clear it", .0.display())]
    DirectoryNotEmpty(PathBuf),

    #[error("malformed manifest {}: {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn registry(package: &str, reason: impl ToString) -> Self {
        Error::Registry {
            package: package.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn install(package: &str, version: &str, reason: impl ToString) -> Self {
        Error::Install {
            package: package.to_string(),
            version: version.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_lists_available() {
        let err = Error::UnknownCommand {
            name: "deploy".to_string(),
            available: vec!["init".to_string(), "add".to_string()],
        };
        assert_eq!(err.to_string(), "unknown command `deploy` (available: init, add)");
    }

    #[test]
    fn test_install_error_mentions_package_and_version() {
        let err = Error::install("@stencil-cli/init", "1.2.0", "HTTP 404");
        assert_eq!(
            err.to_string(),
            "failed to install @stencil-cli/init@1.2.0: HTTP 404"
        );
    }
}
