use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use crate::cache::{derive_cache_path, exists, sanitize_name};
use crate::error::{Error, Result};
use crate::installer::{InstallRequest, Installer};
use crate::util::resolve_entry_file;
use crate::version::VersionResolver;

/// Requested version of a package: either the `latest` sentinel or a concrete version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageVersion {
    Latest,
    Exact(String),
}

impl PackageVersion {
    pub fn is_latest(&self) -> bool {
        matches!(self, PackageVersion::Latest)
    }
}

impl From<&str> for PackageVersion {
    fn from(version: &str) -> Self {
        if version == "latest" {
            PackageVersion::Latest
        } else {
            PackageVersion::Exact(version.to_string())
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageVersion::Latest => f.write_str("latest"),
            PackageVersion::Exact(version) => f.write_str(version),
        }
    }
}

/// Construction options for a [`Package`].
#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Where the package is ultimately usable from.
    pub target_path: PathBuf,
    /// Private store; `None` switches the package into override mode.
    pub store_dir: Option<PathBuf>,
    pub name: String,
    pub version: PackageVersion,
}

/// A command package, either cache-managed or pointed at a local checkout.
///
/// In managed mode (`store_dir` set) the package lives in
/// `{store_dir}/_{sanitized}@{version}@{name}` and is installed/updated from the registry.
/// In override mode `target_path` is used as-is and the network is never touched.
pub struct Package<'a> {
    target_path: PathBuf,
    store_dir: Option<PathBuf>,
    name: String,
    version: PackageVersion,
    cache_key_prefix: String,
    resolver: &'a dyn VersionResolver,
    installer: &'a dyn Installer,
}

impl<'a> Package<'a> {
    /// Validates `options` and builds the package.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an empty name or version, or for paths that are not absolute.
    pub fn new(
        options: PackageOptions,
        resolver: &'a dyn VersionResolver,
        installer: &'a dyn Installer,
    ) -> Result<Self> {
        if options.name.trim().is_empty() {
            return Err(Error::Config("package name must not be empty".to_string()));
        }
        if let PackageVersion::Exact(version) = &options.version {
            if version.trim().is_empty() {
                return Err(Error::Config(format!(
                    "version of `{}` must not be empty",
                    options.name
                )));
            }
        }
        if options.target_path.as_os_str().is_empty() || !options.target_path.is_absolute() {
            return Err(Error::Config(format!(
                "target path `{}` must be absolute",
                options.target_path.display()
            )));
        }
        if let Some(store_dir) = &options.store_dir {
            if !store_dir.is_absolute() {
                return Err(Error::Config(format!(
                    "store dir `{}` must be absolute",
                    store_dir.display()
                )));
            }
        }
        Ok(Self {
            cache_key_prefix: sanitize_name(&options.name),
            target_path: options.target_path,
            store_dir: options.store_dir,
            name: options.name,
            version: options.version,
            resolver,
            installer,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn cache_key_prefix(&self) -> &str {
        &self.cache_key_prefix
    }

    /// Cache directory of the current version, `None` in override mode.
    ///
    /// Only meaningful after [`Package::prepare`] resolved a `latest` version.
    pub fn cache_file_path(&self) -> Option<PathBuf> {
        let store_dir = self.store_dir.as_deref()?;
        Some(self.specific_cache_file_path(store_dir, &self.version.to_string()))
    }

    fn specific_cache_file_path(&self, store_dir: &Path, version: &str) -> PathBuf {
        derive_cache_path(store_dir, &self.name, version)
    }

    /// Creates the store and resolves `latest` into a concrete version.
    ///
    /// Idempotent: once the version is concrete the registry is not asked again.
    pub fn prepare(&mut self) -> Result<()> {
        if let Some(store_dir) = &self.store_dir {
            if !store_dir.exists() {
                debug!(store = %store_dir.display(), "creating package store");
                std::fs::create_dir_all(store_dir)?;
            }
        }
        if self.version.is_latest() {
            let resolved = self.resolver.resolve_latest(&self.name)?;
            debug!(package = %self.name, version = %resolved, "resolved latest version");
            self.version = PackageVersion::Exact(resolved);
        }
        Ok(())
    }

    /// Whether the package is available locally.
    ///
    /// Managed mode checks the cache directory of the resolved version, override mode checks
    /// `target_path` and never resolves anything.
    pub fn exists(&mut self) -> Result<bool> {
        if self.store_dir.is_some() {
            self.prepare()?;
            Ok(self.cache_file_path().is_some_and(|path| exists(&path)))
        } else {
            Ok(exists(&self.target_path))
        }
    }

    /// Installs the current version into the store.
    ///
    /// # Errors
    /// Propagates [`Error::Registry`] from resolution and [`Error::Install`] from the installer.
    pub fn install(&mut self) -> Result<()> {
        let Some(store_dir) = self.store_dir.clone() else {
            debug!(path = %self.target_path.display(), "override mode, nothing to install");
            return Ok(());
        };
        self.prepare()?;
        let version = self.version.to_string();
        info!("installing {}@{}", self.name, version);
        self.installer.install(&InstallRequest {
            root: &self.target_path,
            store_dir: &store_dir,
            name: &self.name,
            version: &version,
        })
    }

    /// Installs the newest published version unless it is already cached.
    ///
    /// The in-memory version only moves to the new release after a successful install.
    pub fn update(&mut self) -> Result<()> {
        let Some(store_dir) = self.store_dir.clone() else {
            debug!(path = %self.target_path.display(), "override mode, nothing to update");
            return Ok(());
        };
        self.prepare()?;
        let latest = self.resolver.resolve_latest(&self.name)?;
        let latest_path = self.specific_cache_file_path(&store_dir, &latest);
        if exists(&latest_path) {
            debug!(package = %self.name, version = %latest, "latest version already cached");
            return Ok(());
        }
        info!("updating {} to {}", self.name, latest);
        self.installer.install(&InstallRequest {
            root: &self.target_path,
            store_dir: &store_dir,
            name: &self.name,
            version: &latest,
        })?;
        self.version = PackageVersion::Exact(latest);
        Ok(())
    }

    /// Path of the entry file declared by the package manifest, with `/` separators.
    ///
    /// `Ok(None)` means "nothing to invoke" and is not an error.
    pub fn root_file_path(&self) -> Result<Option<String>> {
        let start = self.cache_file_path().unwrap_or_else(|| self.target_path.clone());
        resolve_entry_file(&start)
    }
}
