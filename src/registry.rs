use std::collections::HashMap;
use serde::Deserialize;
use reqwest::blocking::Client;
use tracing::debug;
use crate::error::{Error, Result};
use crate::installer::{install_tarball, InstallRequest, Installer};
use crate::version::{highest_version, VersionResolver};

/// The public npm registry, used when nothing else is configured.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// A package document as served by an npm-compatible registry.
///
/// Only the fields needed for resolution and installation are kept.
#[derive(Debug, Deserialize)]
pub struct PackageDocument {
    pub name: String,
    /// Map of version identifiers to their release metadata.
    #[serde(default)]
    pub versions: HashMap<String, VersionDocument>,
}

#[derive(Debug, Deserialize)]
pub struct VersionDocument {
    pub version: String,
    pub dist: Dist,
}

/// Where to download a release and how to check it.
#[derive(Debug, Deserialize)]
pub struct Dist {
    /// URL of the gzipped tarball.
    pub tarball: String,
    /// Subresource-integrity string, e.g. `sha512-...`.
    pub integrity: Option<String>,
}

impl PackageDocument {
    /// Highest published semver version.
    pub fn latest_version(&self) -> Option<String> {
        highest_version(self.versions.keys().map(String::as_str))
    }
}

/// Builds the document URL for `package_name`, escaping the scope separator.
pub fn package_url(registry: &str, package_name: &str) -> String {
    format!(
        "{}/{}",
        registry.trim_end_matches('/'),
        package_name.replace('/', "%2f")
    )
}

/// Blocking client for an npm-compatible registry.
///
/// Serves both as the [`VersionResolver`] and as the [`Installer`] of the dispatcher.
pub struct RegistryClient {
    registry: String,
    client: Client,
}

impl RegistryClient {
    /// # Errors
    /// Returns [`Error::Config`] if the HTTP client can't be initialized.
    pub fn new(registry: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stencil/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            registry: registry.into(),
            client,
        })
    }

    /// Fetches the package document for `package_name`.
    ///
    /// # Errors
    /// Returns [`Error::Registry`] if the registry is unreachable, answers with a
    /// non-success status or sends something that is not a package document.
    pub fn fetch_package(&self, package_name: &str) -> Result<PackageDocument> {
        let url = package_url(&self.registry, package_name);
        debug!(%url, "fetching package document");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::registry(package_name, e))?;
        if !response.status().is_success() {
            return Err(Error::registry(
                package_name,
                format!("{url} answered HTTP {}", response.status()),
            ));
        }
        let body = response
            .text()
            .map_err(|e| Error::registry(package_name, e))?;
        serde_json::from_str(&body).map_err(|e| Error::registry(package_name, e))
    }

    fn download(&self, request: &InstallRequest<'_>, url: &str) -> Result<Vec<u8>> {
        debug!(%url, "downloading tarball");
        let fail = |reason: String| Error::install(request.name, request.version, reason);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("{url} answered HTTP {}", response.status())));
        }
        let bytes = response.bytes().map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl VersionResolver for RegistryClient {
    fn resolve_latest(&self, package_name: &str) -> Result<String> {
        let document = self.fetch_package(package_name)?;
        document
            .latest_version()
            .ok_or_else(|| Error::registry(package_name, "no published versions"))
    }
}

impl Installer for RegistryClient {
    fn install(&self, request: &InstallRequest<'_>) -> Result<()> {
        let document = self.fetch_package(request.name).map_err(|e| {
            Error::install(request.name, request.version, e)
        })?;
        let release = document.versions.get(request.version).ok_or_else(|| {
            Error::install(
                request.name,
                request.version,
                format!("version not published on {}", self.registry),
            )
        })?;
        let archive = self.download(request, &release.dist.tarball)?;
        install_tarball(request, &archive, release.dist.integrity.as_deref())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "name": "@stencil-cli/init",
        "dist-tags": { "latest": "1.10.0" },
        "versions": {
            "1.2.0": {
                "name": "@stencil-cli/init",
                "version": "1.2.0",
                "main": "lib/index.js",
                "dist": {
                    "tarball": "https://registry.example/@stencil-cli/init/-/init-1.2.0.tgz",
                    "shasum": "abc"
                }
            },
            "1.10.0": {
                "version": "1.10.0",
                "dist": {
                    "tarball": "https://registry.example/@stencil-cli/init/-/init-1.10.0.tgz",
                    "integrity": "sha512-AAAA"
                }
            }
        }
    }"#;

    #[test]
    fn test_package_document_parses_and_picks_highest() {
        let document: PackageDocument = serde_json::from_str(DOCUMENT).unwrap();
        assert_eq!(document.name, "@stencil-cli/init");
        assert_eq!(document.latest_version(), Some("1.10.0".to_string()));
        assert_eq!(
            document.versions["1.10.0"].dist.integrity.as_deref(),
            Some("sha512-AAAA")
        );
    }

    #[test]
    fn test_package_document_without_versions() {
        let document: PackageDocument = serde_json::from_str(r#"{"name":"empty"}"#).unwrap();
        assert_eq!(document.latest_version(), None);
    }

    #[test]
    fn test_package_url_escapes_scope() {
        assert_eq!(
            package_url("https://registry.npmjs.org/", "@stencil-cli/init"),
            "https://registry.npmjs.org/@stencil-cli%2finit"
        );
        assert_eq!(
            package_url("http://localhost:4873", "tpl"),
            "http://localhost:4873/tpl"
        );
    }

    #[test]
    fn test_unreachable_registry_is_registry_error() {
        // port 9 (discard) on localhost is not expected to serve HTTP
        let client = RegistryClient::new("http://127.0.0.1:9").unwrap();
        let err = client.resolve_latest("tpl").unwrap_err();
        assert!(matches!(err, Error::Registry { .. }));
    }
}
