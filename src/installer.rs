use std::io::Read;
use std::path::{Path, PathBuf};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha512};
use tracing::{debug, info};
use crate::cache::derive_cache_path;
use crate::error::{Error, Result};

/// Everything an installer needs to materialize one package version.
#[derive(Debug, Clone, Copy)]
pub struct InstallRequest<'a> {
    /// Root the package should be usable from (links land in `{root}/node_modules`).
    pub root: &'a Path,
    /// Private store holding one directory per `(name, version)`.
    pub store_dir: &'a Path,
    pub name: &'a str,
    /// Always concrete, never `latest`.
    pub version: &'a str,
}

impl InstallRequest<'_> {
    /// The directory this request will populate.
    pub fn cache_path(&self) -> PathBuf {
        derive_cache_path(self.store_dir, self.name, self.version)
    }
}

/// Package-manager-equivalent install step.
pub trait Installer {
    /// Installs `request.name@request.version` into the store.
    ///
    /// # Errors
    /// Returns [`Error::Install`] if anything in the download or extraction fails.
    fn install(&self, request: &InstallRequest<'_>) -> Result<()>;
}

/// Checks an npm-style `integrity` string (`sha512-<base64>`) against `bytes`.
///
/// Other algorithms are not verified and pass through.
pub fn verify_integrity(bytes: &[u8], integrity: &str) -> std::result::Result<(), String> {
    let Some(expected) = integrity
        .split_whitespace()
        .find_map(|entry| entry.strip_prefix("sha512-"))
    else {
        debug!(integrity, "no sha512 integrity entry, skipping verification");
        return Ok(());
    };
    let actual = STANDARD.encode(Sha512::digest(bytes));
    if actual != expected {
        return Err(format!(
            "integrity mismatch: expected sha512-{expected}, got sha512-{actual}"
        ));
    }
    Ok(())
}

/// Unpacks a gzipped package tarball into `dest` and returns the package root inside it.
///
/// Symlinks and hard links are skipped and every other entry goes through
/// [`tar::Entry::unpack_in`], so nothing is written outside `dest`.
pub fn extract_tarball<R: Read>(reader: R, dest: &Path) -> std::io::Result<PathBuf> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    for entry in archive.entries()? {
        let mut entry = entry?;
        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            debug!(path = %entry.path()?.display(), "skipping link entry");
            continue;
        }
        if !entry.unpack_in(dest)? {
            debug!(path = %entry.path()?.display(), "skipping entry outside the package");
        }
    }
    package_root(dest)
}

/// npm tarballs wrap their files in a single top-level directory, usually `package/`.
fn package_root(dest: &Path) -> std::io::Result<PathBuf> {
    let mut roots = Vec::new();
    for entry in std::fs::read_dir(dest)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unexpected top-level file {}", entry.file_name().to_string_lossy()),
            ));
        }
        roots.push(entry.path());
    }
    match roots.as_slice() {
        [root] => Ok(root.clone()),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("expected one top-level directory, found {}", roots.len()),
        )),
    }
}

/// Verifies and unpacks `archive` into the cache directory of `request`.
///
/// Extraction happens in a staging directory inside the store and the package root is renamed
/// into place, so a failed install never leaves a half-populated version directory behind.
pub fn install_tarball(
    request: &InstallRequest<'_>,
    archive: &[u8],
    integrity: Option<&str>,
) -> Result<PathBuf> {
    let fail = |reason: String| Error::install(request.name, request.version, reason);

    match integrity {
        Some(integrity) => verify_integrity(archive, integrity).map_err(fail)?,
        None => debug!(
            package = request.name,
            version = request.version,
            "no integrity published, skipping verification"
        ),
    }

    std::fs::create_dir_all(request.store_dir)
        .map_err(|e| fail(format!("could not create store {}: {e}", request.store_dir.display())))?;
    let staging = tempfile::Builder::new()
        .prefix(".staging-")
        .tempdir_in(request.store_dir)
        .map_err(|e| fail(format!("could not create staging directory: {e}")))?;
    let package_root = extract_tarball(archive, staging.path())
        .map_err(|e| fail(format!("could not extract archive: {e}")))?;

    let cache_path = request.cache_path();
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
    }
    if cache_path.exists() {
        // another run installed the same version meanwhile, last writer wins
        std::fs::remove_dir_all(&cache_path).map_err(|e| fail(e.to_string()))?;
    }
    std::fs::rename(&package_root, &cache_path).map_err(|e| {
        fail(format!("could not move package into {}: {e}", cache_path.display()))
    })?;
    drop(staging);

    link_package(request, &cache_path).map_err(|e| fail(format!("could not link package: {e}")))?;
    info!("installed {}@{} into {}", request.name, request.version, cache_path.display());
    Ok(cache_path)
}

/// Points `{root}/node_modules/{name}` at the freshly installed version.
#[cfg(unix)]
fn link_package(request: &InstallRequest<'_>, cache_path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::symlink;
    let link = request.root.join("node_modules").join(request.name);
    if link == cache_path {
        return Ok(());
    }
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if link.symlink_metadata().is_ok() {
        if link.is_dir() && !link.symlink_metadata()?.file_type().is_symlink() {
            std::fs::remove_dir_all(&link)?;
        } else {
            std::fs::remove_file(&link)?;
        }
    }
    symlink(cache_path, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_package(_request: &InstallRequest<'_>, _cache_path: &Path) -> std::io::Result<()> {
    // resolution always goes through the store, the link is only a convenience
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    /// Builds an npm-style tarball (`package/...`) from `(path, contents)` pairs.
    fn build_tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("package/{path}"), contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn integrity_of(bytes: &[u8]) -> String {
        format!("sha512-{}", STANDARD.encode(Sha512::digest(bytes)))
    }

    #[test]
    fn test_verify_integrity() {
        let bytes = b"hello";
        assert!(verify_integrity(bytes, &integrity_of(bytes)).is_ok());
        assert!(verify_integrity(b"tampered", &integrity_of(bytes)).is_err());
        assert!(verify_integrity(bytes, "sha1-abcdef").is_ok());
    }

    #[test]
    fn test_install_tarball_populates_cache_dir() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("dependencies");
        let store = root.join("node_modules");
        let archive = build_tarball(&[
            ("package.json", r#"{"name":"@stencil-cli/init","main":"lib/index.js"}"#),
            ("lib/index.js", "module.exports = () => {}"),
        ]);
        let request = InstallRequest {
            root: &root,
            store_dir: &store,
            name: "@stencil-cli/init",
            version: "1.2.0",
        };

        let path = install_tarball(&request, &archive, Some(&integrity_of(&archive))).unwrap();
        assert_eq!(path, store.join("_@stencil-cli_init@1.2.0@@stencil-cli/init"));
        assert!(path.join("package.json").exists());
        assert!(path.join("lib/index.js").exists());
        let leftovers: Vec<_> = std::fs::read_dir(&store)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_install_tarball_links_latest_install() {
        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let store = root.join("node_modules");
        let archive = build_tarball(&[("package.json", r#"{"main":"index.js"}"#)]);
        for version in ["1.0.0", "1.1.0"] {
            let request = InstallRequest {
                root: &root,
                store_dir: &store,
                name: "@stencil-cli/init",
                version,
            };
            install_tarball(&request, &archive, None).unwrap();
        }
        let link = store.join("@stencil-cli/init");
        assert_eq!(
            std::fs::read_link(link).unwrap(),
            store.join("_@stencil-cli_init@1.1.0@@stencil-cli/init")
        );
    }

    #[test]
    fn test_install_tarball_rejects_bad_integrity() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let archive = build_tarball(&[("package.json", "{}")]);
        let request = InstallRequest {
            root: dir.path(),
            store_dir: &store,
            name: "tpl",
            version: "1.0.0",
        };
        let err = install_tarball(&request, &archive, Some(&integrity_of(b"other"))).unwrap_err();
        assert!(matches!(err, Error::Install { .. }));
        assert!(!request.cache_path().exists());
    }

    #[test]
    fn test_install_tarball_ignores_symlink_entries() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let store = dir.path().join("node_modules");

        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_size(0);
        link.set_mode(0o777);
        builder
            .append_link(&mut link, "package/evil", outside.path())
            .unwrap();
        for (path, contents) in [("package/package.json", "{}"), ("package/evil/pwned.txt", "x")] {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
        }
        let archive = builder.into_inner().unwrap().finish().unwrap();

        let request = InstallRequest {
            root: dir.path(),
            store_dir: &store,
            name: "tpl",
            version: "1.0.0",
        };
        let path = install_tarball(&request, &archive, None).unwrap();

        assert!(!outside.path().join("pwned.txt").exists());
        let evil = path.join("evil");
        assert!(!evil.symlink_metadata().unwrap().file_type().is_symlink());
        assert!(evil.join("pwned.txt").is_file());
    }

    #[test]
    fn test_install_tarball_requires_single_root() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("node_modules");
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for path in ["package/package.json", "other/index.js"] {
            let mut header = tar::Header::new_gnu();
            header.set_size(2);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, &b"{}"[..]).unwrap();
        }
        let archive = builder.into_inner().unwrap().finish().unwrap();

        let request = InstallRequest {
            root: dir.path(),
            store_dir: &store,
            name: "tpl",
            version: "1.0.0",
        };
        let err = install_tarball(&request, &archive, None).unwrap_err();
        assert!(matches!(err, Error::Install { .. }));
        assert!(!request.cache_path().exists());
    }
}
