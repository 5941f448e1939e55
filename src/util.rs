use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use serde::Deserialize;
use crate::error::{Error, Result};

/// Name of the manifest a package declares its entry point in.
pub const MANIFEST_FILE: &str = "package.json";

/// Directory names ignored when deciding whether a directory is empty.
const IGNORED_ENTRIES: &[&str] = &["node_modules"];

/// Rewrites platform separators to `/` so paths look the same on every OS.
pub fn format_path<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref().to_string_lossy();
    if MAIN_SEPARATOR == '/' {
        path.into_owned()
    } else {
        path.replace(MAIN_SEPARATOR, "/")
    }
}

/// Lexically resolves `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Walks upward from `start` and returns the first directory that contains a manifest.
pub fn find_package_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(MANIFEST_FILE).is_file())
        .map(Path::to_path_buf)
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    main: Option<String>,
}

/// Reads the `main` field of the manifest in `package_dir`.
///
/// # Errors
/// Returns an error if the manifest can't be read or is not valid JSON.
pub fn read_manifest_main(package_dir: &Path) -> Result<Option<String>> {
    let path = package_dir.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path)?;
    let manifest: PackageManifest = serde_json::from_str(&content).map_err(|e| Error::Manifest {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(manifest.main.filter(|main| !main.trim().is_empty()))
}

/// Finds the entry file declared by the nearest manifest at or above `start`.
///
/// `Ok(None)` means there is nothing to run: no manifest, or one without a `main` field.
pub fn resolve_entry_file(start: &Path) -> Result<Option<String>> {
    let Some(dir) = find_package_dir(start) else {
        return Ok(None);
    };
    let Some(main) = read_manifest_main(&dir)? else {
        return Ok(None);
    };
    Ok(Some(format_path(normalize_path(&dir.join(main)))))
}

/// Whether `dir` is empty, ignoring dot-files and `node_modules`.
pub fn is_dir_empty(dir: &Path) -> Result<bool> {
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || IGNORED_ENTRIES.iter().any(|ignored| name == *ignored) {
            continue;
        }
        return Ok(false);
    }
    Ok(true)
}

/// Removes everything inside `dir` but keeps the directory itself.
pub fn empty_dir(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(entry.path())?;
        } else {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
