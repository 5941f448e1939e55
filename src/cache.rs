//! On-disk layout of the package store.
//!
//! Every installed `(name, version)` pair lives in its own directory:
//!
//! ```text
//! {store_dir}/_{sanitized_name}@{version}@{name}/
//! ```
//!
//! The presence of that directory is the only signal that a version is installed, so the
//! format must stay stable. Scoped names (`@scope/pkg`) contain a `/` and therefore nest
//! one level deeper, e.g. `_@scope_pkg@1.0.0@@scope/pkg`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use regex::Regex;
use tracing::debug;
use crate::error::Result;
use crate::version::compare_greater;

/// Replaces path separators in a package name so it can be used as a single path segment.
pub fn sanitize_name(package_name: &str) -> String {
    package_name.replace(['/', '\\'], "_")
}

/// Builds the cache directory for `package_name` at `version` inside `store_dir`.
///
/// Pure: the same inputs always produce the same path.
pub fn derive_cache_path(store_dir: &Path, package_name: &str, version: &str) -> PathBuf {
    store_dir.join(format!(
        "_{}@{}@{}",
        sanitize_name(package_name),
        version,
        package_name
    ))
}

/// Direct filesystem check, never cached.
pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// A package version found in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
}

fn entry_pattern() -> Regex {
    // sanitized names never contain '/', versions never contain '@'
    Regex::new(r"^_(@?[^@/]+)@([^@/]+)@(@?[^@/]+)$").expect("static regex is valid")
}

/// Lists every cached package version in `store_dir`, sorted by name then version.
///
/// Directories that don't follow the cache naming scheme (links, staging dirs) are skipped.
pub fn list_entries(store_dir: &Path) -> Result<Vec<CacheEntry>> {
    if !store_dir.exists() {
        return Ok(vec![]);
    }
    let re = entry_pattern();
    let mut entries = Vec::new();
    for dir_entry in std::fs::read_dir(store_dir)? {
        let dir_entry = dir_entry?;
        if !dir_entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = dir_entry.file_name().to_string_lossy().to_string();
        let Some(caps) = re.captures(&file_name) else {
            continue;
        };
        let sanitized = &caps[1];
        let version = caps[2].to_string();
        let head = &caps[3];

        if head.starts_with('@') {
            // scoped: the rest of the name is a child directory
            for child in std::fs::read_dir(dir_entry.path())? {
                let child = child?;
                let name = format!("{}/{}", head, child.file_name().to_string_lossy());
                if sanitize_name(&name) == sanitized {
                    entries.push(CacheEntry {
                        path: derive_cache_path(store_dir, &name, &version),
                        name,
                        version: version.clone(),
                    });
                }
            }
        } else if sanitize_name(head) == sanitized {
            entries.push(CacheEntry {
                path: derive_cache_path(store_dir, head, &version),
                name: head.to_string(),
                version,
            });
        }
    }
    entries.sort_by(|a, b| {
        a.name.cmp(&b.name).then_with(|| {
            if compare_greater(&a.version, &b.version) {
                std::cmp::Ordering::Greater
            } else if compare_greater(&b.version, &a.version) {
                std::cmp::Ordering::Less
            } else {
                a.version.cmp(&b.version)
            }
        })
    });
    Ok(entries)
}

/// Removes every cached version except the highest one of each package.
///
/// Returns the entries that were removed.
pub fn prune(store_dir: &Path) -> Result<Vec<CacheEntry>> {
    let mut newest: BTreeMap<String, CacheEntry> = BTreeMap::new();
    let mut stale = Vec::new();
    for entry in list_entries(store_dir)? {
        let is_newer = newest
            .get(&entry.name)
            .is_none_or(|current| compare_greater(&entry.version, &current.version));
        if !is_newer {
            stale.push(entry);
        } else if let Some(previous) = newest.insert(entry.name.clone(), entry) {
            stale.push(previous);
        }
    }
    for entry in &stale {
        debug!(name = %entry.name, version = %entry.version, "removing cached version");
        remove_entry_dir(store_dir, entry)?;
    }
    Ok(stale)
}

fn remove_entry_dir(store_dir: &Path, entry: &CacheEntry) -> Result<()> {
    // for scoped names remove the outer `_@scope_pkg@ver@@scope` directory as well
    let top = store_dir.join(format!(
        "_{}@{}@{}",
        sanitize_name(&entry.name),
        entry.version,
        entry.name.split('/').next().unwrap_or(&entry.name)
    ));
    if top.exists() {
        std::fs::remove_dir_all(&top)?;
    }
    Ok(())
}

/// Wipes the whole store and recreates it empty.
pub fn clean(store_dir: &Path) -> Result<()> {
    if store_dir.exists() {
        std::fs::remove_dir_all(store_dir)?;
    }
    std::fs::create_dir_all(store_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_name_replaces_separators() {
        assert_eq!(sanitize_name("@stencil-cli/init"), "@stencil-cli_init");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_name("plain"), "plain");
    }

    #[test]
    fn test_derive_cache_path_format() {
        let path = derive_cache_path(Path::new("/store"), "@stencil-cli/init", "1.2.0");
        assert_eq!(
            path,
            PathBuf::from("/store/_@stencil-cli_init@1.2.0@@stencil-cli/init")
        );
    }

    #[test]
    fn test_derive_cache_path_is_deterministic_and_injective() {
        let store = Path::new("/store");
        let a = derive_cache_path(store, "tpl", "1.0.0");
        let b = derive_cache_path(store, "tpl", "1.0.0");
        let c = derive_cache_path(store, "tpl", "1.0.1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_exists_restats() {
        let dir = tempdir().unwrap();
        let path = derive_cache_path(dir.path(), "tpl", "1.0.0");
        assert!(!exists(&path));
        std::fs::create_dir_all(&path).unwrap();
        assert!(exists(&path));
        std::fs::remove_dir_all(&path).unwrap();
        assert!(!exists(&path));
    }

    fn seed(store: &Path, name: &str, version: &str) {
        std::fs::create_dir_all(derive_cache_path(store, name, version)).unwrap();
    }

    #[test]
    fn test_list_entries_parses_scoped_and_plain() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "@stencil-cli/init", "1.10.0");
        seed(dir.path(), "@stencil-cli/init", "1.2.0");
        seed(dir.path(), "plain-tpl", "0.3.0");
        std::fs::create_dir_all(dir.path().join("@stencil-cli")).unwrap();

        let entries = list_entries(dir.path()).unwrap();
        let listed: Vec<_> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.version.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("@stencil-cli/init", "1.2.0"),
                ("@stencil-cli/init", "1.10.0"),
                ("plain-tpl", "0.3.0"),
            ]
        );
        assert!(entries.iter().all(|e| e.path.exists()));
    }

    #[test]
    fn test_list_entries_missing_store() {
        let dir = tempdir().unwrap();
        assert!(list_entries(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_prune_keeps_highest() {
        let dir = tempdir().unwrap();
        seed(dir.path(), "@stencil-cli/init", "1.0.0");
        seed(dir.path(), "@stencil-cli/init", "1.10.0");
        seed(dir.path(), "@stencil-cli/init", "1.9.0");
        seed(dir.path(), "plain-tpl", "0.3.0");

        let removed = prune(dir.path()).unwrap();
        assert_eq!(removed.len(), 2);

        let left = list_entries(dir.path()).unwrap();
        let left: Vec<_> = left.iter().map(|e| e.version.as_str()).collect();
        assert_eq!(left, vec!["1.10.0", "0.3.0"]);
        assert!(!dir.path().join("_@stencil-cli_init@1.0.0@@stencil-cli").exists());
    }

    #[test]
    fn test_clean_recreates_store() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("node_modules");
        seed(&store, "tpl", "1.0.0");
        clean(&store).unwrap();
        assert!(store.exists());
        assert!(list_entries(&store).unwrap().is_empty());
    }
}
