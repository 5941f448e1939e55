use semver::Version;
use crate::error::Result;

/// Anything that can answer "what is the newest published version of this package".
///
/// [`crate::registry::RegistryClient`] is the real implementation; tests swap in fakes.
pub trait VersionResolver {
    /// Resolves the `latest` sentinel to a concrete version for `package_name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Registry`] if the lookup fails or no version is published.
    fn resolve_latest(&self, package_name: &str) -> Result<String>;
}

/// Parses a version string, tolerating a leading `v`.
pub fn parse_version(version: &str) -> Option<Version> {
    let cleaned = version.strip_prefix('v').unwrap_or(version);
    Version::parse(cleaned).ok()
}

/// Returns `true` if `a` is strictly greater than `b` in semver ordering.
///
/// Unparsable input on either side never compares greater.
pub fn compare_greater(a: &str, b: &str) -> bool {
    match (parse_version(a), parse_version(b)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

/// Picks the highest valid semver version out of `versions`, skipping anything that doesn't parse.
pub fn highest_version<'a, I>(versions: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter_map(|v| parse_version(v).map(|parsed| (parsed, v)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, v)| v.to_string())
}
