//! Semantic version helpers

use semver::Version;

use crate::error::{PluginHubError, Result};

/// Parse a semantic version, tolerating a leading `v`
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).map_err(|e| PluginHubError::VersionParse {
        version: raw.to_string(),
        message: e.to_string(),
    })
}

/// `candidate > current`
pub fn is_newer(candidate: &str, current: &str) -> Result<bool> {
    Ok(parse_version(candidate)? > parse_version(current)?)
}

/// `NOT(min > current)`; an empty `min` is always satisfied
pub fn satisfies_min(min: &str, current: &str) -> Result<bool> {
    if min.trim().is_empty() {
        return Ok(true);
    }
    Ok(parse_version(min)? <= parse_version(current)?)
}
