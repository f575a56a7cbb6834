//! Source list loading: one locator per line.

use std::path::Path;

use tracing::{debug, instrument};

use kindle_voz_shared::{Result, VozError};

/// Read the source list at `path`.
///
/// Lines are not validated; a malformed locator fails later, at fetch time.
#[instrument]
pub fn load_locators(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| VozError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let locators = parse_locators(&content);
    debug!(count = locators.len(), "source list loaded");
    Ok(locators)
}

/// Split `content` into locators, keeping input order and dropping blank lines.
pub fn parse_locators(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
