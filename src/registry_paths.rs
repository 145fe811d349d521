//! Purpose: Shared local image-directory and registry-name path resolution helpers.
//! Exports: `default_registry_dir` and `resolve_named_image_path`.
//! Role: Keep CLI path semantics aligned from one source.
//! Invariants: Default image directory remains `~/.facetmap`.
//! Invariants: Named registry refs must not contain path separators.

use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RegistryNameResolveError {
    ContainsPathSeparator,
}

pub(crate) fn default_registry_dir() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".facetmap")
}

pub(crate) fn resolve_named_image_path(
    name: &str,
    registry_dir: &Path,
) -> Result<PathBuf, RegistryNameResolveError> {
    if name.contains('/') {
        return Err(RegistryNameResolveError::ContainsPathSeparator);
    }
    if name.ends_with(".facetmap") {
        return Ok(registry_dir.join(name));
    }
    Ok(registry_dir.join(format!("{name}.facetmap")))
}
