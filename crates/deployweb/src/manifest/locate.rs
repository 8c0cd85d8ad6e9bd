//! Manifest lookup inside a cloned repository.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::{DeployError, DeployResult};

/// Recognised manifest file names, in lookup order.
pub const MANIFEST_FILE_NAMES: &[&str] = &["manifest.yaml", "manifest.yml"];

/// Resolve `manifest_path` under `workspace_root` to a manifest file.
///
/// `manifest_path` names a directory relative to the repository root; a
/// leading `/` is ignored. The directory must exist inside the repository
/// and hold one of [`MANIFEST_FILE_NAMES`] directly. A path that does not
/// exist and a directory without a manifest are the same error.
#[instrument(skip(workspace_root))]
pub fn locate_manifest(workspace_root: &Path, manifest_path: &str) -> DeployResult<PathBuf> {
    let not_found = |reason: &str| DeployError::ManifestPathNotFound {
        path: manifest_path.to_owned(),
        reason: reason.to_owned(),
    };

    let relative = Path::new(manifest_path.trim().trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(not_found("path must stay inside the repository"));
    }

    let root = workspace_root
        .canonicalize()
        .map_err(|e| not_found(&format!("workspace unavailable: {e}")))?;
    let dir = root.join(relative);

    if !dir.is_dir() {
        return Err(not_found("no such directory"));
    }

    let dir = dir
        .canonicalize()
        .map_err(|e| not_found(&e.to_string()))?;
    if !dir.starts_with(&root) {
        return Err(not_found("path must stay inside the repository"));
    }

    for name in MANIFEST_FILE_NAMES {
        let candidate = dir.join(name);
        if !candidate.is_file() {
            continue;
        }
        let resolved = candidate
            .canonicalize()
            .map_err(|e| not_found(&e.to_string()))?;
        if !resolved.starts_with(&root) {
            return Err(not_found("manifest must stay inside the repository"));
        }
        debug!(manifest = %resolved.display(), "manifest located");
        return Ok(resolved);
    }

    Err(not_found("no manifest file in directory"))
}
