//! Placing extracted images next to their pages.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use hubpress_shared::{HubError, Result};

use crate::archive::ExtractedFile;

/// An image declared by a page row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    /// Destination folder of the row's page, relative to the output root.
    pub dest_folder: String,
    /// Declared image file name. Only its last path component is matched.
    pub file_name: String,
}

impl AssetRequest {
    pub fn new(dest_folder: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            dest_folder: dest_folder.into(),
            file_name: file_name.into(),
        }
    }

    /// Last path component of the declared name.
    fn base_name(&self) -> Option<&str> {
        Path::new(self.file_name.trim())
            .file_name()
            .and_then(|n| n.to_str())
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct ResolveReport {
    /// Final location of every moved image.
    pub moved: Vec<PathBuf>,
    /// Requests with no matching extracted file.
    pub missing: Vec<AssetRequest>,
}

/// Move each requested image from the staging area to
/// `<output_root>/<dest_folder>/<file name>`.
///
/// Matching is by equality between the declared file name and the extracted
/// original name. A staged file is moved at most once; later requests for the
/// same name are reported missing. Unmatched requests are not an error.
#[instrument(skip_all, fields(requests = requests.len(), extracted = extracted.len()))]
pub fn resolve(
    requests: &[AssetRequest],
    extracted: &[ExtractedFile],
    output_root: &Path,
) -> Result<ResolveReport> {
    let mut available: HashMap<&str, &ExtractedFile> = HashMap::new();
    for file in extracted {
        if available.insert(file.original_name.as_str(), file).is_some() {
            warn!(name = %file.original_name, "duplicate name in archive, keeping the last one");
        }
    }

    let mut report = ResolveReport::default();
    for request in requests {
        let Some(name) = request.base_name() else {
            warn!(folder = %request.dest_folder, "empty image name, skipping");
            report.missing.push(request.clone());
            continue;
        };

        let Some(dir) = target_dir(output_root, &request.dest_folder) else {
            warn!(folder = %request.dest_folder, "unusable destination folder, skipping image");
            report.missing.push(request.clone());
            continue;
        };

        let Some(file) = available.remove(name) else {
            debug!(name, folder = %request.dest_folder, "no matching attachment");
            report.missing.push(request.clone());
            continue;
        };

        std::fs::create_dir_all(&dir).map_err(|e| HubError::io(&dir, e))?;
        let target = dir.join(name);
        move_file(&file.path, &target)?;

        debug!(from = %file.path.display(), to = %target.display(), "image placed");
        report.moved.push(target);
    }

    info!(
        moved = report.moved.len(),
        missing = report.missing.len(),
        "assets resolved"
    );
    Ok(report)
}

fn target_dir(output_root: &Path, dest_folder: &str) -> Option<PathBuf> {
    let relative = dest_folder.trim().trim_matches('/');
    if relative.is_empty() {
        return None;
    }
    let escapes = Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    (!escapes).then(|| output_root.join(relative))
}

/// Rename `from` to `to`, copying then deleting when a rename is not possible
/// (e.g. across filesystems). An existing `to` is replaced.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).map_err(|e| HubError::io(to, e))?;
    std::fs::remove_file(from).map_err(|e| HubError::io(from, e))?;
    Ok(())
}
