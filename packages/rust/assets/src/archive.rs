//! Attachment archive extraction.
//!
//! Every file in the archive is named `<40-character content hash><original name>`.
//! Entries are extracted flat into a staging directory and paired with the
//! original name recovered by dropping the hash.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use hubpress_shared::{HubError, Result};

/// Width of the content hash prepended to every archived file name.
pub const HASH_PREFIX_LEN: usize = 40;

/// A file extracted from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    /// Name with the hash prefix removed.
    pub original_name: String,
    /// Location in the staging directory.
    pub path: PathBuf,
}

/// Drop the fixed-width hash prefix from an archived file name.
///
/// Returns `None` when `name` is shorter than [`HASH_PREFIX_LEN`] characters.
pub fn strip_prefix(name: &str) -> Option<&str> {
    if name.chars().count() < HASH_PREFIX_LEN {
        return None;
    }
    let offset = name
        .char_indices()
        .nth(HASH_PREFIX_LEN)
        .map_or(name.len(), |(i, _)| i);
    Some(&name[offset..])
}

/// Extract every file of the zip archive directly into `staging`.
///
/// Directory components of entry names are ignored and directory entries are
/// skipped. Entries whose original name cannot be recovered are skipped with a
/// warning.
#[instrument(skip_all, fields(archive = %archive.display(), staging = %staging.display()))]
pub fn extract_flat(archive: &Path, staging: &Path) -> Result<Vec<ExtractedFile>> {
    let file = File::open(archive).map_err(|e| HubError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| HubError::Archive(format!("{}: {e}", archive.display())))?;

    std::fs::create_dir_all(staging).map_err(|e| HubError::io(staging, e))?;

    let mut extracted = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| HubError::Archive(format!("entry {index}: {e}")))?;

        if entry.is_dir() {
            continue;
        }

        let Some(stored_name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        else {
            warn!(entry = entry.name(), "unsafe entry name, skipping");
            continue;
        };

        let original_name = match strip_prefix(&stored_name) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                warn!(entry = %stored_name, "no original name after the hash prefix, skipping");
                continue;
            }
        };

        let path = staging.join(&stored_name);
        let mut out = File::create(&path).map_err(|e| HubError::io(&path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| HubError::io(&path, e))?;

        debug!(original = %original_name, path = %path.display(), "extracted");
        extracted.push(ExtractedFile {
            original_name,
            path,
        });
    }

    info!(count = extracted.len(), "archive extracted");
    Ok(extracted)
}
