//! Template merging: one rendered page per table row.
//!
//! Each row is substituted into a fresh copy of the template and written to
//! `<output_root>/<destination folder>/<file name>`, replacing any previous
//! file. Rows are processed in order; a row without a usable destination is
//! reported and skipped, it never aborts the rows after it.

mod row;
mod template;

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument};

use hubpress_shared::{HubError, Result};

pub use row::{PageRow, VariableMapping, needs_update};
pub use template::{Template, placeholders, render_row};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Options for a merge run.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Column holding the destination folder.
    pub destination_column: String,
    /// File written inside each destination folder.
    pub output_file_name: String,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            destination_column: "nom_dossier".into(),
            output_file_name: "index.qmd".into(),
        }
    }
}

/// A page written by the merger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPage {
    /// Destination folder as declared by the row.
    pub dest_folder: String,
    /// Full path of the written file.
    pub path: PathBuf,
    pub sha256: String,
    pub size_bytes: usize,
}

/// A row that could not be merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    /// Position of the row in the input.
    pub index: usize,
    pub reason: String,
}

/// Outcome of a merge run.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub written: Vec<MergedPage>,
    pub failures: Vec<RowFailure>,
    /// Text of the last page rendered.
    pub last_rendered: Option<String>,
}

// ---------------------------------------------------------------------------
// Merger
// ---------------------------------------------------------------------------

/// Merge every row into the template at `template_path`.
///
/// A missing template aborts before any row is written.
pub fn merge(
    template_path: &Path,
    rows: &[PageRow],
    output_root: &Path,
    options: &MergeOptions,
) -> Result<MergeReport> {
    let template = Template::load(template_path)?;
    merge_rows(&template, rows, output_root, options)
}

/// Merge every row into an already loaded template.
#[instrument(skip_all, fields(rows = rows.len(), output_root = %output_root.display()))]
pub fn merge_rows(
    template: &Template,
    rows: &[PageRow],
    output_root: &Path,
    options: &MergeOptions,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();
    let template_placeholders = template.placeholders();

    for (index, row) in rows.iter().enumerate() {
        let dest_folder = match row.non_blank(&options.destination_column) {
            Some(folder) => folder,
            None => {
                let err = HubError::schema(format!(
                    "row {index} has no '{}' value",
                    options.destination_column
                ));
                error!(index, error = %err, "row skipped");
                report.failures.push(RowFailure {
                    index,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let dir = match destination_dir(output_root, dest_folder) {
            Ok(dir) => dir,
            Err(err) => {
                error!(index, error = %err, "row skipped");
                report.failures.push(RowFailure {
                    index,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let rendered = template.render(row);

        let unfilled: Vec<&str> = template_placeholders
            .iter()
            .map(String::as_str)
            .filter(|name| row.get(name).is_none())
            .collect();
        if !unfilled.is_empty() {
            debug!(index, ?unfilled, "placeholders left verbatim");
        }

        let path = dir.join(&options.output_file_name);
        write_page(&path, &rendered)?;

        report.written.push(MergedPage {
            dest_folder: dest_folder.to_string(),
            path,
            sha256: sha256_hex(&rendered),
            size_bytes: rendered.len(),
        });
        report.last_rendered = Some(rendered);
    }

    info!(
        written = report.written.len(),
        failed = report.failures.len(),
        "merge complete"
    );

    Ok(report)
}

/// Resolve `<output_root>/<dest_folder>`; surrounding slashes are ignored.
///
/// Folders escaping the output root are rejected.
pub fn destination_dir(output_root: &Path, dest_folder: &str) -> Result<PathBuf> {
    let relative = dest_folder.trim().trim_matches('/');
    if relative.is_empty() {
        return Err(HubError::schema("destination folder is empty"));
    }

    let escapes = Path::new(relative).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(HubError::schema(format!(
            "destination folder '{dest_folder}' escapes the output root"
        )));
    }

    Ok(output_root.join(relative))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write a page, creating parent directories and replacing any previous file.
fn write_page(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HubError::io(parent, e))?;
    }

    if path.is_file() {
        std::fs::remove_file(path).map_err(|e| HubError::io(path, e))?;
    }

    std::fs::write(path, content).map_err(|e| HubError::io(path, e))?;
    debug!(path = %path.display(), "wrote page");
    Ok(())
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
