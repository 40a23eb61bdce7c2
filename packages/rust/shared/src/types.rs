//! Core domain types shared by the remote, merge and pipeline crates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column name → raw cell value, as returned by the tabular data source.
pub type Fields = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// RemoteEntry
// ---------------------------------------------------------------------------

/// One item of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// File name (last path component).
    pub name: String,
    /// Path relative to the repository root.
    pub path: String,
    /// Entry kind: `file`, `dir`, `symlink`, ...
    #[serde(rename = "type")]
    pub kind: String,
}

impl RemoteEntry {
    /// Whether this entry is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

// ---------------------------------------------------------------------------
// RepoLocation
// ---------------------------------------------------------------------------

/// A branch of a repository on a Git hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoLocation {
    /// Base URL serving raw files (`https://raw.githubusercontent.com`).
    pub raw_base: String,
    /// Base URL of the contents API (`https://api.github.com`).
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoLocation {
    /// Raw download URL of `path`.
    pub fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/refs/heads/{}/{}",
            self.raw_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.branch,
            path.trim_start_matches('/')
        )
    }

    /// Contents API URL listing the directory at `path`.
    pub fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.repo,
            path.trim_matches('/'),
            self.branch
        )
    }
}

// ---------------------------------------------------------------------------
// TableRecord
// ---------------------------------------------------------------------------

/// A single row of a remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    /// Row identifier in the source table.
    pub id: i64,
    /// Cell values keyed by column id.
    #[serde(default)]
    pub fields: Fields,
}

/// Render a cell as the text substituted into templates.
///
/// Grist list cells are encoded as `["L", item, ...]`; their items are joined
/// with `", "`.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.first().and_then(Value::as_str) == Some("L") => items[1..]
            .iter()
            .map(cell_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
