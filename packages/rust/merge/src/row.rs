//! Typed table rows and the column → placeholder rename table.

use std::collections::BTreeMap;

use tracing::debug;

use hubpress_shared::{TableRecord, cell_to_string};

// ---------------------------------------------------------------------------
// PageRow
// ---------------------------------------------------------------------------

/// One page definition: placeholder name → substituted text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRow {
    values: BTreeMap<String, String>,
}

impl PageRow {
    /// Build a row from `(column, value)` pairs. Later duplicates win.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }

    /// Convert a raw table record, renaming columns through `mapping`.
    ///
    /// The record id is exposed as the `id` column. Columns that are neither
    /// in the mapping nor in `known_columns` are kept and logged.
    pub fn from_record(
        record: &TableRecord,
        mapping: &VariableMapping,
        known_columns: &[&str],
    ) -> Self {
        let mut values = BTreeMap::new();
        values.insert("id".to_string(), record.id.to_string());

        for (column, value) in &record.fields {
            let text = cell_to_string(value);
            match mapping.target(column) {
                Some(target) => {
                    values.insert(target.to_string(), text);
                }
                None => {
                    if !known_columns.contains(&column.as_str()) && !mapping.is_target(column) {
                        debug!(row = record.id, column = %column, "unknown column kept as-is");
                    }
                    values.insert(column.clone(), text);
                }
            }
        }

        for (derived, source) in &mapping.derived {
            if record.fields.contains_key(derived) {
                continue;
            }
            if let Some(value) = record.fields.get(source) {
                let target = mapping.target(derived).unwrap_or(derived.as_str()).to_string();
                values.insert(target, cell_to_string(value));
            }
        }

        Self { values }
    }

    /// Value of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Set `column` to `value`.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.values.insert(column.into(), value.into());
    }

    /// `(column, value)` pairs of this row.
    pub(crate) fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of `column` if it is present and not blank.
    pub fn non_blank(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Whether `column` holds a truthy flag (`true`, `1`, `yes`, `oui`).
pub fn needs_update(row: &PageRow, column: &str) -> bool {
    row.get(column)
        .map(|v| v.trim().to_ascii_lowercase())
        .is_some_and(|v| matches!(v.as_str(), "true" | "1" | "yes" | "oui"))
}

// ---------------------------------------------------------------------------
// VariableMapping
// ---------------------------------------------------------------------------

/// Fixed rename table from source columns to template placeholder names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMapping {
    renames: Vec<(String, String)>,
    /// `(new column, copied from)` pairs filled before renaming.
    derived: Vec<(String, String)>,
}

impl VariableMapping {
    /// Build a mapping from `(source column, placeholder)` pairs.
    pub fn new(renames: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            renames: renames.into_iter().collect(),
            derived: Vec::new(),
        }
    }

    /// Add a column copied from another one when the source lacks it.
    pub fn with_derived(mut self, column: impl Into<String>, from: impl Into<String>) -> Self {
        self.derived.push((column.into(), from.into()));
        self
    }

    /// Placeholder name for a source column.
    pub fn target(&self, column: &str) -> Option<&str> {
        self.renames
            .iter()
            .find(|(source, _)| source == column)
            .map(|(_, target)| target.as_str())
    }

    fn is_target(&self, column: &str) -> bool {
        self.renames.iter().any(|(_, target)| target == column)
    }
}

impl Default for VariableMapping {
    /// The page-definition table's columns, mapped onto the template keywords.
    fn default() -> Self {
        let pairs = [
            ("Titre", "my_title"),
            ("sous_titre", "my_description"),
            ("auteurs", "my_authors"),
            ("date", "my_date"),
            ("image", "my_image_path"),
            ("tags", "my_categories"),
            ("Details_du_projet", "my_table_details"),
            ("Acteurs", "my_table_actors"),
            ("Resultats", "my_table_results"),
            ("Code_du_projet", "my_table_repo_path"),
            ("Titre_Tab", "my_table_title"),
        ];
        Self::new(pairs.map(|(s, t)| (s.to_string(), t.to_string()))).with_derived("Titre_Tab", "Titre")
    }
}
