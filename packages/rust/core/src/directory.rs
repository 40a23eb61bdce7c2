//! Contact directory: newsletter recipients and auto-reply cleanup.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{info, instrument, warn};

use hubpress_shared::{Fields, HubError, Result};

use crate::sources::TableSource;

/// Column holding the contact's address.
pub const EMAIL_COLUMN: &str = "email";
/// Boolean column set when the contact asked to be removed.
pub const OPT_OUT_COLUMN: &str = "Supprimez_mon_compte";
/// Column holding the contact's name.
pub const NAME_COLUMN: &str = "nom";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
});

/// One entry of the contact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRecord {
    pub email: String,
    pub opted_out: bool,
    pub name: Option<String>,
    /// Part of the address after the first `@`.
    pub domain: String,
}

impl ContactRecord {
    pub fn new(email: impl Into<String>, opted_out: bool, name: Option<&str>) -> Self {
        let email = email.into().trim().to_string();
        let domain = email
            .split_once('@')
            .map(|(_, domain)| domain.to_string())
            .unwrap_or_default();
        Self {
            email,
            opted_out,
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            domain,
        }
    }

    /// Read a contact from a table row. `None` when the row has no address.
    ///
    /// A missing opt-out flag means the contact did not opt out.
    pub fn from_fields(fields: &Fields) -> Option<Self> {
        let email = fields
            .get(EMAIL_COLUMN)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())?;
        let opted_out = fields.get(OPT_OUT_COLUMN).is_some_and(is_truthy);
        let name = fields.get(NAME_COLUMN).and_then(Value::as_str);
        Some(Self::new(email, opted_out, name))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "oui"
        ),
        _ => false,
    }
}

/// Fetch the contact table and keep every row carrying an address.
#[instrument(skip(source))]
pub async fn load_contacts(source: &impl TableSource, table: &str) -> Result<Vec<ContactRecord>> {
    let records = source.fetch_table(table).await?;
    let mut contacts = Vec::with_capacity(records.len());
    for record in &records {
        match ContactRecord::from_fields(&record.fields) {
            Some(contact) => contacts.push(contact),
            None => warn!(row = record.id, "contact without e-mail address, skipping"),
        }
    }
    info!(contacts = contacts.len(), rows = records.len(), "contacts loaded");
    Ok(contacts)
}

/// Recipient list for the draft email: `<a@x>; <b@y>`.
///
/// Opted-out contacts are dropped. Addresses are ordered by domain then name
/// (contacts without a name last), ties broken by address, and de-duplicated
/// case-insensitively.
pub fn recipients(contacts: &[ContactRecord]) -> String {
    let mut kept: Vec<&ContactRecord> = contacts.iter().filter(|c| !c.opted_out).collect();
    kept.sort_by_cached_key(|c| {
        (
            c.domain.to_lowercase(),
            c.name.is_none(),
            c.name.clone(),
            c.email.to_lowercase(),
            c.email.clone(),
        )
    });

    let mut seen = HashSet::new();
    kept.into_iter()
        .filter(|c| seen.insert(c.email.to_lowercase()))
        .map(|c| format!("<{}>", c.email))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Every distinct e-mail address found in `text`, sorted.
pub fn extract_emails(text: &str) -> Vec<String> {
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Write one address per line to `path`, creating its parent directory.
pub fn export_emails_csv(emails: &[String], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HubError::io(parent, e))?;
    }
    let mut content = String::new();
    for email in emails {
        content.push_str(email);
        content.push('\n');
    }
    std::fs::write(path, content).map_err(|e| HubError::io(path, e))?;
    info!(path = %path.display(), count = emails.len(), "addresses exported");
    Ok(())
}
