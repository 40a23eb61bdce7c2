//! Newsletter metadata rewriting.
//!
//! A newsletter source document carries a YAML metadata block between two
//! `---` delimiters. Before rendering it as an email, the block is rebuilt
//! from scratch: only the title and description survive, the description is
//! wrapped in a sentence linking back to the published newsletter, and the
//! language tag and self-contained HTML options are injected.

use serde::Serialize;
use serde_yaml::Value;
use tracing::{debug, instrument};

use hubpress_shared::{HubError, Result};

/// Marker separating the metadata block from the document body.
pub const DELIMITER: &str = "---";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A source document split on its first two delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDocument<'a> {
    /// Text before the first delimiter (usually empty, dropped on rewrite).
    pub leading: &'a str,
    /// Raw YAML between the two delimiters.
    pub metadata: &'a str,
    /// Everything after the second delimiter, kept verbatim.
    pub body: &'a str,
}

/// Options for rebuilding the metadata block.
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Language tag injected as `lang`.
    pub lang: String,
    /// Optional stylesheet injected as `format.html.css`.
    pub stylesheet: Option<String>,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            lang: "fr".into(),
            stylesheet: None,
        }
    }
}

/// Rebuilt metadata block. Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataBlock {
    pub title: String,
    pub description: String,
    pub lang: String,
    pub format: FormatOptions,
}

/// `format:` options of the rebuilt block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatOptions {
    pub html: HtmlOptions,
}

/// `format.html:` options: inline every asset, optionally style with an external sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlOptions {
    #[serde(rename = "self-contained")]
    pub self_contained: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

impl MetadataBlock {
    /// Serialize as YAML (trailing newline included, no line folding, UTF-8 kept literal).
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| HubError::format(format!("failed to serialize metadata: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Rewriter
// ---------------------------------------------------------------------------

/// Split a document on the first two occurrences of [`DELIMITER`].
///
/// Fewer than two delimiters is a format error.
pub fn split_document(text: &str) -> Result<SourceDocument<'_>> {
    let mut parts = text.splitn(3, DELIMITER);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(leading), Some(metadata), Some(body)) => Ok(SourceDocument {
            leading,
            metadata,
            body,
        }),
        _ => Err(HubError::format(format!(
            "expected a metadata block enclosed in two '{DELIMITER}' delimiters"
        ))),
    }
}

/// Rewrite a newsletter source so it renders as a self-contained email.
///
/// Output is `---\n<new metadata>---\n<original body>`.
#[instrument(skip(document_text, options), fields(len = document_text.len()))]
pub fn rewrite(
    document_text: &str,
    publication_link: &str,
    options: &RewriteOptions,
) -> Result<String> {
    let document = split_document(document_text)?;
    let metadata = clean_metadata(document.metadata, publication_link, options)?;
    let yaml = metadata.to_yaml()?;

    debug!(title = %metadata.title, "metadata rewritten");

    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{}", document.body))
}

/// Build the cleaned metadata block from the raw YAML header.
pub fn clean_metadata(
    yaml_header: &str,
    publication_link: &str,
    options: &RewriteOptions,
) -> Result<MetadataBlock> {
    let parsed: Value = if yaml_header.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(yaml_header)
            .map_err(|e| HubError::format(format!("invalid metadata block: {e}")))?
    };

    let mapping = match parsed {
        Value::Mapping(mapping) => mapping,
        Value::Null => serde_yaml::Mapping::new(),
        _ => {
            return Err(HubError::format("metadata block is not a key-value mapping"));
        }
    };

    let title = scalar_field(&mapping, "title")?;
    let description = scalar_field(&mapping, "description")?;

    Ok(MetadataBlock {
        title: title.trim().to_string(),
        description: format!(
            "*{} disponible sur le site du [réseau]({publication_link})*",
            description.trim()
        ),
        lang: options.lang.clone(),
        format: FormatOptions {
            html: HtmlOptions {
                self_contained: true,
                css: options.stylesheet.clone(),
            },
        },
    })
}

/// Read `key` as text; a missing key reads as empty.
fn scalar_field(mapping: &serde_yaml::Mapping, key: &str) -> Result<String> {
    match mapping.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(HubError::format(format!(
            "metadata key '{key}' must be a plain value"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const LINK: &str = "https://ssphub.netlify.app/infolettre/infolettre_19/";

    fn sample_document() -> String {
        [
            "---",
            "title: \"  Infolettre de rentrée \"",
            "description: |",
            "  Les nouvelles du réseau",
            "author: Someone",
            "date: 2025-09-01",
            "image: cover.png",
            "categories:",
            "  - news",
            "---",
            "",
            "# Bonjour",
            "",
            "Texte avec un séparateur --- dans le corps.",
            "",
        ]
        .join("\n")
    }

    fn keys(yaml: &str) -> Vec<String> {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        value
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn rewrites_minimal_block_exactly() {
        let doc = "---\ntitle: \"T\"\ndescription: \"D\"\n---\nBody\n";
        let out = rewrite(doc, "http://x/", &RewriteOptions::default()).unwrap();
        assert_eq!(
            out,
            "---\n\
             title: T\n\
             description: '*D disponible sur le site du [réseau](http://x/)*'\n\
             lang: fr\n\
             format:\n  html:\n    self-contained: true\n\
             ---\n\
             \nBody\n"
        );
    }

    #[test]
    fn output_keys_are_fixed_and_ordered() {
        let out = rewrite(&sample_document(), LINK, &RewriteOptions::default()).unwrap();
        let doc = split_document(&out).unwrap();
        assert_eq!(keys(doc.metadata), ["title", "description", "lang", "format"]);
    }

    #[test]
    fn description_links_to_publication() {
        let out = rewrite(&sample_document(), LINK, &RewriteOptions::default()).unwrap();
        let doc = split_document(&out).unwrap();
        let value: Value = serde_yaml::from_str(doc.metadata).unwrap();
        let description = value["description"].as_str().unwrap();
        assert_eq!(
            description,
            format!("*Les nouvelles du réseau disponible sur le site du [réseau]({LINK})*")
        );
        assert!(description.contains("disponible sur le site du [réseau]("));
        assert!(description.ends_with(")*"));
    }

    #[test]
    fn title_is_trimmed_and_unicode_kept_literal() {
        let out = rewrite(&sample_document(), LINK, &RewriteOptions::default()).unwrap();
        assert!(out.contains("title: Infolettre de rentrée\n"));
        assert!(!out.contains("\\u"));
        assert!(!out.contains("\\x"));
    }

    #[test]
    fn unrecognized_keys_are_dropped() {
        let out = rewrite(&sample_document(), LINK, &RewriteOptions::default()).unwrap();
        let doc = split_document(&out).unwrap();
        assert!(!doc.metadata.contains("author"));
        assert!(!doc.metadata.contains("categories"));
        assert!(!doc.metadata.contains("cover.png"));
    }

    #[test]
    fn body_is_kept_verbatim() {
        let source = sample_document();
        let out = rewrite(&source, LINK, &RewriteOptions::default()).unwrap();
        let original_body = split_document(&source).unwrap().body;
        assert!(out.ends_with(original_body));
        assert!(out.contains("Texte avec un séparateur --- dans le corps."));
    }

    #[test]
    fn stylesheet_is_injected_when_configured() {
        let options = RewriteOptions {
            lang: "fr".into(),
            stylesheet: Some("../email_style/style.css".into()),
        };
        let out = rewrite(&sample_document(), LINK, &options).unwrap();
        assert!(out.contains(
            "format:\n  html:\n    self-contained: true\n    css: ../email_style/style.css\n"
        ));
    }

    #[test]
    fn long_description_is_not_wrapped() {
        let long = "mot ".repeat(80);
        let doc = format!("---\ntitle: T\ndescription: {long}\n---\nBody");
        let out = rewrite(&doc, "http://x/", &RewriteOptions::default()).unwrap();
        let line = out
            .lines()
            .find(|l| l.starts_with("description:"))
            .unwrap();
        assert!(line.ends_with("(http://x/)*'"), "wrapped line: {line}");
    }

    #[test]
    fn missing_keys_read_as_empty() {
        let out = rewrite("---\nauthor: X\n---\nBody", "http://x/", &RewriteOptions::default())
            .unwrap();
        let doc = split_document(&out).unwrap();
        let value: Value = serde_yaml::from_str(doc.metadata).unwrap();
        assert_eq!(value["title"].as_str(), Some(""));
        assert_eq!(
            value["description"].as_str(),
            Some("* disponible sur le site du [réseau](http://x/)*")
        );
    }

    #[test]
    fn empty_metadata_block_is_accepted() {
        let out = rewrite("------\nBody", "http://x/", &RewriteOptions::default()).unwrap();
        assert!(out.starts_with("---\ntitle: ''\n"));
        assert!(out.ends_with("---\n\nBody"));
    }

    #[test]
    fn single_delimiter_is_format_error() {
        let err = rewrite("---\ntitle: T\nno closing", "http://x/", &RewriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, HubError::Format { .. }));
    }

    #[test]
    fn no_delimiter_is_format_error() {
        let err = rewrite("just a body", "http://x/", &RewriteOptions::default()).unwrap_err();
        assert!(matches!(err, HubError::Format { .. }));
    }

    #[test]
    fn non_mapping_metadata_is_format_error() {
        let err = rewrite("---\n- a\n- b\n---\nBody", "http://x/", &RewriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, HubError::Format { .. }));
    }

    #[test]
    fn nested_title_is_format_error() {
        let err = rewrite(
            "---\ntitle:\n  nested: true\n---\nBody",
            "http://x/",
            &RewriteOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn split_keeps_leading_text() {
        let doc = split_document("preamble\n---\na: 1\n---\nrest").unwrap();
        assert_eq!(doc.leading, "preamble\n");
        assert_eq!(doc.metadata, "\na: 1\n");
        assert_eq!(doc.body, "\nrest");
    }
}
