//! `{{name}}` placeholder substitution.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use hubpress_shared::{HubError, Result};

use crate::row::PageRow;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Brace-free placeholder names, as listed by [`placeholders`].
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]*)\}\}").expect("valid regex"));

/// An immutable template document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    text: String,
}

impl Template {
    /// Wrap template text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read a template from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HubError::io(path, e))?;
        Ok(Self::new(text))
    }

    /// Raw template text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Names of every placeholder in the template.
    pub fn placeholders(&self) -> BTreeSet<String> {
        placeholders(&self.text)
    }

    /// Produce a new document with `row`'s values substituted.
    pub fn render(&self, row: &PageRow) -> String {
        render_row(&self.text, row)
    }
}

/// Substitute every `{{column}}` of `template` with the row's value.
///
/// Single pass: a substituted value containing a placeholder token is left as is.
/// Placeholders without a matching column stay verbatim. Column names may
/// contain braces; the longest column matching at a position wins.
pub fn render_row(template: &str, row: &PageRow) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match placeholder_at(tail, row) {
            Some((token_len, value)) => {
                out.push_str(value);
                rest = &tail[token_len..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Length of the `{{column}}` token opening `tail` and the column's value.
fn placeholder_at<'r>(tail: &str, row: &'r PageRow) -> Option<(usize, &'r str)> {
    let inner = tail.strip_prefix(OPEN)?;
    row.entries()
        .filter(|(column, _)| {
            inner
                .strip_prefix(column)
                .is_some_and(|after| after.starts_with(CLOSE))
        })
        .max_by_key(|(column, _)| column.len())
        .map(|(column, value)| (OPEN.len() + column.len() + CLOSE.len(), value))
}

/// Collect the placeholder names found in `text`.
pub fn placeholders(text: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> PageRow {
        PageRow::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn substitutes_every_occurrence() {
        let out = render_row("{{a}} and {{a}} then {{b}}", &row(&[("a", "1"), ("b", "2")]));
        assert_eq!(out, "1 and 1 then 2");
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let out = render_row("Hi {{name}}, {{missing}}", &row(&[("name", "Alice")]));
        assert_eq!(out, "Hi Alice, {{missing}}");
    }

    #[test]
    fn substitution_is_not_recursive() {
        let out = render_row(
            "{{first}} / {{second}}",
            &row(&[("first", "{{second}}"), ("second", "two")]),
        );
        assert_eq!(out, "{{second}} / two");
    }

    #[test]
    fn values_are_not_escaped() {
        let out = render_row(
            "| {{my_table_actors}} |",
            &row(&[("my_table_actors", "- John <br> - Jackie & co")]),
        );
        assert_eq!(out, "| - John <br> - Jackie & co |");
    }

    #[test]
    fn multiline_values_are_inserted_as_is() {
        let out = render_row(
            "authors:\n{{my_authors}}\n",
            &row(&[("my_authors", "- John \n- Jackie")]),
        );
        assert_eq!(out, "authors:\n- John \n- Jackie\n");
    }

    #[test]
    fn triple_braces_keep_outer_brace() {
        let out = render_row("{{{name}}}", &row(&[("name", "x")]));
        assert_eq!(out, "{x}");
    }

    #[test]
    fn columns_with_braces_are_substituted() {
        let out = render_row(
            "{{a{b}}} and {{c}d}} and {{a}}",
            &row(&[("a{b}", "1"), ("c}d", "2"), ("a", "3")]),
        );
        assert_eq!(out, "1 and 2 and 3");
    }

    #[test]
    fn longest_matching_column_wins() {
        let out = render_row("{{x}}}}", &row(&[("x", "short"), ("x}}", "long")]));
        assert_eq!(out, "long");
    }

    #[test]
    fn unclosed_placeholder_is_kept() {
        let out = render_row("{{name and {{name}}", &row(&[("name", "Alice")]));
        assert_eq!(out, "{{name and Alice");
    }

    #[test]
    fn lists_placeholders() {
        let names = placeholders("{{my_title}} {{my_date}} {{my_title}} {not_one}");
        let names: Vec<_> = names.into_iter().collect();
        assert_eq!(names, ["my_date", "my_title"]);
    }

    #[test]
    fn template_render_leaves_template_untouched() {
        let template = Template::new("Hi {{name}}");
        let first = template.render(&row(&[("name", "Alice")]));
        let second = template.render(&row(&[("name", "Bob")]));
        assert_eq!(first, "Hi Alice");
        assert_eq!(second, "Hi Bob");
        assert_eq!(template.text(), "Hi {{name}}");
    }
}
