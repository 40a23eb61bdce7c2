//! Unsent draft email packaging (`.eml`).
//!
//! The draft is a `multipart/mixed` message with a single base64-encoded
//! HTML part. `X-Unsent: 1` makes mail clients open it as an editable draft.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use tracing::info;

use hubpress_shared::{HubError, Result};

/// Soft limit for header and body line length.
const MAX_LINE: usize = 76;

/// Raw bytes per RFC 2047 encoded word, keeping each word under 75 characters.
const ENCODED_WORD_BYTES: usize = 45;

/// A draft email ready to be written as `.eml`.
#[derive(Debug, Clone)]
pub struct DraftEmail {
    pub subject: String,
    pub from: String,
    pub to: String,
    pub cc: Option<String>,
    pub bcc: String,
    pub html: String,
    pub date: DateTime<Utc>,
}

impl DraftEmail {
    /// Serialize with a fresh MIME boundary.
    pub fn to_eml(&self) -> String {
        let boundary = format!("==============={}==", uuid::Uuid::now_v7().simple());
        self.to_eml_with_boundary(&boundary)
    }

    fn to_eml_with_boundary(&self, boundary: &str) -> String {
        let mut headers = vec![
            format!("Content-Type: multipart/mixed; boundary=\"{boundary}\""),
            "MIME-Version: 1.0".to_string(),
            format!("Subject: {}", encode_header_value(&self.subject)),
            fold_header("From", &self.from),
            fold_header("To", &self.to),
        ];
        if let Some(cc) = self.cc.as_deref().filter(|cc| !cc.trim().is_empty()) {
            headers.push(fold_header("Cc", cc));
        }
        headers.push(fold_header("Bcc", &self.bcc));
        headers.push(format!("Date: {}", self.date.to_rfc2822()));
        headers.push("X-Unsent: 1".to_string());

        let body = STANDARD.encode(self.html.as_bytes());
        let body_lines: Vec<_> = body
            .as_bytes()
            .chunks(MAX_LINE)
            .map(String::from_utf8_lossy)
            .collect();

        let mut eml = headers.join("\r\n");
        eml.push_str("\r\n\r\n");
        eml.push_str(&format!("--{boundary}\r\n"));
        eml.push_str("Content-Type: text/html; charset=\"utf-8\"\r\n");
        eml.push_str("MIME-Version: 1.0\r\n");
        eml.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
        eml.push_str(&body_lines.join("\r\n"));
        eml.push_str(&format!("\r\n\r\n--{boundary}--\r\n"));
        eml
    }

    /// Write the draft to `path`, creating its parent directory.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| HubError::io(parent, e))?;
        }
        std::fs::write(path, self.to_eml()).map_err(|e| HubError::io(path, e))?;
        info!(path = %path.display(), "draft email written");
        Ok(())
    }
}

/// Text of the document's `<title>`, if any.
pub fn html_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Header value as-is when ASCII, else as RFC 2047 base64 encoded words.
pub fn encode_header_value(value: &str) -> String {
    let value = single_line(value);
    if value.is_ascii() {
        return value;
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in value.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_BYTES {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk));
    }
    words.join("\r\n ")
}

fn encoded_word(text: &str) -> String {
    format!("=?utf-8?b?{}?=", STANDARD.encode(text.as_bytes()))
}

/// `Name: value`, folded on spaces so lines stay short.
fn fold_header(name: &str, value: &str) -> String {
    let value = single_line(value);
    let mut out = format!("{name}:");
    let mut line_len = out.len();
    for word in value.split(' ').filter(|w| !w.is_empty()) {
        if line_len + 1 + word.len() > MAX_LINE && line_len > name.len() + 1 {
            out.push_str("\r\n");
            line_len = 0;
        }
        out.push(' ');
        out.push_str(word);
        line_len += 1 + word.len();
    }
    out
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> DraftEmail {
        DraftEmail {
            subject: "Infolettre 19".into(),
            from: "SELECT THE RIGHT EMAIL".into(),
            to: "DG75-SSPHUB-Contact <SSPHUB-contact@insee.fr>".into(),
            cc: None,
            bcc: "<a@x.fr>; <b@y.fr>".into(),
            html: "<html><head><title>Infolettre</title></head><body>Été</body></html>".into(),
            date: Utc.with_ymd_and_hms(2025, 9, 1, 8, 30, 0).unwrap(),
        }
    }

    /// Header block unfolded into `(name, value)` pairs.
    fn headers(eml: &str) -> Vec<(String, String)> {
        let head = eml.split("\r\n\r\n").next().unwrap().replace("\r\n ", " ");
        head.lines()
            .map(|line| {
                let (name, value) = line.split_once(": ").unwrap();
                (name.to_string(), value.to_string())
            })
            .collect()
    }

    fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn draft_headers() {
        let eml = draft().to_eml_with_boundary("BOUNDARY");
        let headers = headers(&eml);

        assert_eq!(header(&headers, "Subject"), Some("Infolettre 19"));
        assert_eq!(header(&headers, "From"), Some("SELECT THE RIGHT EMAIL"));
        assert_eq!(
            header(&headers, "To"),
            Some("DG75-SSPHUB-Contact <SSPHUB-contact@insee.fr>")
        );
        assert_eq!(header(&headers, "Bcc"), Some("<a@x.fr>; <b@y.fr>"));
        assert_eq!(header(&headers, "X-Unsent"), Some("1"));
        assert_eq!(header(&headers, "MIME-Version"), Some("1.0"));
        assert_eq!(header(&headers, "Date"), Some("Mon, 1 Sep 2025 08:30:00 +0000"));
        assert_eq!(header(&headers, "Cc"), None);
        assert_eq!(
            header(&headers, "Content-Type"),
            Some("multipart/mixed; boundary=\"BOUNDARY\"")
        );
    }

    #[test]
    fn cc_is_written_when_set() {
        let mut email = draft();
        email.cc = Some("<boss@x.fr>".into());
        let headers = headers(&email.to_eml_with_boundary("B"));
        assert_eq!(header(&headers, "Cc"), Some("<boss@x.fr>"));
    }

    #[test]
    fn html_part_round_trips() {
        let email = draft();
        let eml = email.to_eml_with_boundary("BOUNDARY");

        assert!(eml.contains("--BOUNDARY\r\nContent-Type: text/html; charset=\"utf-8\"\r\n"));
        assert!(eml.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(eml.ends_with("--BOUNDARY--\r\n"));

        let part = eml.split("Content-Transfer-Encoding: base64\r\n\r\n").nth(1).unwrap();
        let encoded: String = part
            .split("\r\n\r\n--BOUNDARY--")
            .next()
            .unwrap()
            .lines()
            .map(str::trim)
            .collect();
        assert!(part.lines().all(|l| l.len() <= MAX_LINE));
        let decoded = STANDARD.decode(encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), email.html);
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        let encoded = encode_header_value("Infolettre de rentrée");
        assert_eq!(
            encoded,
            format!("=?utf-8?b?{}?=", STANDARD.encode("Infolettre de rentrée"))
        );
        assert!(encoded.is_ascii());
    }

    #[test]
    fn long_non_ascii_subject_is_split_into_words() {
        let subject = "é".repeat(60);
        let encoded = encode_header_value(&subject);
        let words: Vec<_> = encoded.split("\r\n ").collect();
        assert!(words.len() > 1);
        assert!(words.iter().all(|w| w.len() <= 75));

        let decoded: String = words
            .iter()
            .map(|w| {
                let inner = w.trim_start_matches("=?utf-8?b?").trim_end_matches("?=");
                String::from_utf8(STANDARD.decode(inner).unwrap()).unwrap()
            })
            .collect();
        assert_eq!(decoded, subject);
    }

    #[test]
    fn header_values_cannot_inject_lines() {
        let mut email = draft();
        email.subject = "Hello\r\nBcc: attacker@evil.test".into();
        let eml = email.to_eml_with_boundary("B");
        let headers = headers(&eml);
        assert_eq!(
            headers.iter().filter(|(n, _)| n == "Bcc").count(),
            1
        );
    }

    #[test]
    fn long_recipient_lists_are_folded() {
        let mut email = draft();
        email.bcc = (0..30)
            .map(|i| format!("<person{i}@example.org>"))
            .collect::<Vec<_>>()
            .join("; ");
        let eml = email.to_eml_with_boundary("B");
        let head = eml.split("\r\n\r\n").next().unwrap();
        assert!(head.lines().all(|l| l.len() <= MAX_LINE + 2));
        assert_eq!(header(&headers(&eml), "Bcc"), Some(email.bcc.as_str()));
    }

    #[test]
    fn title_is_read_from_html() {
        assert_eq!(html_title(&draft().html).as_deref(), Some("Infolettre"));
        assert_eq!(html_title("<html><body>No title</body></html>"), None);
        assert_eq!(html_title("<title>  </title>"), None);
    }

    #[test]
    fn write_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("hubpress-eml-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("scratch/email.eml");
        draft().write(&path).unwrap();
        let eml = std::fs::read_to_string(&path).unwrap();
        assert!(eml.contains("X-Unsent: 1\r\n"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
