//! Grist document access: table records and the attachment archive.

use std::path::{Path, PathBuf};

use reqwest::header::CONTENT_DISPOSITION;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use hubpress_shared::{GristCredentials, HttpConfig, HubError, Result, TableRecord};

use crate::HttpClient;

/// File name used when the archive response names no file.
pub const DEFAULT_ARCHIVE_NAME: &str = "attachments.zip";

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<TableRecord>,
}

/// Client bound to one Grist document.
#[derive(Debug, Clone)]
pub struct GristClient {
    http: HttpClient,
    credentials: GristCredentials,
}

impl GristClient {
    pub fn new(credentials: GristCredentials, config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
            credentials,
        })
    }

    fn doc_url(&self, tail: &str) -> String {
        format!(
            "{}/api/docs/{}/{tail}",
            self.credentials.server.trim_end_matches('/'),
            self.credentials.doc_id
        )
    }

    /// Fetch every record of `table`.
    #[instrument(skip(self), fields(doc = %self.credentials.doc_id))]
    pub async fn fetch_table(&self, table: &str) -> Result<Vec<TableRecord>> {
        let url = self.doc_url(&format!("tables/{table}/records"));
        let response: RecordsResponse = self
            .http
            .get_json(&url, Some(&self.credentials.api_key))
            .await?;
        info!(records = response.records.len(), "table fetched");
        Ok(response.records)
    }

    /// Download the document's attachment archive into `output_dir`.
    ///
    /// The file is named after the response's `Content-Disposition` filename
    /// when present, else [`DEFAULT_ARCHIVE_NAME`].
    #[instrument(skip(self, output_dir), fields(doc = %self.credentials.doc_id))]
    pub async fn download_attachments(&self, output_dir: &Path) -> Result<PathBuf> {
        let url = self.doc_url("attachments/archive");
        let response = self.http.get(&url, Some(&self.credentials.api_key)).await?;

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(content_disposition_filename)
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());
        debug!(%file_name, "archive file name");

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HubError::Transport(format!("{url}: failed to read body: {e}")))?;

        std::fs::create_dir_all(output_dir).map_err(|e| HubError::io(output_dir, e))?;
        let path = output_dir.join(file_name);
        std::fs::write(&path, &bytes).map_err(|e| HubError::io(&path, e))?;

        info!(path = %path.display(), bytes = bytes.len(), "attachment archive downloaded");
        Ok(path)
    }
}

/// The `filename` parameter of a `Content-Disposition` header, reduced to a
/// bare file name.
pub fn content_disposition_filename(header: &str) -> Option<String> {
    let raw = header.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| value.trim().trim_matches('"'))
    })?;

    let name = raw.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GristClient {
        let credentials = GristCredentials {
            server: format!("{}/", server.uri()),
            doc_id: "doc123".into(),
            api_key: "key".into(),
        };
        GristClient::new(credentials, &HttpConfig::default()).unwrap()
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("hubpress-grist-test-{}", uuid::Uuid::now_v7()))
    }

    #[tokio::test]
    async fn fetches_records_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/docs/doc123/tables/Contact/records"))
            .and(header("authorization", "Bearer key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "records": [
                    { "id": 1, "fields": { "email": "a@x.fr", "Supprimez_mon_compte": false } },
                    { "id": 2, "fields": { "email": "b@y.fr", "Supprimez_mon_compte": true } }
                ]
            })))
            .mount(&server)
            .await;

        let records = client(&server).fetch_table("Contact").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[0].fields["email"], "a@x.fr");
    }

    #[tokio::test]
    async fn unexpected_payload_is_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "rows": [] })))
            .mount(&server)
            .await;

        let err = client(&server).fetch_table("Contact").await.unwrap_err();
        assert!(matches!(err, HubError::Validation { .. }));
    }

    #[tokio::test]
    async fn archive_uses_disposition_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/docs/doc123/attachments/archive"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\"Intranet.zip\"")
                    .set_body_bytes(b"PK".to_vec()),
            )
            .mount(&server)
            .await;

        let dir = temp_dir();
        let saved = client(&server).download_attachments(&dir).await.unwrap();
        assert_eq!(saved, dir.join("Intranet.zip"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"PK");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn archive_falls_back_to_default_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/docs/doc123/attachments/archive"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK".to_vec()))
            .mount(&server)
            .await;

        let dir = temp_dir();
        let saved = client(&server).download_attachments(&dir).await.unwrap();
        assert_eq!(saved, dir.join(DEFAULT_ARCHIVE_NAME));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn disposition_parsing() {
        assert_eq!(
            content_disposition_filename("attachment; filename=\"a.zip\"").as_deref(),
            Some("a.zip")
        );
        assert_eq!(
            content_disposition_filename("attachment; FILENAME=b.zip").as_deref(),
            Some("b.zip")
        );
        assert_eq!(
            content_disposition_filename("attachment; filename=\"../../etc/c.zip\"").as_deref(),
            Some("c.zip")
        );
        assert_eq!(
            content_disposition_filename("attachment; filename*=UTF-8''d.zip"),
            None
        );
        assert_eq!(content_disposition_filename("attachment; filename=\"..\""), None);
        assert_eq!(content_disposition_filename("inline"), None);
    }
}
