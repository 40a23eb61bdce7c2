//! Newsletter repository access on a Git hosting service.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use url::Url;

use hubpress_shared::{HttpConfig, HubError, RemoteEntry, RepoLocation, Result};

use crate::HttpClient;

/// Read-only client for one branch of one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: HttpClient,
    location: RepoLocation,
}

impl GitHubClient {
    pub fn new(location: RepoLocation, config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
            location,
        })
    }

    pub fn location(&self) -> &RepoLocation {
        &self.location
    }

    /// List the entries of the directory at `path`.
    #[instrument(skip(self), fields(branch = %self.location.branch))]
    pub async fn list_directory(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let url = self.location.contents_url(path);
        let entries: Vec<RemoteEntry> = self.http.get_json(&url, None).await?;
        info!(count = entries.len(), "directory listed");
        Ok(entries)
    }

    /// Fetch the raw text of the file at `path`.
    #[instrument(skip(self), fields(branch = %self.location.branch))]
    pub async fn fetch_text(&self, path: &str) -> Result<String> {
        let url = self.location.raw_url(path);
        self.http.get_text(&url, None).await
    }

    /// Download `url` into `output_dir`, keeping the URL's file name.
    #[instrument(skip(self, output_dir))]
    pub async fn download_file(&self, url: &str, output_dir: &Path) -> Result<PathBuf> {
        let file_name = file_name_from_url(url)?;
        let bytes = self
            .http
            .get(url, None)
            .await?
            .bytes()
            .await
            .map_err(|e| HubError::Transport(format!("{url}: failed to read body: {e}")))?;

        std::fs::create_dir_all(output_dir).map_err(|e| HubError::io(output_dir, e))?;
        let path = output_dir.join(file_name);
        std::fs::write(&path, &bytes).map_err(|e| HubError::io(&path, e))?;

        info!(path = %path.display(), bytes = bytes.len(), "file downloaded");
        Ok(path)
    }
}

/// Last path segment of `url`.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| HubError::validation(format!("{url}: {e}")))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
        .ok_or_else(|| HubError::validation(format!("{url}: no file name in URL")))
}
