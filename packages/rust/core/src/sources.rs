//! Remote collaborators of the pipelines.
//!
//! Pipelines are generic over these traits so tests can swap the network for
//! in-memory fakes. Production implementations wrap the `hubpress-remote`
//! clients.

use std::future::Future;
use std::path::{Path, PathBuf};

use hubpress_remote::{GitHubClient, GristClient};
use hubpress_shared::{RemoteEntry, RepoLocation, Result, TableRecord};

/// Repository holding the newsletter sources.
pub trait NewsletterSource {
    /// Repository coordinates, used to build raw file URLs.
    fn location(&self) -> &RepoLocation;

    /// Entries of the directory at `path`.
    fn list_folder(&self, path: &str) -> impl Future<Output = Result<Vec<RemoteEntry>>>;

    /// Text of the file at `path`.
    fn fetch_text(&self, path: &str) -> impl Future<Output = Result<String>>;

    /// Download `url` into `dir`, returning the saved file.
    fn download(&self, url: &str, dir: &Path) -> impl Future<Output = Result<PathBuf>>;
}

/// Tabular data service.
pub trait TableSource {
    fn fetch_table(&self, table: &str) -> impl Future<Output = Result<Vec<TableRecord>>>;
}

/// Provider of the page images archive.
pub trait AttachmentSource {
    /// Download the archive into `dir`, returning the saved file.
    fn download_archive(&self, dir: &Path) -> impl Future<Output = Result<PathBuf>>;
}

impl NewsletterSource for GitHubClient {
    fn location(&self) -> &RepoLocation {
        GitHubClient::location(self)
    }

    async fn list_folder(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        self.list_directory(path).await
    }

    async fn fetch_text(&self, path: &str) -> Result<String> {
        GitHubClient::fetch_text(self, path).await
    }

    async fn download(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        self.download_file(url, dir).await
    }
}

impl TableSource for GristClient {
    async fn fetch_table(&self, table: &str) -> Result<Vec<TableRecord>> {
        GristClient::fetch_table(self, table).await
    }
}

impl AttachmentSource for GristClient {
    async fn download_archive(&self, dir: &Path) -> Result<PathBuf> {
        self.download_attachments(dir).await
    }
}
