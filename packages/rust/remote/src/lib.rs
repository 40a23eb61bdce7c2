//! HTTP transport for hubpress.
//!
//! - [`GitHubClient`]: raw file fetch and directory listing on a Git hosting service
//! - [`GristClient`]: table records and attachment archive of a Grist document
//!
//! Both share [`HttpClient`], a `reqwest` client with a request timeout and a
//! bounded retry on transport failures and server errors.

mod github;
mod grist;

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use hubpress_shared::{HttpConfig, HubError, Result};

pub use github::{GitHubClient, file_name_from_url};
pub use grist::{DEFAULT_ARCHIVE_NAME, GristClient, content_disposition_filename};

/// User-Agent string sent with every request.
const USER_AGENT: &str = concat!("hubpress/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// GET-only HTTP client with timeout and linear-backoff retry.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retries: u32,
    backoff: Duration,
}

impl HttpClient {
    /// Build a client from the `[http]` config section.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HubError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            retries: config.retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    /// GET `url`, optionally with a bearer token, and require a success status.
    ///
    /// Connection failures and 5xx responses are retried; 4xx responses are not.
    pub async fn get(&self, url: &str, bearer: Option<&str>) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let mut request = self.client.get(url);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }

            let failure = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url, status = %response.status(), "fetched");
                    return Ok(response);
                }
                Ok(response) if response.status().is_server_error() => {
                    format!("{url}: HTTP {}", response.status())
                }
                Ok(response) => {
                    return Err(HubError::Transport(format!(
                        "{url}: HTTP {}",
                        response.status()
                    )));
                }
                Err(e) => format!("{url}: {e}"),
            };

            if attempt >= self.retries {
                return Err(HubError::Transport(failure));
            }
            attempt += 1;
            warn!(url, attempt, error = %failure, "request failed, retrying");
            tokio::time::sleep(self.backoff * attempt).await;
        }
    }

    /// GET `url` and return the body as text.
    pub async fn get_text(&self, url: &str, bearer: Option<&str>) -> Result<String> {
        self.get(url, bearer)
            .await?
            .text()
            .await
            .map_err(|e| HubError::Transport(format!("{url}: failed to read body: {e}")))
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, bearer: Option<&str>) -> Result<T> {
        let body = self.get_text(url, bearer).await?;
        serde_json::from_str(&body)
            .map_err(|e| HubError::validation(format!("{url}: unexpected response: {e}")))
    }
}
