//! Application configuration for hubpress.
//!
//! User config lives at `~/.hubpress/hubpress.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file: it only names the environment
//! variables that carry them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};
use crate::types::RepoLocation;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "hubpress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".hubpress";

// ---------------------------------------------------------------------------
// Config structs (matching hubpress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where newsletters live and where they are published.
    #[serde(default)]
    pub newsletter: NewsletterConfig,

    /// Draft email packaging.
    #[serde(default)]
    pub email: EmailConfig,

    /// Grist tabular data source.
    #[serde(default)]
    pub grist: GristConfig,

    /// Templated page generation.
    #[serde(default)]
    pub pages: PagesConfig,

    /// HTTP transport settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// External document renderer.
    #[serde(default)]
    pub renderer: RendererConfig,
}

/// `[newsletter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterConfig {
    /// Owner of the repository holding the newsletters.
    #[serde(default = "default_repo_owner")]
    pub repo_owner: String,

    /// Repository name.
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    /// Default branch to read from.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Folder of one newsletter inside the repository; `{number}` is substituted.
    #[serde(default = "default_folder_pattern")]
    pub folder_pattern: String,

    /// Source document name inside the newsletter folder.
    #[serde(default = "default_document_name")]
    pub document_name: String,

    /// Public URL of a published newsletter; `{number}` is substituted.
    #[serde(default = "default_published_url_pattern")]
    pub published_url_pattern: String,

    /// Base URL serving raw repository files.
    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,

    /// Base URL of the repository contents API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Language tag injected in the rewritten metadata.
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Optional stylesheet referenced by the rendered email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
}

impl Default for NewsletterConfig {
    fn default() -> Self {
        Self {
            repo_owner: default_repo_owner(),
            repo_name: default_repo_name(),
            branch: default_branch(),
            folder_pattern: default_folder_pattern(),
            document_name: default_document_name(),
            published_url_pattern: default_published_url_pattern(),
            raw_base_url: default_raw_base_url(),
            api_base_url: default_api_base_url(),
            lang: default_lang(),
            stylesheet: Some(default_stylesheet()),
        }
    }
}

impl NewsletterConfig {
    /// Repository folder of newsletter `number` (e.g. `infolettre/infolettre_19`).
    pub fn folder(&self, number: &str) -> String {
        self.folder_pattern.replace("{number}", number)
    }

    /// Public URL of the published newsletter `number`.
    pub fn published_url(&self, number: &str) -> String {
        self.published_url_pattern.replace("{number}", number)
    }

    /// Repository location at `branch`, or the configured branch when `None`.
    pub fn repo_location(&self, branch: Option<&str>) -> RepoLocation {
        RepoLocation {
            raw_base: self.raw_base_url.clone(),
            api_base: self.api_base_url.clone(),
            owner: self.repo_owner.clone(),
            repo: self.repo_name.clone(),
            branch: branch.unwrap_or(&self.branch).to_string(),
        }
    }
}

fn default_repo_owner() -> String {
    "InseeFrLab".into()
}
fn default_repo_name() -> String {
    "ssphub".into()
}
fn default_branch() -> String {
    "main".into()
}
fn default_folder_pattern() -> String {
    "infolettre/infolettre_{number}".into()
}
fn default_document_name() -> String {
    "index.qmd".into()
}
fn default_published_url_pattern() -> String {
    "https://ssphub.netlify.app/infolettre/infolettre_{number}/".into()
}
fn default_raw_base_url() -> String {
    "https://raw.githubusercontent.com".into()
}
fn default_api_base_url() -> String {
    "https://api.github.com".into()
}
fn default_lang() -> String {
    "fr".into()
}
fn default_stylesheet() -> String {
    "../ssphub_directory/email_style/style.css".into()
}

/// `[email]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Address put in the `To` header; recipients go in `Bcc`.
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Value of the `From` header, left for the user to pick in their client.
    #[serde(default = "default_from")]
    pub from: String,

    /// Scratch directory holding downloads, intermediates and the draft.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// File name of the draft inside the scratch directory.
    #[serde(default = "default_eml_name")]
    pub eml_file_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            from: default_from(),
            scratch_dir: default_scratch_dir(),
            eml_file_name: default_eml_name(),
        }
    }
}

fn default_sender() -> String {
    "DG75-SSPHUB-Contact <SSPHUB-contact@insee.fr>".into()
}
fn default_from() -> String {
    "SELECT THE RIGHT EMAIL".into()
}
fn default_scratch_dir() -> String {
    ".temp".into()
}
fn default_eml_name() -> String {
    "email.eml".into()
}

/// `[grist]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GristConfig {
    /// Grist server root URL.
    #[serde(default = "default_grist_server")]
    pub server: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Name of the env var holding the directory document id.
    #[serde(default = "default_directory_doc_env")]
    pub directory_doc_env: String,

    /// Name of the env var holding the page-definition document id.
    #[serde(default = "default_pages_doc_env")]
    pub pages_doc_env: String,

    /// Contact table inside the directory document.
    #[serde(default = "default_contact_table")]
    pub contact_table: String,

    /// Page-definition table inside the pages document.
    #[serde(default = "default_pages_table")]
    pub pages_table: String,
}

impl Default for GristConfig {
    fn default() -> Self {
        Self {
            server: default_grist_server(),
            api_key_env: default_api_key_env(),
            directory_doc_env: default_directory_doc_env(),
            pages_doc_env: default_pages_doc_env(),
            contact_table: default_contact_table(),
            pages_table: default_pages_table(),
        }
    }
}

fn default_grist_server() -> String {
    "https://grist.numerique.gouv.fr/".into()
}
fn default_api_key_env() -> String {
    "MY_GRIST_API_KEY".into()
}
fn default_directory_doc_env() -> String {
    "SSPHUB_DIRECTORY_ID".into()
}
fn default_pages_doc_env() -> String {
    "SSPHUB_WEBSITE_MERGE_ID".into()
}
fn default_contact_table() -> String {
    "Contact".into()
}
fn default_pages_table() -> String {
    "Intranet_details".into()
}

/// `[pages]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    /// Template document with `{{name}}` placeholders.
    #[serde(default = "default_template")]
    pub template: String,

    /// Root of the generated page tree.
    #[serde(default = "default_output_root")]
    pub output_root: String,

    /// File written in each destination folder.
    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,

    /// Column holding the destination folder of a row.
    #[serde(default = "default_destination_column")]
    pub destination_column: String,

    /// Boolean column marking rows whose page must be regenerated.
    #[serde(default = "default_update_column")]
    pub update_column: String,

    /// Column (after renaming) holding the row's image file name.
    #[serde(default = "default_image_column")]
    pub image_column: String,

    /// Staging directory for the attachment archive.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            output_root: default_output_root(),
            output_file_name: default_output_file_name(),
            destination_column: default_destination_column(),
            update_column: default_update_column(),
            image_column: default_image_column(),
            staging_dir: default_staging_dir(),
        }
    }
}

fn default_template() -> String {
    "ssphub_directory/template.qmd".into()
}
fn default_output_root() -> String {
    "ssphub_directory".into()
}
fn default_output_file_name() -> String {
    "index.qmd".into()
}
fn default_destination_column() -> String {
    "nom_dossier".into()
}
fn default_update_column() -> String {
    "A_mettre_a_jour".into()
}
fn default_image_column() -> String {
    "my_image_path".into()
}
fn default_staging_dir() -> String {
    ".temp/attachments".into()
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after a failed request (0 = fail on first error).
    #[serde(default)]
    pub retries: u32,

    /// Delay before the first retry, multiplied by the attempt number.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_retry_backoff_ms() -> u64 {
    500
}

/// `[renderer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Renderer executable.
    #[serde(default = "default_renderer_command")]
    pub command: String,

    /// Target format passed to `--to`.
    #[serde(default = "default_renderer_format")]
    pub format: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: default_renderer_command(),
            format: default_renderer_format(),
        }
    }
}

fn default_renderer_command() -> String {
    "quarto".into()
}
fn default_renderer_format() -> String {
    "html".into()
}

// ---------------------------------------------------------------------------
// Credentials (resolved from the environment once, then passed explicitly)
// ---------------------------------------------------------------------------

/// API key and document id for one Grist document.
#[derive(Clone)]
pub struct GristCredentials {
    /// Grist server root URL.
    pub server: String,
    /// Document identifier.
    pub doc_id: String,
    /// Bearer token.
    pub api_key: String,
}

impl std::fmt::Debug for GristCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GristCredentials")
            .field("server", &self.server)
            .field("doc_id", &self.doc_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GristCredentials {
    /// Credentials for the contact directory document, read from the process environment.
    pub fn directory(config: &GristConfig) -> Result<Self> {
        Self::resolve_with(config, &config.directory_doc_env, |name| {
            std::env::var(name).ok()
        })
    }

    /// Credentials for the page-definition document, read from the process environment.
    pub fn pages(config: &GristConfig) -> Result<Self> {
        Self::resolve_with(config, &config.pages_doc_env, |name| {
            std::env::var(name).ok()
        })
    }

    /// Resolve credentials through an arbitrary variable lookup.
    pub fn resolve_with(
        config: &GristConfig,
        doc_env: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_key = required_var(&lookup, &config.api_key_env)?;
        let doc_id = required_var(&lookup, doc_env)?;
        Ok(Self {
            server: config.server.clone(),
            doc_id,
            api_key,
        })
    }
}

fn required_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    match lookup(name) {
        Some(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(HubError::config(format!(
            "required credential not found. Set the {name} environment variable."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.hubpress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HubError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.hubpress/hubpress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HubError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HubError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HubError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| HubError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HubError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("MY_GRIST_API_KEY"));
        assert!(toml_str.contains("nom_dossier"));
        assert!(toml_str.contains("timeout_secs = 30"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.grist.contact_table, "Contact");
        assert_eq!(parsed.pages.output_file_name, "index.qmd");
        assert_eq!(parsed.newsletter.lang, "fr");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[newsletter]
branch = "newsletter_v3"

[http]
timeout_secs = 5
retries = 2
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.newsletter.branch, "newsletter_v3");
        assert_eq!(config.newsletter.repo_name, "ssphub");
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.retries, 2);
        assert_eq!(config.renderer.command, "quarto");
    }

    #[test]
    fn newsletter_urls() {
        let config = NewsletterConfig::default();
        assert_eq!(config.folder("19"), "infolettre/infolettre_19");
        assert_eq!(
            config.published_url("19"),
            "https://ssphub.netlify.app/infolettre/infolettre_19/"
        );
    }

    #[test]
    fn credentials_resolve_from_lookup() {
        let config = GristConfig::default();
        let vars: HashMap<&str, &str> = [
            ("MY_GRIST_API_KEY", "secret"),
            ("SSPHUB_DIRECTORY_ID", "doc123"),
        ]
        .into_iter()
        .collect();

        let creds = GristCredentials::resolve_with(&config, "SSPHUB_DIRECTORY_ID", |name| {
            vars.get(name).map(|v| v.to_string())
        })
        .expect("credentials");
        assert_eq!(creds.doc_id, "doc123");
        assert_eq!(creds.api_key, "secret");
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn missing_credential_is_config_error() {
        let config = GristConfig::default();
        let result = GristCredentials::resolve_with(&config, "SSPHUB_WEBSITE_MERGE_ID", |name| {
            (name == "MY_GRIST_API_KEY").then(|| "secret".to_string())
        });
        let err = result.unwrap_err();
        assert!(matches!(err, HubError::Config { .. }));
        assert!(err.to_string().contains("SSPHUB_WEBSITE_MERGE_ID"));
    }

    #[test]
    fn blank_credential_is_rejected() {
        let config = GristConfig::default();
        let result =
            GristCredentials::resolve_with(&config, "SSPHUB_DIRECTORY_ID", |_| Some("  ".into()));
        assert!(result.is_err());
    }
}
