//! End-to-end pipelines.
//!
//! - `email`: newsletter source → images → metadata rewrite → render → draft `.eml`
//! - `pages`: page table → filter → template merge → attachment archive → image placement

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use hubpress_assets::{AssetRequest, ResolveReport, extract_flat, image_urls, resolve};
use hubpress_frontmatter::{RewriteOptions, rewrite};
use hubpress_merge::{MergeOptions, MergeReport, PageRow, VariableMapping, merge, needs_update};
use hubpress_shared::{AppConfig, HubError, Result};

use crate::email::{DraftEmail, html_title};
use crate::render::Renderer;
use crate::sources::{AttachmentSource, NewsletterSource, TableSource};

/// Rewritten newsletter source, written in the scratch directory.
const TEMP_SOURCE_NAME: &str = "temp.qmd";

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called for each item processed inside a phase.
    fn item(&self, label: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item(&self, _label: &str, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Email pipeline
// ---------------------------------------------------------------------------

/// Inputs of [`generate_email`].
#[derive(Debug, Clone)]
pub struct EmailRequest {
    /// Newsletter number, substituted in the folder and URL patterns.
    pub number: String,
    /// Subject; defaults to the rendered document's title.
    pub subject: Option<String>,
    /// `Bcc` recipients, already formatted.
    pub recipients: String,
    pub cc: Option<String>,
    /// Delete the intermediate source, the rendered HTML and the images afterwards.
    pub drop_temp: bool,
}

/// Result of [`generate_email`].
#[derive(Debug)]
pub struct EmailResult {
    pub eml_path: PathBuf,
    pub subject: String,
    /// Images downloaded next to the intermediate source.
    pub images: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Build the draft email for one newsletter.
///
/// 1. Download the newsletter's images into the scratch directory
/// 2. Fetch the source document
/// 3. Rewrite its metadata with the published link
/// 4. Render it to HTML
/// 5. Package the HTML as an unsent draft
/// 6. Optionally delete the intermediates
#[instrument(skip_all, fields(number = %request.number))]
pub async fn generate_email(
    config: &AppConfig,
    source: &impl NewsletterSource,
    renderer: &impl Renderer,
    request: &EmailRequest,
    progress: &dyn ProgressReporter,
) -> Result<EmailResult> {
    let start = Instant::now();
    let newsletter = &config.newsletter;
    let scratch = PathBuf::from(&config.email.scratch_dir);
    let folder = newsletter.folder(&request.number);

    info!(%folder, branch = %source.location().branch, "starting email pipeline");

    // --- Phase 1: Images ---
    progress.phase("Downloading images");
    let listing = source.list_folder(&folder).await?;
    let urls = image_urls(&listing, source.location());
    if urls.is_empty() {
        info!("no images in the newsletter folder");
    }

    let mut images = Vec::with_capacity(urls.len());
    for (i, url) in urls.iter().enumerate() {
        progress.item(url, i + 1, urls.len());
        match source.download(url, &scratch).await {
            Ok(path) => images.push(path),
            Err(e) => warn!(%url, error = %e, "image download failed, skipping"),
        }
    }

    // --- Phase 2: Source document ---
    progress.phase("Fetching newsletter");
    let document_path = format!("{folder}/{}", newsletter.document_name);
    let document = source.fetch_text(&document_path).await?;

    // --- Phase 3: Metadata ---
    progress.phase("Rewriting metadata");
    let options = RewriteOptions {
        lang: newsletter.lang.clone(),
        stylesheet: newsletter.stylesheet.clone(),
    };
    let rewritten = rewrite(&document, &newsletter.published_url(&request.number), &options)?;

    std::fs::create_dir_all(&scratch).map_err(|e| HubError::io(&scratch, e))?;
    let temp_source = scratch.join(TEMP_SOURCE_NAME);
    std::fs::write(&temp_source, &rewritten).map_err(|e| HubError::io(&temp_source, e))?;

    // --- Phase 4: Render ---
    progress.phase("Rendering");
    let rendered = renderer.render(&temp_source)?;
    let html = std::fs::read_to_string(&rendered).map_err(|e| HubError::io(&rendered, e))?;

    // --- Phase 5: Draft ---
    progress.phase("Packaging email");
    let subject = request
        .subject
        .clone()
        .or_else(|| html_title(&html))
        .unwrap_or_else(|| format!("Infolettre {}", request.number));

    let draft = DraftEmail {
        subject: subject.clone(),
        from: config.email.from.clone(),
        to: config.email.sender.clone(),
        cc: request.cc.clone(),
        bcc: request.recipients.clone(),
        html,
        date: chrono::Utc::now(),
    };
    let eml_path = scratch.join(&config.email.eml_file_name);
    draft.write(&eml_path)?;

    // --- Phase 6: Cleanup ---
    if request.drop_temp {
        progress.phase("Cleaning up");
        remove_files([temp_source.as_path(), rendered.as_path()]);
        remove_files(images.iter().map(PathBuf::as_path));
    }

    let elapsed = start.elapsed();
    info!(
        path = %eml_path.display(),
        images = images.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "email pipeline complete"
    );

    Ok(EmailResult {
        eml_path,
        subject,
        images,
        elapsed,
    })
}

fn remove_files<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove temporary file");
        }
    }
}

// ---------------------------------------------------------------------------
// Pages pipeline
// ---------------------------------------------------------------------------

/// Inputs of [`generate_pages`].
#[derive(Debug, Clone)]
pub struct PagesRequest {
    pub template: PathBuf,
    pub output_root: PathBuf,
    /// Scratch area for the attachment archive, removed at the end.
    pub staging_dir: PathBuf,
}

impl PagesRequest {
    /// Paths from the `[pages]` config section.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            template: PathBuf::from(&config.pages.template),
            output_root: PathBuf::from(&config.pages.output_root),
            staging_dir: PathBuf::from(&config.pages.staging_dir),
        }
    }
}

/// Result of [`generate_pages`].
#[derive(Debug)]
pub struct PagesResult {
    pub rows_fetched: usize,
    pub rows_selected: usize,
    pub merge: MergeReport,
    pub assets: ResolveReport,
    pub elapsed: Duration,
}

/// Regenerate the pages of every row marked for update.
///
/// 1. Fetch the page table and rename its columns
/// 2. Keep rows flagged for update with a destination folder
/// 3. Merge each row into the template
/// 4. Download and extract the attachment archive
/// 5. Move each row's image next to its page
/// 6. Remove the staging area
#[instrument(skip_all, fields(table = %config.grist.pages_table))]
pub async fn generate_pages(
    config: &AppConfig,
    tables: &impl TableSource,
    attachments: &impl AttachmentSource,
    request: &PagesRequest,
    progress: &dyn ProgressReporter,
) -> Result<PagesResult> {
    let start = Instant::now();
    let pages = &config.pages;

    // --- Phase 1: Table ---
    progress.phase("Fetching page table");
    let records = tables.fetch_table(&config.grist.pages_table).await?;

    let mapping = VariableMapping::default();
    let known = [pages.destination_column.as_str(), pages.update_column.as_str()];
    let rows: Vec<PageRow> = records
        .iter()
        .map(|record| PageRow::from_record(record, &mapping, &known))
        .collect();

    // --- Phase 2: Selection ---
    let selected: Vec<PageRow> = rows
        .iter()
        .filter(|row| {
            let keep = needs_update(row, &pages.update_column)
                && row.non_blank(&pages.destination_column).is_some();
            if !keep {
                debug!(row = row.get("id").unwrap_or("?"), "row not selected");
            }
            keep
        })
        .cloned()
        .collect();
    info!(fetched = rows.len(), selected = selected.len(), "rows selected");

    // --- Phase 3: Merge ---
    progress.phase("Writing pages");
    let options = MergeOptions {
        destination_column: pages.destination_column.clone(),
        output_file_name: pages.output_file_name.clone(),
    };
    let merge_report = merge(&request.template, &selected, &request.output_root, &options)?;

    // --- Phase 4 & 5: Images ---
    let asset_requests: Vec<AssetRequest> = selected
        .iter()
        .filter_map(|row| {
            let folder = row.non_blank(&pages.destination_column)?;
            let image = row.non_blank(&pages.image_column)?;
            Some(AssetRequest::new(folder, image))
        })
        .collect();

    let assets = if asset_requests.is_empty() {
        info!("no selected row declares an image, skipping attachments");
        Ok(ResolveReport::default())
    } else {
        place_images(attachments, &asset_requests, request, progress).await
    };

    // --- Phase 6: Cleanup ---
    // Staging is removed whether or not the images were placed.
    remove_staging(&request.staging_dir);
    let assets = assets?;

    let elapsed = start.elapsed();
    info!(
        written = merge_report.written.len(),
        failed = merge_report.failures.len(),
        images = assets.moved.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "pages pipeline complete"
    );

    Ok(PagesResult {
        rows_fetched: rows.len(),
        rows_selected: selected.len(),
        merge: merge_report,
        assets,
        elapsed,
    })
}

/// Download the attachment archive, extract it and move each requested image.
async fn place_images(
    attachments: &impl AttachmentSource,
    requests: &[AssetRequest],
    request: &PagesRequest,
    progress: &dyn ProgressReporter,
) -> Result<ResolveReport> {
    progress.phase("Downloading attachments");
    let archive = attachments.download_archive(&request.staging_dir).await?;
    let extracted = extract_flat(&archive, &request.staging_dir.join("files"))?;

    progress.phase("Placing images");
    resolve(requests, &extracted, &request.output_root)
}

fn remove_staging(staging_dir: &Path) {
    if staging_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(staging_dir) {
            warn!(path = %staging_dir.display(), error = %e, "failed to remove staging area");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
