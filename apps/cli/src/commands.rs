//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use hubpress_core::directory::{export_emails_csv, extract_emails, load_contacts, recipients};
use hubpress_core::pipeline::{
    EmailRequest, PagesRequest, ProgressReporter, generate_email, generate_pages,
};
use hubpress_core::render::QuartoRenderer;
use hubpress_remote::{GitHubClient, GristClient};
use hubpress_shared::{AppConfig, GristCredentials, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// hubpress: newsletter drafts and templated pages for the hub.
#[derive(Parser)]
#[command(
    name = "hubpress",
    version,
    about = "Turn newsletters into draft emails and Grist rows into site pages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.hubpress/hubpress.toml.
    #[arg(long, global = true, env = "HUBPRESS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the unsent draft email for a newsletter.
    Email {
        /// Newsletter number (e.g. 19).
        number: String,

        /// Branch holding the newsletter (defaults to the configured branch).
        #[arg(short, long)]
        branch: Option<String>,

        /// Email subject (defaults to the newsletter title).
        #[arg(short, long)]
        subject: Option<String>,

        /// Bcc recipients; fetched from the contact directory when omitted.
        #[arg(long)]
        to: Option<String>,

        /// Cc recipients.
        #[arg(long)]
        cc: Option<String>,

        /// Keep the intermediate source, rendered HTML and images.
        #[arg(long)]
        keep_temp: bool,
    },

    /// Regenerate the pages of rows marked for update.
    Pages {
        /// Template document (defaults to pages.template).
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Root of the generated page tree (defaults to pages.output_root).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the newsletter recipient list from the contact directory.
    Recipients,

    /// Extract e-mail addresses from a dump of automatic replies.
    Replies {
        /// Text file containing the replies.
        file: PathBuf,

        /// CSV file to write, one address per line.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "hubpress=info",
        1 => "hubpress=debug",
        _ => "hubpress=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Email {
            number,
            branch,
            subject,
            to,
            cc,
            keep_temp,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            let request = EmailRequest {
                number,
                subject,
                recipients: String::new(),
                cc,
                drop_temp: !keep_temp,
            };
            cmd_email(&config, request, branch.as_deref(), to).await
        }
        Command::Pages { template, out } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_pages(&config, template, out).await
        }
        Command::Recipients => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_recipients(&config).await
        }
        Command::Replies { file, out } => cmd_replies(&file, out.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_email(
    config: &AppConfig,
    mut request: EmailRequest,
    branch: Option<&str>,
    to: Option<String>,
) -> Result<()> {
    // Resolve every credential before the first request goes out.
    let directory = match to {
        Some(_) => None,
        None => Some(GristCredentials::directory(&config.grist)?),
    };

    request.recipients = match (to, directory) {
        (Some(to), _) => to,
        (None, Some(credentials)) => {
            let grist = GristClient::new(credentials, &config.http)?;
            let contacts = load_contacts(&grist, &config.grist.contact_table).await?;
            recipients(&contacts)
        }
        (None, None) => return Err(eyre!("no recipients available")),
    };
    if request.recipients.is_empty() {
        return Err(eyre!("the recipient list is empty"));
    }

    let location = config.newsletter.repo_location(branch);
    info!(number = %request.number, branch = %location.branch, "building draft email");

    let source = GitHubClient::new(location, &config.http)?;
    let renderer = QuartoRenderer::new(&config.renderer);
    let reporter = CliProgress::new();

    let result = generate_email(config, &source, &renderer, &request, &reporter).await;
    reporter.finish();
    let result = result?;

    println!();
    println!("  Draft email created!");
    println!("  Subject: {}", result.subject);
    println!("  Images:  {}", result.images.len());
    println!("  Path:    {}", result.eml_path.display());
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_pages(
    config: &AppConfig,
    template: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    let credentials = GristCredentials::pages(&config.grist)?;
    let grist = GristClient::new(credentials, &config.http)?;

    let mut request = PagesRequest::from_config(config);
    if let Some(template) = template {
        request.template = template;
    }
    if let Some(out) = out {
        request.output_root = out;
    }

    info!(
        template = %request.template.display(),
        output_root = %request.output_root.display(),
        "generating pages"
    );

    let reporter = CliProgress::new();
    let result = generate_pages(config, &grist, &grist, &request, &reporter).await;
    reporter.finish();
    let result = result?;

    println!();
    println!("  Pages generated!");
    println!("  Rows:     {} fetched, {} selected", result.rows_fetched, result.rows_selected);
    println!("  Written:  {}", result.merge.written.len());
    for page in &result.merge.written {
        println!("            {}", page.path.display());
    }
    if !result.merge.failures.is_empty() {
        println!("  Skipped:  {}", result.merge.failures.len());
        for failure in &result.merge.failures {
            println!("            row {}: {}", failure.index, failure.reason);
        }
    }
    println!("  Images:   {} placed, {} missing", result.assets.moved.len(), result.assets.missing.len());
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_recipients(config: &AppConfig) -> Result<()> {
    let credentials = GristCredentials::directory(&config.grist)?;
    let grist = GristClient::new(credentials, &config.http)?;
    let contacts = load_contacts(&grist, &config.grist.contact_table).await?;
    println!("{}", recipients(&contacts));
    Ok(())
}

fn cmd_replies(file: &Path, out: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .wrap_err_with(|| format!("failed to read {}", file.display()))?;
    let emails = extract_emails(&text);
    info!(count = emails.len(), "addresses found in replies");

    match out {
        Some(path) => {
            export_emails_csv(&emails, path)?;
            println!("{} addresses written to {}", emails.len(), path.display());
        }
        None => {
            for email in &emails {
                println!("{email}");
            }
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn item(&self, label: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("[{current}/{total}] {label}"));
    }
}
