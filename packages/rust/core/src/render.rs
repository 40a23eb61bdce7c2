//! External document renderer.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, instrument};

use hubpress_shared::{HubError, RendererConfig, Result};

/// Turns a source document into a sibling output file.
pub trait Renderer {
    /// Render `source`, returning the produced file.
    fn render(&self, source: &Path) -> Result<PathBuf>;
}

/// Renders through the Quarto CLI: `<command> render <file> --to <format>`.
#[derive(Debug, Clone)]
pub struct QuartoRenderer {
    command: String,
    format: String,
}

impl QuartoRenderer {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            command: config.command.clone(),
            format: config.format.clone(),
        }
    }

    /// File produced next to `source`.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        source.with_extension(&self.format)
    }
}

impl Renderer for QuartoRenderer {
    #[instrument(skip(self), fields(command = %self.command))]
    fn render(&self, source: &Path) -> Result<PathBuf> {
        info!(source = %source.display(), "rendering document");

        let output = Command::new(&self.command)
            .arg("render")
            .arg(source)
            .arg("--to")
            .arg(&self.format)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                HubError::Render(format!(
                    "failed to run `{}`: {e}. Is it installed?",
                    self.command
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HubError::Render(format!(
                "`{} render {}` exited with {}: {}",
                self.command,
                source.display(),
                output.status,
                stderr.trim()
            )));
        }

        let produced = self.output_path(source);
        if !produced.is_file() {
            return Err(HubError::Render(format!(
                "renderer reported success but {} is missing",
                produced.display()
            )));
        }

        debug!(output = %produced.display(), "document rendered");
        Ok(produced)
    }
}
