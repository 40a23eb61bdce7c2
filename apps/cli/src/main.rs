//! hubpress CLI: newsletter drafts and templated pages for the hub.
//!
//! Turns a published newsletter into an unsent draft email addressed to the
//! contact directory, and regenerates project pages from a Grist table.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
