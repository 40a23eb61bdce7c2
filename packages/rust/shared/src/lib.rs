//! Shared types, error model, and configuration for hubpress.
//!
//! This crate is the foundation depended on by all other hubpress crates.
//! It provides:
//! - [`HubError`]: the unified error type
//! - Domain types ([`RemoteEntry`], [`RepoLocation`], [`TableRecord`], [`cell_to_string`])
//! - Configuration ([`AppConfig`], [`GristCredentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EmailConfig, GristConfig, GristCredentials, HttpConfig, NewsletterConfig,
    PagesConfig, RendererConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{HubError, Result};
pub use types::{Fields, RemoteEntry, RepoLocation, TableRecord, cell_to_string};
