//! Pipeline orchestration and domain logic for hubpress.
//!
//! This crate ties together the remote sources, metadata rewriting, template
//! merging and asset placement into the two end-to-end workflows
//! (`generate_email`, `generate_pages`), and holds the contact directory
//! filter used to address the draft email.

pub mod directory;
pub mod email;
pub mod pipeline;
pub mod render;
pub mod sources;
