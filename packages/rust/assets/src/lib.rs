//! Image assets for newsletters and generated pages.
//!
//! - [`listing`]: pick image files out of a remote directory listing
//! - [`archive`]: flat extraction of the attachment archive, hash prefix stripping
//! - [`resolve`]: join rows to extracted files and move each image next to its page

pub mod archive;
pub mod listing;
pub mod resolve;

pub use archive::{ExtractedFile, HASH_PREFIX_LEN, extract_flat, strip_prefix};
pub use listing::{IMAGE_EXTENSIONS, image_entries, image_urls, is_image};
pub use resolve::{AssetRequest, ResolveReport, resolve};
