//! Filesystem primitives for datum
//!
//! Everything the engine and the handlers need to touch the disk safely:
//! atomic replace of whole files, streaming SHA-256 checksums in the
//! canonical `sha256:<hex>` form, and format-by-extension loading of
//! structured (YAML/JSON) files.

pub mod checksum;
pub mod error;
pub mod io;
pub mod structured;

pub use checksum::{compute_content_checksum, compute_file_checksum};
pub use error::{Error, Result};
pub use structured::Format;
