//! Image backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the site builder
//! needs from an image library: identify (read dimensions) and encode a WebP
//! derivative.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` below.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image backends.
///
/// `Sync` so a single backend can be shared by rayon workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode `source` and write it to `output` as WebP.
    fn encode_webp(&self, source: &Path, output: &Path) -> Result<(), BackendError>;
}
