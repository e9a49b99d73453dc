//! High-level image operations.
//!
//! These functions combine the aspect-ratio rule with backend execution.

use super::backend::{BackendError, Dimensions, ImageBackend};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Width-to-height ratio at or above which an image is laid out wide.
pub const WIDE_ASPECT_RATIO: f64 = 1.5;

/// Whether dimensions are wide: `width >= 1.5 * height`.
pub fn is_wide_dimensions(dims: Dimensions) -> bool {
    dims.height > 0 && f64::from(dims.width) >= WIDE_ASPECT_RATIO * f64::from(dims.height)
}

/// Whether the image at `path` is wide. Files that cannot be probed are not.
pub fn is_wide(backend: &(impl ImageBackend + ?Sized), path: &Path) -> bool {
    match backend.identify(path) {
        Ok(dims) => is_wide_dimensions(dims),
        Err(e) => {
            log::debug!("Not probing {} for width: {}", path.display(), e);
            false
        }
    }
}

/// Encode a WebP derivative of `source` at `output`, creating parent directories.
pub fn create_webp_variant(backend: &(impl ImageBackend + ?Sized), source: &Path, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    backend.encode_webp(source, output)
}
