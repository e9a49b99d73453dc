//! Image probing and derivative encoding, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Wide check** | identify + `width >= 1.5 × height` |
//! | **Encode → WebP** | `image` WebP encoder (lossless) |
//!
//! The module is split into:
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining the wide rule + backend

pub mod backend;
pub mod operations;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use operations::{WIDE_ASPECT_RATIO, create_webp_variant, is_wide};
pub use rust_backend::{RustBackend, is_supported_image};
