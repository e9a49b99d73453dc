//! Shared test utilities for the folio test suite.
//!
//! Fixtures are built in temp directories at test time: text files via
//! [`write_file`], real JPEGs via [`create_test_jpeg`], and a config rooted
//! at a temp directory via [`site_config`].
//!
//! ```rust,ignore
//! let tmp = TempDir::new().unwrap();
//! let loaded = site_config(tmp.path(), SiteConfig::default());
//! create_test_jpeg(&loaded.paths.pieces.join("bowl/bowl.jpg"), 300, 100);
//! ```

use crate::config::{LoadedConfig, SiteConfig};
use image::{ImageEncoder, RgbImage};
use std::path::{Path, PathBuf};

/// Write `content` to `path`, creating parent directories. Returns the path.
pub fn write_file(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
    path.to_path_buf()
}

/// Write a gradient JPEG of the given size, creating parent directories.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// A loaded config whose relative paths resolve under `root`.
pub fn site_config(root: &Path, config: SiteConfig) -> LoadedConfig {
    config.validate().unwrap();
    let paths = config.resolve_paths(root);
    LoadedConfig {
        config,
        paths,
        source: None,
    }
}
