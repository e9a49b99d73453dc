//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user config file overrides any subset of them.
//!
//! ## Config File Location
//!
//! `folio` reads `--config PATH` when given, else `./config.toml` when it
//! exists, else runs on stock defaults. Relative paths inside the file are
//! resolved against the directory the file lives in:
//!
//! ```text
//! portfolio/
//! ├── config.toml
//! ├── source/
//! │   ├── projects/
//! │   ├── pieces/
//! │   ├── style/
//! │   └── images/
//! └── generated/          # output
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! input = "source"
//! output = "generated"
//! build = "build"                # scan manifest
//! projects = "source/projects"
//! pieces = "source/pieces"
//! static = ["source/style", "source/script", "source/images"]
//!
//! [site]
//! title = "Portfolio"
//! stylesheets = ["/style/main.css"]
//! homepage_items = 6             # newest resources shown on the homepage
//!
//! [processing]
//! max_processes = 4              # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want:
//!
//! ```toml
//! [site]
//! title = "Ana Ferreira: Ceramics"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Where sources live and where output goes.
    pub paths: PathsConfig,
    /// Site-wide presentation settings.
    pub site: SiteSection,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.homepage_items == 0 {
            return Err(ConfigError::Validation(
                "site.homepage_items must be at least 1".into(),
            ));
        }
        for (key, value) in [
            ("paths.output", &self.paths.output),
            ("paths.projects", &self.paths.projects),
            ("paths.pieces", &self.paths.pieces),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.paths.projects == self.paths.pieces {
            return Err(ConfigError::Validation(
                "paths.projects and paths.pieces must be different directories".into(),
            ));
        }
        Ok(())
    }

    /// Resolve every configured path against `base_dir`.
    pub fn resolve_paths(&self, base_dir: &Path) -> ResolvedPaths {
        let resolve = |p: &str| {
            let path = Path::new(p);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base_dir.join(path)
            }
        };
        ResolvedPaths {
            input: resolve(&self.paths.input),
            output: resolve(&self.paths.output),
            build: resolve(&self.paths.build),
            projects: resolve(&self.paths.projects),
            pieces: resolve(&self.paths.pieces),
            static_paths: self.paths.static_paths.iter().map(|p| resolve(p)).collect(),
        }
    }
}

/// Source and output locations, as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Root of all source material.
    pub input: String,
    /// Where the generated site is written.
    pub output: String,
    /// Scratch directory for build artifacts (the scan manifest).
    pub build: String,
    /// One subdirectory per project.
    pub projects: String,
    /// One subdirectory per piece.
    pub pieces: String,
    /// Directories or files copied verbatim into the output.
    #[serde(rename = "static")]
    pub static_paths: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: "source".to_string(),
            output: "generated".to_string(),
            build: "build".to_string(),
            projects: "source/projects".to_string(),
            pieces: "source/pieces".to_string(),
            static_paths: vec![
                "source/style".to_string(),
                "source/script".to_string(),
                "source/images".to_string(),
            ],
        }
    }
}

/// Site-wide presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSection {
    /// Used in page titles and the homepage heading.
    pub title: String,
    /// Stylesheet URLs linked from every page.
    pub stylesheets: Vec<String>,
    /// Number of newest resources shown on the homepage.
    pub homepage_items: usize,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            title: "Portfolio".to_string(),
            stylesheets: vec!["/style/main.css".to_string()],
            homepage_items: 6,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Config paths made absolute (or relative to the working directory when
/// the base directory is).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub input: PathBuf,
    pub output: PathBuf,
    pub build: PathBuf,
    pub projects: PathBuf,
    pub pieces: PathBuf,
    pub static_paths: Vec<PathBuf>,
}

/// A validated config together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SiteConfig,
    pub paths: ResolvedPaths,
    /// The file the config was read from, if any.
    pub source: Option<PathBuf>,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SiteConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(config_path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the site config.
///
/// `explicit` is the `--config` path. Without one, `config.toml` in `cwd` is
/// used when present. A missing explicit file is a warning, not an error:
/// the build proceeds on stock defaults.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<LoadedConfig, ConfigError> {
    let candidate = match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => cwd.join(path),
        None => cwd.join("config.toml"),
    };

    let overlay = load_raw_config(&candidate)?;
    if overlay.is_none() && explicit.is_some() {
        log::warn!(
            "Config file {} not found, using defaults",
            candidate.display()
        );
    }

    let config = resolve_config(stock_defaults_value()?, overlay.clone())?;
    let (base_dir, source) = match overlay {
        Some(_) => (
            candidate
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| cwd.to_path_buf()),
            Some(candidate),
        ),
        None => (cwd.to_path_buf(), None),
    };
    let paths = config.resolve_paths(&base_dir);
    Ok(LoadedConfig {
        config,
        paths,
        source,
    })
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Folio Configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Relative paths are resolved against the directory holding this file.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Paths
# ---------------------------------------------------------------------------
[paths]
# Root of all source material.
input = "source"

# Where the generated site is written.
output = "generated"

# Build artifacts (the `folio scan` manifest).
build = "build"

# One subdirectory per project / per piece.
projects = "source/projects"
pieces = "source/pieces"

# Directories (or single files) copied verbatim into the output root.
static = ["source/style", "source/script", "source/images"]

# ---------------------------------------------------------------------------
# Site
# ---------------------------------------------------------------------------
[site]
# Shown in page titles and as the homepage heading.
title = "Portfolio"

# Stylesheet URLs linked from every page.
stylesheets = ["/style/main.css"]

# How many of the newest projects and pieces the homepage shows.
homepage_items = 6

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
