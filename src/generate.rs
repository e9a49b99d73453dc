//! Site assembly.
//!
//! Turns resolved resources into the output tree:
//!
//! ```text
//! generated/
//! ├── index.html                    ← homepage: newest N across both kinds
//! ├── projects/
//! │   ├── index.html                ← gallery
//! │   └── bronze-cast/
//! │       ├── index.html            ← resource page
//! │       ├── bronze-cast.jpg       ← copied asset
//! │       └── bronze-cast.webp      ← encoded derivative
//! ├── pieces/
//! │   └── ...
//! └── style/                        ← static paths
//! ```
//!
//! Resource pages are built in parallel on a rayon pool sized by
//! `[processing] max_processes`. Each worker writes only under its own
//! resource directory. A failing resource is recorded in the
//! [`BuildReport`] and logged; its siblings are still built. Galleries and
//! the homepage are written afterwards on the calling thread.
//!
//! The same resolution feeds `scan`, which writes a JSON inventory of every
//! resource to `{build}/manifest.json` without touching the output tree.

use crate::config::{self, LoadedConfig, ResolvedPaths};
use crate::document::Document;
use crate::imaging::{self, BackendError, ImageBackend, RustBackend};
use crate::render::{GalleryItem, MaudRenderer, PageContext, Renderer, SiteContext};
use crate::resource::{Resource, ResourceError, ResourceKind};
use crate::sync::{self, SyncError};
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("Image error: {0}")]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("{} has no usable name for a URL", .0.display())]
    EmptySlug(PathBuf),
}

/// What to build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Resource directories or description files. Empty means everything.
    pub targets: Vec<PathBuf>,
    /// Rebuild gallery indexes and the homepage.
    pub galleries: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            galleries: true,
        }
    }
}

/// One written resource page.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltPage {
    pub kind: ResourceKind,
    pub slug: String,
    pub title: String,
    pub source: PathBuf,
    pub output: PathBuf,
    pub assets_copied: usize,
    pub variants_encoded: usize,
}

/// A resource that could not be built.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub kind: ResourceKind,
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct BuildReport {
    pub pages: Vec<BuiltPage>,
    pub galleries: Vec<(ResourceKind, PathBuf)>,
    pub homepage: Option<PathBuf>,
    pub static_files: usize,
    pub failures: Vec<Failure>,
}

/// Build the site with the stock renderer and image backend.
pub fn build_site(loaded: &LoadedConfig, options: &BuildOptions) -> Result<BuildReport, GenerateError> {
    build_site_with(loaded, options, &MaudRenderer::new(), Arc::new(RustBackend::new()))
}

/// Build the site with a specific renderer and image backend.
pub fn build_site_with(
    loaded: &LoadedConfig,
    options: &BuildOptions,
    renderer: &dyn Renderer,
    backend: Arc<dyn ImageBackend + Send>,
) -> Result<BuildReport, GenerateError> {
    let paths = &loaded.paths;
    let site = SiteContext {
        title: &loaded.config.site.title,
        stylesheets: &loaded.config.site.stylesheets,
    };

    let all = if options.targets.is_empty() || options.galleries {
        discover_resources(paths, &backend)?
    } else {
        Vec::new()
    };
    let targeted: Vec<Resource> = options
        .targets
        .iter()
        .map(|t| Resource::from_path(target_kind(t, paths), t).with_backend(backend.clone()))
        .collect();
    let to_build = if options.targets.is_empty() {
        &all
    } else {
        &targeted
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config::effective_threads(&loaded.config.processing))
        .build()?;
    let ctx = PageBuild {
        output: &paths.output,
        site,
        renderer,
        backend: &*backend,
    };
    let results: Vec<(&Resource, Result<BuiltPage, GenerateError>)> = pool.install(|| {
        to_build
            .par_iter()
            .map(|resource| (resource, build_resource(resource, &ctx)))
            .collect()
    });

    let mut report = BuildReport::default();
    for (resource, result) in results {
        match result {
            Ok(page) => report.pages.push(page),
            Err(e) => record_failure(&mut report.failures, resource, &e),
        }
    }

    if options.galleries {
        let mut all_items = Vec::new();
        for kind in ResourceKind::ALL {
            let mut items = Vec::new();
            for resource in all.iter().filter(|r| r.kind == kind) {
                match gallery_item(resource) {
                    Ok(item) => items.push(item),
                    Err(e) => record_failure(&mut report.failures, resource, &e),
                }
            }
            sort_newest_first(&mut items);
            let index = paths.output.join(kind.directory()).join("index.html");
            write_page(&index, &renderer.gallery(&site, kind, &items))?;
            report.galleries.push((kind, index));
            all_items.extend(items);
        }

        sort_newest_first(&mut all_items);
        all_items.truncate(loaded.config.site.homepage_items);
        let home = paths.output.join("index.html");
        write_page(&home, &renderer.homepage(&site, &all_items))?;
        report.homepage = Some(home);
    }

    report.static_files = sync::sync_static_paths(&paths.static_paths, &paths.output)?;
    Ok(report)
}

// ============================================================================
// Resource discovery
// ============================================================================

/// Every subdirectory of the configured projects and pieces directories.
pub fn discover_resources(
    paths: &ResolvedPaths,
    backend: &Arc<dyn ImageBackend + Send>,
) -> Result<Vec<Resource>, GenerateError> {
    let mut resources = Vec::new();
    for kind in ResourceKind::ALL {
        for dir in resource_dirs(kind_root(kind, paths))? {
            resources.push(Resource::from_path(kind, &dir).with_backend(backend.clone()));
        }
    }
    Ok(resources)
}

fn kind_root(kind: ResourceKind, paths: &ResolvedPaths) -> &Path {
    match kind {
        ResourceKind::Project => &paths.projects,
        ResourceKind::Piece => &paths.pieces,
    }
}

fn resource_dirs(root: &Path) -> Result<Vec<PathBuf>, GenerateError> {
    if !root.is_dir() {
        log::warn!("{} is not a directory, nothing to build there", root.display());
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if path.is_dir() && !hidden {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// The kind of a build target: pieces when it lives under the pieces
/// directory, projects otherwise.
pub fn target_kind(target: &Path, paths: &ResolvedPaths) -> ResourceKind {
    let absolute = |p: &Path| std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
    if absolute(target).starts_with(absolute(&paths.pieces)) {
        ResourceKind::Piece
    } else {
        ResourceKind::Project
    }
}

// ============================================================================
// Resource pages
// ============================================================================

struct PageBuild<'a> {
    output: &'a Path,
    site: SiteContext<'a>,
    renderer: &'a dyn Renderer,
    backend: &'a (dyn ImageBackend + Send),
}

fn build_resource(resource: &Resource, ctx: &PageBuild) -> Result<BuiltPage, GenerateError> {
    if resource.slug.is_empty() {
        return Err(GenerateError::EmptySlug(resource.path.clone()));
    }
    let description = resource.description()?;
    let out_dir = ctx.output.join(resource.kind.directory()).join(&resource.slug);

    let assets = resource.assets()?;
    let mut assets_copied = 0;
    for asset in assets {
        if let Some(name) = asset.file_name() {
            assets_copied += usize::from(sync::copy_if_stale(asset, &out_dir.join(name))?);
        }
    }
    let variants_encoded = encode_variants(description, assets, &out_dir, ctx.backend)?;

    let absolute = resource.description_with_absolute_urls()?;
    let title = resource.title();
    let description_html = description.inner_html();
    let headline_html = description.headline_html();
    let html = ctx.renderer.page(
        &ctx.site,
        &PageContext {
            kind: resource.kind,
            title: &title,
            description_html: &description_html,
            headline_html: headline_html.as_deref(),
            headline_src: absolute.headline_src(),
        },
    );
    let output = out_dir.join("index.html");
    write_page(&output, &html)?;

    Ok(BuiltPage {
        kind: resource.kind,
        slug: resource.slug.clone(),
        title,
        source: resource.path.clone(),
        output,
        assets_copied,
        variants_encoded,
    })
}

/// Encode every `.webp` dependency that no asset provides, from the asset
/// sharing its stem.
fn encode_variants(
    description: &Document,
    assets: &[PathBuf],
    out_dir: &Path,
    backend: &(dyn ImageBackend + Send),
) -> Result<usize, GenerateError> {
    let mut encoded = 0;
    for dependency in description.iter_dependencies() {
        let relative = Path::new(&dependency);
        let is_webp = relative
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("webp"));
        let plain_name = relative.components().count() == 1
            && matches!(relative.components().next(), Some(Component::Normal(_)));
        if !is_webp || !plain_name {
            continue;
        }
        if assets.iter().any(|a| a.file_name() == relative.file_name()) {
            continue;
        }
        let Some(source) = assets
            .iter()
            .find(|a| a.file_stem() == relative.file_stem() && imaging::is_supported_image(a))
        else {
            log::debug!("No source image for {}", dependency);
            continue;
        };
        let target = out_dir.join(relative);
        if sync::is_up_to_date(source, &target) {
            continue;
        }
        imaging::create_webp_variant(backend, source, &target)?;
        log::info!("{} -> {}", source.display(), target.display());
        encoded += 1;
    }
    Ok(encoded)
}

fn write_page(path: &Path, html: &str) -> Result<(), GenerateError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, html)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn record_failure(failures: &mut Vec<Failure>, resource: &Resource, error: &dyn std::fmt::Display) {
    if failures
        .iter()
        .any(|f| f.kind == resource.kind && f.path == resource.path)
    {
        return;
    }
    log::warn!("Skipping {} {}: {}", resource.kind, resource.path.display(), error);
    failures.push(Failure {
        kind: resource.kind,
        path: resource.path.clone(),
        message: error.to_string(),
    });
}

// ============================================================================
// Galleries
// ============================================================================

/// A gallery card for one resource.
pub fn gallery_item(resource: &Resource) -> Result<GalleryItem, GenerateError> {
    if resource.slug.is_empty() {
        return Err(GenerateError::EmptySlug(resource.path.clone()));
    }
    let absolute = resource.description_with_absolute_urls()?;
    Ok(GalleryItem {
        kind: resource.kind,
        slug: resource.slug.clone(),
        link: resource.link(),
        title: resource.title(),
        image_src: absolute.headline_src().map(String::from),
        wide: absolute
            .primary_image
            .as_ref()
            .is_some_and(|img| img.has_class("wide")),
        date: absolute.metadata.date,
    })
}

/// Newest first; undated items last; ties broken by slug, then kind.
pub fn sort_newest_first(items: &mut [GalleryItem]) {
    items.sort_by(|a, b| {
        compare_dates_desc(a.date, b.date)
            .then_with(|| a.slug.cmp(&b.slug))
            .then_with(|| a.kind.cmp(&b.kind))
    });
}

fn compare_dates_desc(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// ============================================================================
// Scan manifest
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ScanManifest {
    pub resources: Vec<ScanEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub kind: ResourceKind,
    pub slug: String,
    pub path: PathBuf,
    pub title: String,
    pub date: Option<NaiveDate>,
    pub description_path: Option<PathBuf>,
    pub headline: Option<String>,
    pub assets: Vec<String>,
    /// Set when the resource could not be resolved.
    pub error: Option<String>,
}

/// Resolve every resource without writing any output.
pub fn scan_site(paths: &ResolvedPaths) -> Result<ScanManifest, GenerateError> {
    let backend: Arc<dyn ImageBackend + Send> = Arc::new(RustBackend::new());
    let resources = discover_resources(paths, &backend)?;
    let entries = resources.par_iter().map(scan_entry).collect();
    Ok(ScanManifest { resources: entries })
}

fn scan_entry(resource: &Resource) -> ScanEntry {
    let description = resource.description();
    let assets = resource
        .assets()
        .map(|assets| {
            assets
                .iter()
                .filter_map(|a| a.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    ScanEntry {
        kind: resource.kind,
        slug: resource.slug.clone(),
        path: resource.path.clone(),
        title: resource.title(),
        date: description.as_ref().ok().and_then(|d| d.metadata.date),
        description_path: resource
            .description_path()
            .ok()
            .flatten()
            .map(Path::to_path_buf),
        headline: description
            .as_ref()
            .ok()
            .and_then(|d| d.headline_src())
            .map(String::from),
        assets,
        error: description.err().map(|e| e.to_string()),
    }
}

/// Write the manifest as pretty JSON to `{build_dir}/manifest.json`.
pub fn write_manifest(manifest: &ScanManifest, build_dir: &Path) -> Result<PathBuf, GenerateError> {
    fs::create_dir_all(build_dir)?;
    let path = build_dir.join("manifest.json");
    fs::write(&path, serde_json::to_string_pretty(manifest)?)?;
    log::info!("Wrote {}", path.display());
    Ok(path)
}
