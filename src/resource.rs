//! Directory-backed content items: pieces and projects.
//!
//! A resource is one directory under `pieces/` or `projects/`:
//!
//! ```text
//! projects/bronze-cast/
//! ├── index.md          ← description (index.md > bronze-cast.md > first *.md)
//! ├── bronze-cast.jpg   ← asset
//! ├── detail.png        ← asset
//! └── notes             ← no extension, ignored
//! ```
//!
//! Every derived value (asset list, description path, description) is
//! computed on first access and then frozen behind a [`OnceLock`], so a
//! resource shared between threads computes each at most once. A failure is
//! memoized too and handed to every caller, which is why [`ResourceError`]
//! is `Clone`.
//!
//! When there is no description file the description is synthesized from a
//! representative asset:
//!
//! ```markdown
//! ![bronze-cast](bronze-cast.jpg){.headline .wide}
//! # bronze-cast
//! ```

use crate::document::{self, DOCUMENT_EXTENSIONS, Document, DocumentError, is_document_path};
use crate::imaging::{self, ImageBackend, RustBackend, is_supported_image};
use crate::metadata::Metadata;
use crate::slug::sluggify;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    #[error("Nothing to publish in {}: no description, no assets, no name", .0.display())]
    NoContent(PathBuf),
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: Arc<io::Error>,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl ResourceError {
    fn io(path: &Path, source: io::Error) -> Self {
        ResourceError::Io {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }
}

/// The two kinds of published resource. Resolution is identical for both;
/// only the output directory differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Project,
    Piece,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Project, ResourceKind::Piece];

    /// URL and output directory segment.
    pub fn directory(self) -> &'static str {
        match self {
            ResourceKind::Project => "projects",
            ResourceKind::Piece => "pieces",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Project => "Projects",
            ResourceKind::Piece => "Pieces",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Project => "project",
            ResourceKind::Piece => "piece",
        })
    }
}

pub struct Resource {
    pub kind: ResourceKind,
    /// Directory holding the resource's files.
    pub path: PathBuf,
    pub slug: String,
    explicit_description: Option<PathBuf>,
    backend: Arc<dyn ImageBackend + Send>,
    assets: OnceLock<Result<Vec<PathBuf>, ResourceError>>,
    description_path: OnceLock<Result<Option<PathBuf>, ResourceError>>,
    description: OnceLock<Result<Document, ResourceError>>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("slug", &self.slug)
            .field("explicit_description", &self.explicit_description)
            .finish_non_exhaustive()
    }
}

impl Resource {
    /// A resource from a directory, or from a description file inside one.
    pub fn from_path(kind: ResourceKind, path: &Path) -> Self {
        let (dir, explicit) = if is_document_path(path) && !path.is_dir() {
            let parent = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            (parent, Some(path.to_path_buf()))
        } else {
            (path.to_path_buf(), None)
        };
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            kind,
            slug: sluggify(&name),
            path: dir,
            explicit_description: explicit,
            backend: Arc::new(RustBackend::new()),
            assets: OnceLock::new(),
            description_path: OnceLock::new(),
            description: OnceLock::new(),
        }
    }

    /// Use a different image backend for width probing.
    pub fn with_backend(mut self, backend: Arc<dyn ImageBackend + Send>) -> Self {
        self.backend = backend;
        self
    }

    /// Every file directly inside the resource directory that has an
    /// extension and is not a document. Sorted by file name.
    pub fn assets(&self) -> Result<&[PathBuf], ResourceError> {
        self.assets
            .get_or_init(|| list_assets(&self.path))
            .as_deref()
            .map_err(Clone::clone)
    }

    /// Explicit override, else `index.md`, else `{slug}.md`, else the first
    /// `*.md` by file name.
    pub fn description_path(&self) -> Result<Option<&Path>, ResourceError> {
        self.description_path
            .get_or_init(|| self.find_description_path())
            .as_ref()
            .map(|p| p.as_deref())
            .map_err(Clone::clone)
    }

    /// The resource's description, loaded or synthesized once.
    pub fn description(&self) -> Result<&Document, ResourceError> {
        self.description
            .get_or_init(|| self.resolve_description())
            .as_ref()
            .map_err(Clone::clone)
    }

    /// An independent copy of the description with every local URL made
    /// absolute under `/{directory}/{slug}/`.
    pub fn description_with_absolute_urls(&self) -> Result<Document, ResourceError> {
        let mut document = self.description()?.clone();
        document.rewrite_urls(|url| self.absolute_url(url));
        Ok(document)
    }

    /// The site path for a URL found in this resource's description.
    /// Non-local URLs pass through unchanged.
    pub fn absolute_url(&self, url: &str) -> String {
        if !document::is_local_url(url) {
            return url.to_string();
        }
        let split = url.find(['?', '#']).unwrap_or(url.len());
        let (path, suffix) = url.split_at(split);

        let mut segments: Vec<&str> = vec![self.kind.directory(), self.slug.as_str()];
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        let trailing = if path.ends_with('/') && !segments.is_empty() {
            "/"
        } else {
            ""
        };
        format!("/{}{}{}", segments.join("/"), trailing, suffix)
    }

    /// Site path of the resource's page.
    pub fn link(&self) -> String {
        format!("/{}/{}/", self.kind.directory(), self.slug)
    }

    /// The description title, falling back to the slug.
    pub fn title(&self) -> String {
        self.description()
            .ok()
            .and_then(|d| d.title())
            .map(String::from)
            .unwrap_or_else(|| self.slug.clone())
    }

    fn find_description_path(&self) -> Result<Option<PathBuf>, ResourceError> {
        if let Some(explicit) = &self.explicit_description {
            return Ok(Some(explicit.clone()));
        }
        for name in ["index.md".to_string(), format!("{}.md", self.slug)] {
            let candidate = self.path.join(name);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
        let first_markdown = sorted_files(&self.path)?.into_iter().find(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("md"))
        });
        Ok(first_markdown)
    }

    fn resolve_description(&self) -> Result<Document, ResourceError> {
        match self.description_path()? {
            Some(path) => {
                let mut document = Document::load(path)?;
                document.slug = self.slug.clone();
                self.tag_wide_headline(&mut document);
                Ok(document)
            }
            None => self.synthesize_description(),
        }
    }

    /// Tag the primary image `wide` when it points at a wide local file.
    fn tag_wide_headline(&self, doc: &mut Document) {
        let Some(relative) = doc.headline_src().and_then(document::local_path) else {
            return;
        };
        if imaging::is_wide(&*self.backend, &self.path.join(relative)) {
            doc.tag_primary_image("wide");
        }
    }

    fn synthesize_description(&self) -> Result<Document, ResourceError> {
        let assets = self.assets()?;
        let representative = representative_asset(&self.slug, assets);
        if representative.is_none() && self.slug.is_empty() {
            return Err(ResourceError::NoContent(self.path.clone()));
        }

        let mut markdown = String::new();
        match representative {
            Some(asset) => {
                let stem = asset
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                let name = asset
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                let classes = if imaging::is_wide(&*self.backend, asset) {
                    ".headline .wide"
                } else {
                    ".headline"
                };
                markdown.push_str(&format!(
                    "![{}]({}){{{}}}\n",
                    escape_alt(&stem),
                    link_destination(&name),
                    classes
                ));
            }
            None => log::warn!(
                "{} has no description and no assets, publishing a heading only",
                self.path.display()
            ),
        }
        markdown.push_str(&format!("# {}\n", self.slug));
        log::debug!(
            "Synthesized description for {} {}:\n{}",
            self.kind,
            self.slug,
            markdown
        );

        let document = Document::parse(
            &markdown,
            Some(&self.slug),
            &Metadata::default(),
            &Metadata::default(),
        )?;
        Ok(document)
    }
}

// ============================================================================
// Filesystem helpers
// ============================================================================

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, ResourceError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ResourceError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ResourceError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn list_assets(dir: &Path) -> Result<Vec<PathBuf>, ResourceError> {
    Ok(sorted_files(dir)?
        .into_iter()
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| {
                    !e.is_empty() && !DOCUMENT_EXTENSIONS.contains(&e.to_lowercase().as_str())
                })
        })
        .collect())
}

/// The asset named after the resource, else the first image, else the first asset.
fn representative_asset<'a>(slug: &str, assets: &'a [PathBuf]) -> Option<&'a PathBuf> {
    let stem_slug = |p: &PathBuf| {
        p.file_stem()
            .map(|s| sluggify(&s.to_string_lossy()))
            .unwrap_or_default()
    };
    assets
        .iter()
        .find(|p| !slug.is_empty() && stem_slug(p) == slug)
        .or_else(|| assets.iter().find(|p| is_supported_image(p)))
        .or_else(|| assets.first())
}

fn escape_alt(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '\\' | '*' | '_' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A Markdown link destination; wrapped in `<...>` when the name has
/// whitespace or parentheses.
fn link_destination(name: &str) -> String {
    if name.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{name}>")
    } else {
        name.to_string()
    }
}
