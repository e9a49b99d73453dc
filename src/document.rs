//! The document model: a rendered Markdown file plus what the site needs
//! to know about it.
//!
//! ```text
//! 2019-06-30 Bronze Cast.md
//!        │
//!        ▼  load(): slug "bronze-cast", date 2019-06-30 as a default
//! ┌──────────────────────────────────────────────┐
//! │ root           <html> wrapper around blocks  │
//! │ primary_image  detached copy of one <img>    │
//! │ metadata       defaults < front matter < ... │
//! │ title()        first h1..h6 text, memoized   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The primary image is copied out of the tree rather than moved, so the page
//! body still shows it while galleries get a copy carrying a `headline` class.
//! Because it is a copy, URL rewriting visits it as a second, explicit
//! attachment point next to `root`.

use crate::markdown;
use crate::markup::Element;
use crate::metadata::{self, Metadata};
use crate::slug::{SlugError, get_slug_and_optional_date, sluggify};
use percent_encoding::percent_decode_str;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// File extensions `load` accepts. HTML files go through the same renderer;
/// raw HTML blocks pass into the tree unchanged.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["md", "markdown", "html", "htm"];

#[derive(Error, Debug, Clone)]
pub enum DocumentError {
    #[error("Unsupported document format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("Document has no slug and no heading to derive one from")]
    TitleMissing,
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: Arc<io::Error>,
    },
    #[error(transparent)]
    Slug(#[from] SlugError),
}

#[derive(Debug, Clone)]
pub struct Document {
    pub slug: String,
    /// Synthetic `<html>` wrapper; its children are the top-level blocks.
    pub root: Element,
    pub primary_image: Option<Element>,
    pub metadata: Metadata,
    title: OnceLock<Option<String>>,
}

pub fn is_document_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

impl Document {
    /// Load a document from disk. The slug and an optional date come from the
    /// filename stem; the date becomes a metadata default that front matter
    /// can override.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        Self::load_with_overrides(path, &Metadata::default())
    }

    pub fn load_with_overrides(path: &Path, overrides: &Metadata) -> Result<Self, DocumentError> {
        if !is_document_path(path) {
            return Err(DocumentError::UnsupportedFormat(path.to_path_buf()));
        }
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        let (slug, date) = get_slug_and_optional_date(stem)?;
        let defaults = date.map(Metadata::with_date).unwrap_or_default();
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        let slug = (!slug.is_empty()).then_some(slug);
        Self::parse(&text, slug.as_deref(), &defaults, overrides)
    }

    /// Render Markdown text into a document.
    ///
    /// Without a `slug`, the slug is derived from the title; a document with
    /// neither fails with [`DocumentError::TitleMissing`].
    pub fn parse(
        text: &str,
        slug: Option<&str>,
        defaults: &Metadata,
        overrides: &Metadata,
    ) -> Result<Self, DocumentError> {
        let rendered = markdown::render(text);
        let extracted = Metadata::from_raw(&rendered.metadata);

        let mut root = Element::new("html");
        root.children = rendered.nodes;
        let primary_image = identify_headline_image(&root).map(|img| {
            let mut img = img.clone();
            img.add_class("headline");
            img
        });

        let mut document = Self {
            slug: String::new(),
            root,
            primary_image,
            metadata: metadata::resolve(defaults, &extracted, overrides),
            title: OnceLock::new(),
        };
        document.slug = match slug {
            Some(slug) => slug.to_string(),
            None => {
                let derived = document.title().map(sluggify).unwrap_or_default();
                if derived.is_empty() {
                    return Err(DocumentError::TitleMissing);
                }
                derived
            }
        };
        Ok(document)
    }

    /// Parse with no slug and no metadata layers.
    pub fn from_markdown(text: &str) -> Result<Self, DocumentError> {
        Self::parse(text, None, &Metadata::default(), &Metadata::default())
    }

    /// Text of the first heading, trying `h1` through `h6` in turn.
    ///
    /// Computed on first access from the tree as loaded; later edits to
    /// headings are not reflected.
    pub fn title(&self) -> Option<&str> {
        self.title.get_or_init(|| find_title(&self.root)).as_deref()
    }

    pub fn inner_html(&self) -> String {
        self.root.inner_html()
    }

    pub fn headline_html(&self) -> Option<String> {
        self.primary_image.as_ref().map(Element::outer_html)
    }

    pub fn headline_src(&self) -> Option<&str> {
        self.primary_image.as_ref().and_then(|img| img.attr("src"))
    }

    /// Add a class to the detached primary image only.
    pub fn tag_primary_image(&mut self, class: &str) {
        if let Some(img) = &mut self.primary_image {
            img.add_class(class);
        }
    }

    /// Apply `f` to every image `src`, anchor `href` and `srcset` candidate,
    /// in `root` and in the detached primary image. Each attachment point is
    /// walked once, so every logical URL is rewritten exactly once per copy.
    /// Empty and fragment-only URLs are left alone.
    pub fn rewrite_urls<F: FnMut(&str) -> String>(&mut self, mut f: F) {
        let mut targets: Vec<&mut Element> = vec![&mut self.root];
        targets.extend(self.primary_image.as_mut());
        for target in targets {
            rewrite_tree_urls(target, &mut f);
        }
    }

    /// Every distinct local path the document references, plus a `.webp`
    /// variant of each local path in the primary image.
    ///
    /// Query strings and fragments are stripped. Each call walks the current
    /// tree afresh.
    pub fn iter_dependencies(&self) -> impl Iterator<Item = String> + '_ {
        let body = self
            .root
            .descendants()
            .flat_map(element_urls)
            .filter_map(local_path);
        let headline = self
            .primary_image
            .iter()
            .flat_map(Element::descendants)
            .flat_map(element_urls)
            .filter_map(local_path)
            .flat_map(|path| {
                let webp = webp_variant(&path);
                [path, webp]
            });
        let mut seen = HashSet::new();
        body.chain(headline).filter(move |path| seen.insert(path.clone()))
    }
}

// ============================================================================
// Headline image and title
// ============================================================================

/// Pick the image that best represents a document.
///
/// Top-level blocks are scanned in order. A block whose only child is an
/// image (or that is itself an image) qualifies; the first block holding any
/// text, however deeply nested, ends the scan. Failing that, the first image
/// anywhere in the tree is used.
pub fn identify_headline_image(root: &Element) -> Option<&Element> {
    for block in root.element_children() {
        if !block.text_content().trim().is_empty() {
            break;
        }
        if block.name == "img" {
            return Some(block);
        }
        if let Some(child) = block.sole_child()
            && child.name == "img"
        {
            return Some(child);
        }
    }
    root.iter_tag("img").next()
}

fn find_title(root: &Element) -> Option<String> {
    ["h1", "h2", "h3", "h4", "h5", "h6"].iter().find_map(|level| {
        root.iter_tag(level)
            .map(|h| h.text_content().trim().to_string())
            .find(|text| !text.is_empty())
    })
}

// ============================================================================
// URLs
// ============================================================================

/// Whether a URL refers to a file relative to the document: not empty, not
/// a fragment, not root-relative, and without a scheme or authority.
pub fn is_local_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() || url.starts_with('#') || url.starts_with('/') {
        return false;
    }
    matches!(
        url::Url::parse(url),
        Err(url::ParseError::RelativeUrlWithoutBase)
    )
}

fn is_rewritable(url: &str) -> bool {
    !url.trim().is_empty() && !url.starts_with('#')
}

/// The percent-decoded path portion of a local URL, without query or
/// fragment: `wide%20pano.jpg?v=2` names the file `wide pano.jpg`.
pub fn local_path(url: &str) -> Option<String> {
    if !is_local_url(url) {
        return None;
    }
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = url[..end].trim();
    if path.is_empty() {
        return None;
    }
    Some(percent_decode_str(path).decode_utf8_lossy().into_owned())
}

fn webp_variant(path: &str) -> String {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}.webp", &path[..name_start + dot]),
        _ => format!("{path}.webp"),
    }
}

/// URLs carried by one element: `img@src`, `a@href` and `srcset` candidates.
fn element_urls(element: &Element) -> Vec<&str> {
    let mut urls = Vec::new();
    let key = match element.name.as_str() {
        "img" => Some("src"),
        "a" => Some("href"),
        _ => None,
    };
    if let Some(url) = key.and_then(|k| element.attr(k)) {
        urls.push(url);
    }
    if let Some(srcset) = element.attr("srcset") {
        urls.extend(
            srcset
                .split(',')
                .filter_map(|candidate| candidate.split_whitespace().next()),
        );
    }
    urls
}

fn rewrite_tree_urls(tree: &mut Element, f: &mut dyn FnMut(&str) -> String) {
    tree.walk_mut(&mut |element: &mut Element| {
        let key = match element.name.as_str() {
            "img" => Some("src"),
            "a" => Some("href"),
            _ => None,
        };
        if let Some(key) = key
            && let Some(rewritten) = element.attr(key).filter(|u| is_rewritable(u)).map(&mut *f)
        {
            element.set_attr(key, rewritten);
        }
        if let Some(srcset) = element.attr("srcset") {
            let rewritten = rewrite_srcset(srcset, &mut *f);
            element.set_attr("srcset", rewritten);
        }
    });
}

fn rewrite_srcset(srcset: &str, f: &mut dyn FnMut(&str) -> String) -> String {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| {
            let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((url, rest)) => (url, rest.trim()),
                None => (candidate, ""),
            };
            let url = if is_rewritable(url) { f(url) } else { url.to_string() };
            if descriptor.is_empty() {
                url
            } else {
                format!("{url} {descriptor}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_fragment;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn doc(text: &str) -> Document {
        Document::parse(text, Some("doc"), &Metadata::default(), &Metadata::default()).unwrap()
    }

    // =========================================================================
    // Headline image
    // =========================================================================

    #[test]
    fn headline_is_leading_image() {
        let d = doc("![x](x.png)\n\nSome text.");
        assert_eq!(d.headline_src(), Some("x.png"));
    }

    #[test]
    fn headline_falls_back_to_first_image() {
        let d = doc("hello\n\n![x](x.png)");
        assert_eq!(d.headline_src(), Some("x.png"));
    }

    #[test]
    fn headline_prefers_structural_match_over_later_images() {
        let d = doc("![x](x.png)\n\nhello\n\n![y](y.png)");
        assert_eq!(d.headline_src(), Some("x.png"));
    }

    #[test]
    fn text_before_image_blocks_structural_rule() {
        let d = doc("![a](a.png) caption\n\nhello\n\n![b](b.png)");
        // the first block has direct text, so fall back to the first image in order
        assert_eq!(d.headline_src(), Some("a.png"));
    }

    #[test]
    fn nested_text_ends_scan() {
        let d = doc("<div><p>nested</p></div>\n\n![b](b.png)");
        assert_eq!(d.headline_src(), Some("b.png"));
        let d = doc("<div><p>nested</p></div>\n\n![a](a.png)\n\n<div><img src=\"b.png\"></div>");
        // the div ends the scan, so the first image wins over a later sole-image block
        assert_eq!(d.headline_src(), Some("a.png"));
    }

    #[test]
    fn blockquote_text_ends_scan() {
        let d = doc("> Some text ![a](a.png)\n\n![b](b.png)");
        assert_eq!(d.headline_src(), Some("a.png"));
    }

    #[test]
    fn list_text_ends_scan() {
        let d = doc("- item ![early](early.png)\n\n![late](late.png)");
        assert_eq!(d.headline_src(), Some("early.png"));
    }

    #[test]
    fn empty_blocks_before_image_do_not_end_scan() {
        let d = doc("<div></div>\n\n![b](b.png)\n\ntext ![c](c.png)");
        assert_eq!(d.headline_src(), Some("b.png"));
    }

    #[test]
    fn no_image_no_headline() {
        let d = doc("# Just text");
        assert!(d.primary_image.is_none());
        assert_eq!(d.iter_dependencies().count(), 0);
    }

    #[test]
    fn headline_is_a_tagged_copy() {
        let mut d = doc("![x](x.png)");
        d.tag_primary_image("wide");
        let headline = d.primary_image.as_ref().unwrap();
        assert!(headline.has_class("headline"));
        assert!(headline.has_class("wide"));
        let in_body = d.root.iter_tag("img").next().unwrap();
        assert!(!in_body.has_class("headline"));
    }

    // =========================================================================
    // Title and slug
    // =========================================================================

    #[test]
    fn title_prefers_shallowest_level() {
        let d = doc("## Second\n\n# First");
        assert_eq!(d.title(), Some("First"));
    }

    #[test]
    fn title_is_full_text_content() {
        let d = doc("# A *bronze* cast");
        assert_eq!(d.title(), Some("A bronze cast"));
    }

    #[test]
    fn empty_heading_is_skipped() {
        let d = doc("#\n\n## Real");
        assert_eq!(d.title(), Some("Real"));
    }

    #[test]
    fn slug_derives_from_title() {
        let d = Document::from_markdown("# A (Normal) Title.").unwrap();
        assert_eq!(d.slug, "a-normal-title");
    }

    #[test]
    fn missing_slug_and_title_fails() {
        let result = Document::from_markdown("just text");
        assert!(matches!(result, Err(DocumentError::TitleMissing)));
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn inner_html_roundtrip_is_stable() {
        let source = "![x](x.png){.wide}\n\n# Title\n\nText with [a link](b.html) & *emphasis*.\n\n| a | b |\n|---|---|\n| 1 | 2 |";
        let once = doc(source).inner_html();
        let twice = doc(&once).inner_html();
        assert_eq!(once, twice);
    }

    #[test]
    fn roundtrip_keeps_headline() {
        let first = doc("![x](x.png)\n\n# T");
        let second = doc(&first.inner_html());
        assert_eq!(second.headline_src(), Some("x.png"));
        assert_eq!(second.title(), Some("T"));
    }

    // =========================================================================
    // URL rewriting
    // =========================================================================

    #[test]
    fn rewrite_touches_each_copy_once() {
        let mut d = doc("<img src=\"a.png\">");
        d.rewrite_urls(|u| u.to_uppercase());
        assert_eq!(d.root.iter_tag("img").next().unwrap().attr("src"), Some("A.PNG"));
        assert_eq!(d.headline_src(), Some("A.PNG"));
    }

    #[test]
    fn rewrite_is_not_applied_twice() {
        let mut d = doc("![x](x.png)");
        d.rewrite_urls(|u| format!("p/{u}"));
        assert_eq!(d.headline_src(), Some("p/x.png"));
        assert_eq!(d.root.iter_tag("img").next().unwrap().attr("src"), Some("p/x.png"));
    }

    #[test]
    fn rewrite_covers_href_and_srcset() {
        let mut d = doc(
            "<p><a href=\"detail.html\">d</a><img src=\"s.png\" srcset=\"s-1x.png 1x, s-2x.png 2x\"></p>",
        );
        d.rewrite_urls(|u| format!("/base/{u}"));
        let a = d.root.iter_tag("a").next().unwrap();
        assert_eq!(a.attr("href"), Some("/base/detail.html"));
        let img = d.root.iter_tag("img").next().unwrap();
        assert_eq!(img.attr("srcset"), Some("/base/s-1x.png 1x, /base/s-2x.png 2x"));
    }

    #[test]
    fn rewrite_skips_fragments() {
        let mut d = doc("[top](#top)\n\n[x]()");
        d.rewrite_urls(|u| format!("/base/{u}"));
        let hrefs: Vec<_> = d.root.iter_tag("a").filter_map(|a| a.attr("href")).collect();
        assert_eq!(hrefs, vec!["#top", ""]);
    }

    // =========================================================================
    // Dependencies
    // =========================================================================

    #[test]
    fn dependencies_are_local_distinct_with_webp_headline() {
        let d = doc(
            "![h](head.jpg)\n\n![a](a.png) ![a again](a.png?v=2)\n\n[remote](https://example.com/x.png) [root](/abs.png) [mail](mailto:me@example.com)",
        );
        let deps: Vec<_> = d.iter_dependencies().collect();
        assert_eq!(deps, vec!["head.jpg", "a.png", "head.webp"]);
    }

    #[test]
    fn dependencies_are_percent_decoded() {
        let mut d = doc("![x](wide%20pano.jpg)\n\n[notes](caf%C3%A9%20notes.html#end)");
        let deps: Vec<_> = d.iter_dependencies().collect();
        assert_eq!(deps, vec!["wide pano.jpg", "café notes.html", "wide pano.webp"]);
        d.rewrite_urls(|u| format!("/base/{u}"));
        let img = d.root.iter_tag("img").next().unwrap();
        assert_eq!(img.attr("src"), Some("/base/wide%20pano.jpg"));
    }

    #[test]
    fn dependencies_are_restartable() {
        let d = doc("![h](head.jpg)");
        let first: Vec<_> = d.iter_dependencies().collect();
        let second: Vec<_> = d.iter_dependencies().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn local_url_classification() {
        assert!(is_local_url("a.png"));
        assert!(is_local_url("../x/a.png"));
        assert!(is_local_url("sub dir/a b.png"));
        assert!(!is_local_url("/a.png"));
        assert!(!is_local_url("//cdn.example.com/a.png"));
        assert!(!is_local_url("https://example.com/a.png"));
        assert!(!is_local_url("data:image/png;base64,AAAA"));
        assert!(!is_local_url("#frag"));
        assert!(!is_local_url(""));
    }

    #[test]
    fn webp_variant_replaces_extension() {
        assert_eq!(webp_variant("img/a.b.jpg"), "img/a.b.webp");
        assert_eq!(webp_variant("dir.v2/noext"), "dir.v2/noext.webp");
        assert_eq!(webp_variant(".hidden"), ".hidden.webp");
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn load_takes_slug_and_date_from_filename() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2019-06-30 Bronze Cast.md");
        std::fs::write(&path, "# Something Else").unwrap();
        let d = Document::load(&path).unwrap();
        assert_eq!(d.slug, "bronze-cast");
        assert_eq!(d.metadata.date, NaiveDate::from_ymd_opt(2019, 6, 30));
    }

    #[test]
    fn front_matter_date_overrides_filename_date() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2019-06-30-cast.md");
        std::fs::write(&path, "date: 2020-01-02\n\n# Cast").unwrap();
        let d = Document::load(&path).unwrap();
        assert_eq!(d.metadata.date, NaiveDate::from_ymd_opt(2020, 1, 2));
    }

    #[test]
    fn overrides_win_over_front_matter() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cast.md");
        std::fs::write(&path, "medium: clay\n\n# Cast").unwrap();
        let mut overrides = Metadata::default();
        overrides.insert("medium", "bronze").unwrap();
        let d = Document::load_with_overrides(&path, &overrides).unwrap();
        assert_eq!(d.metadata.get("medium"), Some("bronze"));
    }

    #[test]
    fn load_html_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("page.html");
        std::fs::write(&path, "<h1>Page</h1>\n<p><img src=\"p.png\"></p>").unwrap();
        let d = Document::load(&path).unwrap();
        assert_eq!(d.title(), Some("Page"));
        assert_eq!(d.headline_src(), Some("p.png"));
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "# Notes").unwrap();
        assert!(matches!(
            Document::load(&path),
            Err(DocumentError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn load_rejects_invalid_date_prefix() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("2021-13-01 thing.md");
        std::fs::write(&path, "# Thing").unwrap();
        assert!(matches!(Document::load(&path), Err(DocumentError::Slug(_))));
    }

    #[test]
    fn parse_fragment_helper_agrees_with_document() {
        let d = doc("<p><img src=\"a.png\"></p>");
        let nodes = parse_fragment(&d.inner_html());
        assert_eq!(nodes, d.root.children);
    }
}
