//! HTML templates.
//!
//! The site builder talks to templates through the [`Renderer`] trait: one
//! method per page type, each taking a small context struct and returning the
//! finished HTML. [`MaudRenderer`] is the built-in implementation, using
//! [maud](https://maud.lambda.xyz/) for compile-time templating with
//! automatic escaping. Markup that is already HTML (the rendered description,
//! the headline image) is inserted with `PreEscaped`.
//!
//! ## Pages
//!
//! - **Resource page** (`/{directory}/{slug}/index.html`): the description
//! - **Gallery** (`/{directory}/index.html`): one card per resource
//! - **Homepage** (`/index.html`): the newest cards across both kinds

use crate::resource::ResourceKind;
use chrono::NaiveDate;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::Serialize;

/// Values shared by every page.
#[derive(Debug, Clone, Copy)]
pub struct SiteContext<'a> {
    pub title: &'a str,
    pub stylesheets: &'a [String],
}

/// Everything a resource page template receives.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub kind: ResourceKind,
    pub title: &'a str,
    pub description_html: &'a str,
    /// The serialized primary image, for templates that place it separately.
    pub headline_html: Option<&'a str>,
    /// Absolute site path of the primary image.
    pub headline_src: Option<&'a str>,
}

/// One card on a gallery or the homepage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub kind: ResourceKind,
    pub slug: String,
    pub link: String,
    pub title: String,
    pub image_src: Option<String>,
    pub wide: bool,
    pub date: Option<NaiveDate>,
}

/// Template seam between the site builder and HTML.
pub trait Renderer: Sync {
    fn page(&self, site: &SiteContext, page: &PageContext) -> String;
    fn gallery(&self, site: &SiteContext, kind: ResourceKind, items: &[GalleryItem]) -> String;
    fn homepage(&self, site: &SiteContext, items: &[GalleryItem]) -> String;
}

/// Minimal layout rules so a site without stylesheets still reads well.
const BASE_CSS: &str = r#".gallery{display:grid;grid-template-columns:repeat(auto-fill,minmax(16rem,1fr));gap:1rem}
.gallery-item.wide{grid-column:span 2}
.gallery-item img{width:100%;height:auto;display:block}
img.wide{width:100%}"#;

#[derive(Debug, Default, Clone, Copy)]
pub struct MaudRenderer;

impl MaudRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for MaudRenderer {
    fn page(&self, site: &SiteContext, page: &PageContext) -> String {
        let head_extra = html! {
            @if let Some(src) = page.headline_src {
                meta property="og:image" content=(src);
                link rel="preload" as="image" href=(src);
            }
            meta property="og:title" content=(page.title);
        };
        let content = html! {
            main class={ "resource-page " (page.kind) } {
                article.description {
                    (PreEscaped(page.description_html))
                }
            }
        };
        base_document(site, page.title, head_extra, content).into_string()
    }

    fn gallery(&self, site: &SiteContext, kind: ResourceKind, items: &[GalleryItem]) -> String {
        let content = html! {
            main class={ "gallery-page " (kind.directory()) } {
                h1 { (kind.label()) }
                (gallery_grid(items))
            }
        };
        base_document(site, kind.label(), html! {}, content).into_string()
    }

    fn homepage(&self, site: &SiteContext, items: &[GalleryItem]) -> String {
        let content = html! {
            main.homepage {
                h1 { (site.title) }
                (gallery_grid(items))
            }
        };
        base_document(site, site.title, html! {}, content).into_string()
    }
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(site: &SiteContext, title: &str, head_extra: Markup, content: Markup) -> Markup {
    let full_title = if title == site.title {
        title.to_string()
    } else {
        format!("{} - {}", title, site.title)
    };
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (full_title) }
                style { (PreEscaped(BASE_CSS)) }
                @for href in site.stylesheets {
                    link rel="stylesheet" href=(href);
                }
                (head_extra)
            }
            body {
                (site_header(site))
                (content)
            }
        }
    }
}

/// Renders the site header with links to both galleries
fn site_header(site: &SiteContext) -> Markup {
    html! {
        header.site-header {
            a.site-title href="/" { (site.title) }
            nav.site-nav {
                ul {
                    @for kind in ResourceKind::ALL {
                        li {
                            a href={ "/" (kind.directory()) "/" } { (kind.label()) }
                        }
                    }
                }
            }
        }
    }
}

fn gallery_grid(items: &[GalleryItem]) -> Markup {
    html! {
        ul.gallery {
            @for item in items {
                li.gallery-item.wide[item.wide] {
                    a href=(item.link) {
                        @if let Some(src) = &item.image_src {
                            img src=(src) alt=(item.title) loading="lazy";
                        }
                        span.gallery-title { (item.title) }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> (String, Vec<String>) {
        ("Studio".to_string(), vec!["/style/main.css".to_string()])
    }

    fn item(slug: &str, wide: bool) -> GalleryItem {
        GalleryItem {
            kind: ResourceKind::Piece,
            slug: slug.to_string(),
            link: format!("/pieces/{slug}/"),
            title: format!("Title {slug}"),
            image_src: Some(format!("/pieces/{slug}/{slug}.jpg")),
            wide,
            date: None,
        }
    }

    #[test]
    fn page_embeds_description_unescaped() {
        let (title, sheets) = site();
        let ctx = SiteContext {
            title: &title,
            stylesheets: &sheets,
        };
        let html = MaudRenderer::new().page(
            &ctx,
            &PageContext {
                kind: ResourceKind::Project,
                title: "Cast <1>",
                description_html: "<p><img src=\"a.jpg\" /></p>\n<h1>Cast</h1>",
                headline_html: Some("<img class=\"headline\" src=\"a.jpg\" />"),
                headline_src: Some("/projects/cast/a.jpg"),
            },
        );
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>Cast</h1>"));
        assert!(html.contains("<title>Cast &lt;1&gt; - Studio</title>"));
        assert!(html.contains(r#"<meta property="og:image" content="/projects/cast/a.jpg">"#));
        assert!(html.contains(r#"<link rel="stylesheet" href="/style/main.css">"#));
        // headline is preview metadata, not a second copy of the image
        assert_eq!(html.matches("<img").count(), 1);
    }

    #[test]
    fn page_without_headline_has_no_og_image() {
        let (title, sheets) = site();
        let ctx = SiteContext {
            title: &title,
            stylesheets: &sheets,
        };
        let html = MaudRenderer::new().page(
            &ctx,
            &PageContext {
                kind: ResourceKind::Piece,
                title: "Bowl",
                description_html: "<h1>Bowl</h1>",
                headline_html: None,
                headline_src: None,
            },
        );
        assert!(!html.contains("og:image"));
        assert!(html.contains("resource-page piece"));
    }

    #[test]
    fn gallery_marks_wide_items() {
        let (title, sheets) = site();
        let ctx = SiteContext {
            title: &title,
            stylesheets: &sheets,
        };
        let html = MaudRenderer::new().gallery(
            &ctx,
            ResourceKind::Piece,
            &[item("a", true), item("b", false)],
        );
        assert!(html.contains(r#"<li class="gallery-item wide">"#));
        assert!(html.contains(r#"<li class="gallery-item">"#));
        assert!(html.contains(r#"href="/pieces/a/""#));
        assert!(html.contains(r#"src="/pieces/b/b.jpg""#));
        assert!(html.contains("<h1>Pieces</h1>"));
    }

    #[test]
    fn gallery_item_without_image() {
        let (title, sheets) = site();
        let ctx = SiteContext {
            title: &title,
            stylesheets: &sheets,
        };
        let mut bare = item("c", false);
        bare.image_src = None;
        let html = MaudRenderer::new().gallery(&ctx, ResourceKind::Piece, &[bare]);
        assert!(html.contains("Title c"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn homepage_uses_site_title() {
        let (title, sheets) = site();
        let ctx = SiteContext {
            title: &title,
            stylesheets: &sheets,
        };
        let html = MaudRenderer::new().homepage(&ctx, &[item("a", false)]);
        assert!(html.contains("<title>Studio</title>"));
        assert!(html.contains("<h1>Studio</h1>"));
        assert!(html.contains(r#"href="/projects/""#));
    }
}
