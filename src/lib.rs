//! # Folio
//!
//! A static site generator for an artist's portfolio. The filesystem is the
//! data source: every directory under `projects/` or `pieces/` is a
//! resource, its Markdown description becomes a page, and its files are
//! copied beside it.
//!
//! # Architecture
//!
//! ```text
//! source/projects/bronze-cast/          Resource      (resource)
//!   index.md  ──render──►  Document     markup tree   (markdown, markup)
//!                            │          metadata      (metadata)
//!                            │          headline      (document)
//!                            ▼
//!   Renderer::page  ──►  generated/projects/bronze-cast/index.html
//!                        + assets, .webp variants    (generate, imaging, sync)
//! ```
//!
//! A resource without a description still gets a page: one is synthesized
//! from its representative image and its name.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`slug`] | URL slugs and `YYYY-MM-DD` name prefixes |
//! | [`markup`] | Owned element tree: attributes, classes, serialization, fragment parsing |
//! | [`markdown`] | Markdown (plus front matter and `{.class}` attribute lists) to a markup tree |
//! | [`metadata`] | Typed front matter and its precedence rules |
//! | [`document`] | A rendered description: title, headline image, URL rewriting, dependencies |
//! | [`resource`] | Pieces and projects: assets, description lookup and synthesis, absolute URLs |
//! | [`imaging`] | Image probing (`is_wide`) and WebP encoding behind a backend trait |
//! | [`config`] | `config.toml` loading, validation, merging, path resolution |
//! | [`render`] | HTML templates for resource pages, galleries and the homepage (Maud) |
//! | [`sync`] | Timestamp-based copying of assets and static paths |
//! | [`generate`] | Site assembly and the scan manifest |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Lazily Resolved, Frozen Resources
//!
//! A [`resource::Resource`] computes its asset list, description path and
//! description on first access and keeps the result, failures included. The
//! site builder shares resources across rayon workers; each value is computed
//! once no matter which worker asks first.
//!
//! ## Owned Markup Tree
//!
//! Rendered Markdown is kept as an owned element tree rather than a string,
//! so the headline image can be found, tagged and copied, and URLs rewritten,
//! without re-parsing HTML.

pub mod config;
pub mod document;
pub mod generate;
pub mod imaging;
pub mod markdown;
pub mod markup;
pub mod metadata;
pub mod output;
pub mod render;
pub mod resource;
pub mod slug;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_helpers;
