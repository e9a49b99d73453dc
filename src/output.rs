//! CLI output formatting for `build` and `scan`.
//!
//! # Information-First Display
//!
//! Every resource is shown by its semantic identity (positional index and
//! title) with filesystem paths as indented context lines, so the output
//! reads as a content inventory.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Projects
//! 001 Bronze Cast (3 assets)
//!     Source: bronze-cast/index.md
//!     Headline: bronze-cast.jpg
//! 002 frame (1 asset)
//!     Source: frame/ (synthesized)
//!
//! Pieces
//! 001 bowl
//!     Error: Nothing to publish in pieces/!!!
//! ```
//!
//! ## Build
//!
//! ```text
//! Projects
//! 001 Bronze Cast → projects/bronze-cast/index.html
//!     Assets: 2 copied, 1 encoded
//!
//! Galleries
//!     projects/index.html
//!     pieces/index.html
//! Home → index.html
//! Static: 4 files
//!
//! Failures
//!     piece !!!: Nothing to publish in ...
//!
//! Built 1 page, 2 galleries, 1 failure
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::generate::{BuildReport, ScanManifest};
use crate::resource::ResourceKind;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn count(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

/// `path` relative to `root` when it lives under it.
fn display_relative(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Scan
// ============================================================================

pub fn format_scan_output(manifest: &ScanManifest) -> Vec<String> {
    let mut lines = Vec::new();
    for kind in ResourceKind::ALL {
        let entries: Vec<_> = manifest.resources.iter().filter(|e| e.kind == kind).collect();
        if entries.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(kind.label().to_string());
        for (i, entry) in entries.iter().enumerate() {
            let header = match entry.assets.len() {
                0 => format!("{} {}", format_index(i + 1), entry.title),
                n => format!("{} {} ({})", format_index(i + 1), entry.title, count(n, "asset", "assets")),
            };
            lines.push(header);
            let dir = entry.path.parent().unwrap_or(&entry.path);
            match &entry.description_path {
                Some(path) => lines.push(format!(
                    "{}Source: {}",
                    indent(1),
                    display_relative(path, dir)
                )),
                None => lines.push(format!(
                    "{}Source: {}/ (synthesized)",
                    indent(1),
                    display_relative(&entry.path, dir)
                )),
            }
            if let Some(date) = entry.date {
                lines.push(format!("{}Date: {}", indent(1), date));
            }
            if let Some(headline) = &entry.headline {
                lines.push(format!("{}Headline: {}", indent(1), headline));
            }
            if let Some(error) = &entry.error {
                lines.push(format!("{}Error: {}", indent(1), error));
            }
        }
    }
    if lines.is_empty() {
        lines.push("No resources found".to_string());
    }
    lines
}

pub fn print_scan_output(manifest: &ScanManifest) {
    for line in format_scan_output(manifest) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_output(report: &BuildReport, output_root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for kind in ResourceKind::ALL {
        let pages: Vec<_> = report.pages.iter().filter(|p| p.kind == kind).collect();
        if pages.is_empty() {
            continue;
        }
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(kind.label().to_string());
        for (i, page) in pages.iter().enumerate() {
            lines.push(format!(
                "{} {} → {}",
                format_index(i + 1),
                page.title,
                display_relative(&page.output, output_root)
            ));
            if page.assets_copied > 0 || page.variants_encoded > 0 {
                lines.push(format!(
                    "{}Assets: {} copied, {} encoded",
                    indent(1),
                    page.assets_copied,
                    page.variants_encoded
                ));
            }
        }
    }

    if !report.galleries.is_empty() {
        lines.push(String::new());
        lines.push("Galleries".to_string());
        for (_, path) in &report.galleries {
            lines.push(format!("{}{}", indent(1), display_relative(path, output_root)));
        }
    }
    if let Some(home) = &report.homepage {
        lines.push(format!("Home → {}", display_relative(home, output_root)));
    }
    if report.static_files > 0 {
        lines.push(format!("Static: {}", count(report.static_files, "file", "files")));
    }

    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push("Failures".to_string());
        for failure in &report.failures {
            lines.push(format!(
                "{}{} {}: {}",
                indent(1),
                failure.kind,
                failure
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                failure.message
            ));
        }
    }

    lines.push(String::new());
    let mut summary = format!(
        "Built {}, {}",
        count(report.pages.len(), "page", "pages"),
        count(report.galleries.len(), "gallery", "galleries")
    );
    if !report.failures.is_empty() {
        summary.push_str(&format!(", {}", count(report.failures.len(), "failure", "failures")));
    }
    lines.push(summary);
    lines
}

pub fn print_build_output(report: &BuildReport, output_root: &Path) {
    for line in format_build_output(report, output_root) {
        println!("{}", line);
    }
}
