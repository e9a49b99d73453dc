//! Slug and date-prefix parsing for document and resource names.
//!
//! Every published URL segment is a slug: lower-case alphanumerics joined by
//! single hyphens. Source names may also carry an ISO date prefix, which is
//! how pieces and projects get a publication date without front matter:
//!
//! - `A (Normal) Title.` → `a-normal-title`
//! - `2000-01-01 A Title` → `a-title`, dated 2000-01-01
//! - `2019-06-30_bronze-cast.md` → `bronze-cast`, dated 2019-06-30
//! - `No Date Here` → `no-date-here`, undated

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SlugError {
    #[error("Invalid date prefix '{prefix}': {source}")]
    InvalidDate {
        prefix: String,
        source: chrono::ParseError,
    },
}

/// `YYYY-MM-DD` at the start of a name, plus any separators that follow it.
static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<date>[0-9]{4}-[0-9]{2}-[0-9]{2})[-_ ]*").expect("date prefix pattern is valid")
});

/// Convert a title or filename into a URL-safe slug.
///
/// The input is lower-cased, every run of non-alphanumeric characters becomes
/// a single hyphen, and leading/trailing hyphens are stripped. Applying it to
/// its own output is a no-op.
pub fn sluggify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_dash = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Split an optional leading ISO date off a name and sluggify the rest.
///
/// Fails only when the name starts with something shaped like a date that is
/// not a real calendar day (`2021-13-01`).
pub fn get_slug_and_optional_date(name: &str) -> Result<(String, Option<NaiveDate>), SlugError> {
    let Some(caps) = DATE_PREFIX.captures(name) else {
        return Ok((sluggify(name), None));
    };
    let prefix = &caps["date"];
    let date = NaiveDate::parse_from_str(prefix, "%Y-%m-%d").map_err(|source| {
        SlugError::InvalidDate {
            prefix: prefix.to_string(),
            source,
        }
    })?;
    let rest = &name[caps.get(0).map_or(0, |m| m.end())..];
    Ok((sluggify(rest), Some(date)))
}
