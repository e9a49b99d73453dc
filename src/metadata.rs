//! Typed document metadata.
//!
//! Front matter arrives from the Markdown renderer as loosely typed
//! `key → [line, line, ...]` lists. This module turns it into a [`Metadata`]
//! value: a small table of named-key parsers handles the keys with real types
//! (currently `date`), everything else is joined with newlines into `extra`.
//!
//! ## Precedence
//!
//! A document's metadata comes from three layers, merged key by key with the
//! later layer winning:
//!
//! ```text
//! defaults (e.g. date from the filename)  <  front matter  <  overrides
//! ```
//!
//! A value that fails to parse is logged and dropped, so it never shadows a
//! valid value from a lower layer.

use crate::markdown::RawMetadata;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("Invalid date '{value}': {source}")]
    InvalidDate {
        value: String,
        source: chrono::ParseError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub date: Option<NaiveDate>,
    pub extra: BTreeMap<String, String>,
}

type FieldParser = fn(&mut Metadata, &str) -> Result<(), MetadataError>;

/// Keys with a typed representation. Anything not listed lands in `extra`.
const FIELD_PARSERS: &[(&str, FieldParser)] = &[("date", parse_date)];

fn parse_date(metadata: &mut Metadata, value: &str) -> Result<(), MetadataError> {
    let value = value.trim();
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| {
        MetadataError::InvalidDate {
            value: value.to_string(),
            source,
        }
    })?;
    metadata.date = Some(date);
    Ok(())
}

impl Metadata {
    pub fn with_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            ..Self::default()
        }
    }

    /// Build typed metadata from raw front matter, dropping values that fail
    /// to parse (with a warning).
    pub fn from_raw(raw: &RawMetadata) -> Self {
        let mut metadata = Self::default();
        for (key, values) in raw {
            if let Err(e) = metadata.insert(key, &values.join("\n")) {
                log::warn!("Ignoring metadata '{key}': {e}");
            }
        }
        metadata
    }

    /// Set one key, routing it through its typed parser when there is one.
    pub fn insert(&mut self, key: &str, value: &str) -> Result<(), MetadataError> {
        let key = key.to_lowercase();
        match FIELD_PARSERS.iter().find(|(name, _)| *name == key) {
            Some((_, parser)) => parser(self, value),
            None => {
                self.extra.insert(key, value.to_string());
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// Layer `over` on top of `self`: every value present in `over` wins.
    pub fn overlay(mut self, over: &Metadata) -> Metadata {
        if over.date.is_some() {
            self.date = over.date;
        }
        self.extra
            .extend(over.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Merge the three metadata layers, lowest precedence first.
pub fn resolve(defaults: &Metadata, extracted: &Metadata, overrides: &Metadata) -> Metadata {
    defaults.clone().overlay(extracted).overlay(overrides)
}
