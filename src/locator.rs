// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Locator record loading.
//!
//! A __locator record__ is one entry of the input list that names a remote
//! repository to fetch. The input list is owned by whoever maintains the
//! project metadata, so only the URL field is required. Every other field is
//! carried along untouched or ignored.
//!
//! # Input Formats
//!
//! Two input formats are understood:
//!
//! 1. JSON array of objects. The repository URL is read from the configured
//!    URL field, "github_url" by default, with "url" accepted as a fallback.
//!    An optional "name" field gives the record a display name.
//! 2. Plain text with a ".txt" extension. Each non-blank line that does not
//!    start with "#" is one repository URL.

use serde_json::{Map, Value};
use std::{
    fs::read_to_string,
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// One entry of the input list.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct LocatorRecord {
    /// Raw remote repository URL, exactly as it appears in the input.
    pub url: String,

    /// Optional display name of the project.
    pub name: Option<String>,
}

impl LocatorRecord {
    /// Construct new locator record from raw URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
        }
    }

    /// Attach display name to locator record.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label to use for this record in logs.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.url.as_str())
    }
}

/// Loader of locator records from an input file.
#[derive(Debug, Clone)]
pub struct LocatorList {
    url_field: String,
}

impl LocatorList {
    /// Construct new loader that reads URLs from target JSON field.
    pub fn new(url_field: impl Into<String>) -> Self {
        Self {
            url_field: url_field.into(),
        }
    }

    /// Load every locator record of input file in order.
    ///
    /// # Errors
    ///
    /// - Return [`LocatorError::Read`] if input file cannot be read.
    /// - Return [`LocatorError::Parse`] if input file is not valid JSON.
    /// - Return [`LocatorError::NotAList`] if JSON document is not an array.
    #[instrument(skip(self, path), level = "debug")]
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<LocatorRecord>> {
        let path = path.as_ref();
        debug!("load locator records from {:?}", path.display());
        let data = read_to_string(path).map_err(|source| LocatorError::Read {
            source,
            path: path.into(),
        })?;

        let is_text = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
        if is_text {
            Ok(self.parse_text(&data))
        } else {
            self.parse_json(&data)
        }
    }

    /// Parse locator records from plain text, one URL per line.
    pub fn parse_text(&self, data: &str) -> Vec<LocatorRecord> {
        data.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(LocatorRecord::new)
            .collect()
    }

    /// Parse locator records from a JSON array.
    ///
    /// Array entries that are neither objects nor strings still yield a
    /// record. Its URL is the raw JSON text of the entry, which then fails
    /// normalization like any other malformed URL.
    ///
    /// # Errors
    ///
    /// - Return [`LocatorError::Parse`] if data is not valid JSON.
    /// - Return [`LocatorError::NotAList`] if JSON document is not an array.
    pub fn parse_json(&self, data: &str) -> Result<Vec<LocatorRecord>> {
        let document: Value = serde_json::from_str(data)?;
        let Value::Array(entries) = document else {
            return Err(LocatorError::NotAList);
        };

        let records = entries
            .into_iter()
            .map(|entry| match entry {
                Value::Object(fields) => self.record_from_fields(&fields),
                Value::String(url) => LocatorRecord::new(url),
                other => LocatorRecord::new(other.to_string()),
            })
            .collect();

        Ok(records)
    }

    // INVARIANT: A record without a usable URL field still yields a record.
    //   - Its empty URL fails normalization later as a per-record failure.
    fn record_from_fields(&self, fields: &Map<String, Value>) -> LocatorRecord {
        let url = [self.url_field.as_str(), "url"]
            .into_iter()
            .find_map(|key| fields.get(key).and_then(Value::as_str))
            .unwrap_or_default();
        let name = fields
            .get("name")
            .and_then(Value::as_str)
            .map(ToString::to_string);

        LocatorRecord {
            url: url.to_string(),
            name,
        }
    }
}

impl Default for LocatorList {
    fn default() -> Self {
        Self::new("github_url")
    }
}

/// Locator loading error types.
#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    /// Input file cannot be read.
    #[error("failed to read input list {path:?}")]
    Read { source: io::Error, path: PathBuf },

    /// Input file is not valid JSON.
    #[error("failed to parse input list")]
    Parse(#[from] serde_json::Error),

    /// Input document is not a list.
    #[error("input list must be a JSON array of locator records")]
    NotAList,
}

/// Friendly result alias :3
type Result<T, E = LocatorError> = std::result::Result<T, E>;
