// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Fetch outcomes and failure bookkeeping.
//!
//! Every locator record of a run produces exactly one [`FetchOutcome`]. The
//! outcomes are collected in record order into a [`FetchReport`]. Failed
//! outcomes are also appended to a plain-text [`FailureLog`] so a human can
//! retry them later.

use serde::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

/// Recorded result of one fetch job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FetchOutcome {
    /// Remote repository is present in its destination directory.
    Succeeded {
        /// Original URL of the locator record.
        url: String,

        /// Directory name under the output root.
        directory: String,

        /// Destination already existed, so nothing was fetched.
        reused: bool,
    },

    /// Remote repository could not be fetched.
    Failed {
        /// Original URL of the locator record.
        url: String,

        /// Summary of what went wrong.
        error: String,
    },
}

impl FetchOutcome {
    /// Original URL of the locator record.
    pub fn url(&self) -> &str {
        match self {
            Self::Succeeded { url, .. } | Self::Failed { url, .. } => url,
        }
    }

    /// Check if outcome is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Outcomes of one bulk fetch run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FetchReport {
    outcomes: Vec<FetchOutcome>,
    failure_log: PathBuf,
}

impl FetchReport {
    /// Construct new empty report whose failures go to target failure log.
    pub fn new(failure_log: impl Into<PathBuf>) -> Self {
        Self {
            outcomes: Vec::new(),
            failure_log: failure_log.into(),
        }
    }

    pub(crate) fn push(&mut self, outcome: FetchOutcome) {
        self.outcomes.push(outcome);
    }

    /// All outcomes in record order.
    pub fn outcomes(&self) -> &[FetchOutcome] {
        &self.outcomes
    }

    /// Number of successful outcomes.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed outcomes.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Path to failure log of the run.
    pub fn failure_log(&self) -> &Path {
        &self.failure_log
    }

    /// Write report to target path as pretty JSON.
    ///
    /// # Errors
    ///
    /// - Return [`ReportError::Write`] if report file cannot be written.
    /// - Return [`ReportError::Serialize`] if report cannot be serialized.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref()).map_err(|source| ReportError::Write {
            source,
            path: path.as_ref().into(),
        })?;
        serde_json::to_writer_pretty(file, self)?;

        Ok(())
    }
}

/// Append-only log of failed locator records.
///
/// The log file is only created once the first failure gets recorded. Thus,
/// a run without failures never touches the file system through this log.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    file: Option<File>,
}

impl FailureLog {
    /// Construct new failure log at target path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// Path to failure log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append line for failed locator record.
    ///
    /// Each line has the form `<url>\t<error>`. The error summary is folded
    /// onto a single line.
    ///
    /// # Errors
    ///
    /// - Return [`ReportError::Write`] if failure log cannot be opened or
    ///   written.
    pub fn append(&mut self, url: &str, error: &str) -> Result<()> {
        let line = format!("{}\t{}\n", url.trim(), single_line(error));
        let write_err = |source: io::Error| ReportError::Write {
            source,
            path: self.path.clone(),
        };

        let file = match self.file.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(write_err)?,
        };
        let file = self.file.insert(file);

        file.write_all(line.as_bytes()).map_err(write_err)?;
        file.flush().map_err(write_err)?;

        Ok(())
    }
}

fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Report error types.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// File cannot be written.
    #[error("failed to write {path:?}")]
    Write { source: io::Error, path: PathBuf },

    /// Report cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

/// Friendly result alias :3
type Result<T, E = ReportError> = std::result::Result<T, E>;
