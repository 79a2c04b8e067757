// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that fetch-all reads to tune a
//! bulk fetch run. File I/O beyond [`FetchSettings::load`] is left to the
//! caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Settings for a bulk fetch run.
///
/// # General Layout
///
/// The settings file is composed of two sections: fetch and input. The fetch
/// section controls how each remote repository gets materialized locally. The
/// input section controls how locator records are read from the input list.
///
/// Every field is optional. Missing fields fall back to their defaults.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Settings for fetching remote repositories.
    pub fetch: FetchSection,

    /// Settings for reading locator records.
    pub input: InputSection,
}

impl FetchSettings {
    /// Load settings from target path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if settings file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if settings file is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            source,
            path: path.as_ref().into(),
        })?;

        data.parse()
    }

    /// Load settings from target path if it exists, defaults otherwise.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Deserialize`] if settings file is invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Per-fetch timeout, if one is set.
    pub fn timeout(&self) -> Option<Duration> {
        match self.fetch.timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Read access token from the environment variable named by settings.
    ///
    /// Empty values are treated as absent.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.fetch.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    /// Resolve failure log path against output directory.
    ///
    /// Relative failure log paths are placed inside the output directory.
    pub fn failure_log_path(&self, output: impl AsRef<Path>) -> PathBuf {
        let log = self.fetch.failure_log.as_path();
        if log.is_absolute() {
            log.to_path_buf()
        } else {
            output.as_ref().join(log)
        }
    }
}

impl FromStr for FetchSettings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: FetchSettings = toml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on failure log field.
        settings.fetch.failure_log = PathBuf::from(
            shellexpand::full(settings.fetch.failure_log.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(settings)
    }
}

impl Display for FetchSettings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Fetch configuration settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSection {
    /// Backend used to fetch repositories.
    pub backend: FetchBackend,

    /// History depth to fetch. Zero means full history.
    pub depth: u32,

    /// Per-fetch timeout in seconds. Zero disables the timeout.
    pub timeout: u64,

    /// Name of environment variable holding an access token.
    pub token_env: String,

    /// Failure log path, relative paths resolve against output directory.
    pub failure_log: PathBuf,

    /// Reuse destinations that already exist instead of fetching them again.
    pub skip_existing: bool,

    /// Hosts that remote repository URLs may point at.
    pub hosts: Vec<String>,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            backend: FetchBackend::default(),
            depth: 1,
            timeout: 600,
            token_env: "GITHUB_TOKEN".into(),
            failure_log: PathBuf::from("clone_failed.txt"),
            skip_existing: true,
            hosts: vec!["github.com".into()],
        }
    }
}

/// Input configuration settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InputSection {
    /// Field of a JSON locator record that holds the repository URL.
    pub url_field: String,
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            url_field: "github_url".into(),
        }
    }
}

/// Backend to fetch remote repositories with.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// Clone through libgit2.
    #[default]
    Libgit2,

    /// Clone through the git binary.
    Git,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings file {path:?}")]
    Read { source: io::Error, path: PathBuf },

    /// Failed to deserialize settings.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize settings.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on settings.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
