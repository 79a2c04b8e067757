// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bulk fetching of remote repositories.
//!
//! The __bulk fetcher__ takes an ordered list of locator records and a
//! destination root, then materializes each remote repository under its own
//! directory of the destination root. Fetch jobs run one after another. A
//! failing job never stops the run. Instead, its failure is downgraded into a
//! [`FetchOutcome`] and appended to the failure log.
//!
//! # Fetch Jobs
//!
//! Each locator record is resolved into a __fetch job__: the normalized
//! remote URL plus a unique destination directory. The directory name is the
//! project name of the URL, suffixed with `-N` when the same project name was
//! already handed out earlier in the run. See [`NameAllocator`].
//!
//! # Fetch Backends
//!
//! The actual transfer is delegated to a [`Fetcher`]. Two backends exist:
//! [`Git2Fetcher`] clones through libgit2, and [`GitCliFetcher`] shells out to
//! the git binary. Tests can substitute their own fetcher to avoid touching the
//! network.

pub mod command;
pub mod libgit2;

pub use command::GitCliFetcher;
pub use libgit2::Git2Fetcher;

use crate::{
    config::{FetchBackend, FetchSettings},
    locator::{LocatorError, LocatorList, LocatorRecord},
    names::NameAllocator,
    remote::RepoUrl,
    report::{FailureLog, FetchOutcome, FetchReport},
};

use git2::Repository;
use indicatif::ProgressBar;
use std::{
    fs::remove_dir_all,
    future::Future,
    io,
    path::{Component, Path, PathBuf},
    process::ExitStatus,
    time::Duration,
};
use tracing::{debug, error, info, instrument, warn};

/// Capability to fetch one remote repository into a local directory.
pub trait Fetcher {
    /// Fetch remote repository at `url` into `destination`.
    ///
    /// The destination directory must not exist yet, or must be empty.
    fn fetch(&self, url: &str, destination: &Path) -> impl Future<Output = Result<(), FetchError>>;
}

/// Resolved fetch job of one locator record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    /// Normalized remote URL.
    pub url: RepoUrl,

    /// Unique directory name under the destination root.
    pub directory: String,

    /// Full path to the destination directory.
    pub destination: PathBuf,
}

/// Fetch every locator record of a run in order.
#[derive(Debug)]
pub struct BulkFetcher<F>
where
    F: Fetcher,
{
    fetcher: F,
    settings: FetchSettings,
    progress: ProgressBar,
}

impl<F> BulkFetcher<F>
where
    F: Fetcher,
{
    /// Construct new bulk fetcher.
    pub fn new(fetcher: F, settings: FetchSettings) -> Self {
        Self {
            fetcher,
            settings,
            progress: ProgressBar::hidden(),
        }
    }

    /// Fetcher backend in use.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Report progress of each run through target progress bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Load locator records from input file, and fetch all of them.
    ///
    /// # Errors
    ///
    /// - Return [`BulkError::Locator`] if input file cannot be loaded.
    /// - Return [`BulkError::CreateRoot`] if destination root cannot be
    ///   created.
    pub async fn run_file(
        &self,
        input: impl AsRef<Path>,
        destination_root: impl AsRef<Path>,
    ) -> Result<FetchReport, BulkError> {
        let locators = LocatorList::new(&self.settings.input.url_field).load(input)?;
        self.run(&locators, destination_root).await
    }

    /// Fetch all locator records into destination root.
    ///
    /// Produces exactly one outcome per locator record in record order.
    /// Failures of individual records are recorded, never returned.
    ///
    /// # Errors
    ///
    /// - Return [`BulkError::CreateRoot`] if destination root cannot be
    ///   created.
    #[instrument(skip(self, locators, destination_root), level = "debug")]
    pub async fn run(
        &self,
        locators: &[LocatorRecord],
        destination_root: impl AsRef<Path>,
    ) -> Result<FetchReport, BulkError> {
        let root = destination_root.as_ref();

        // INVARIANT: Destination root exists before any fetch is attempted.
        mkdirp::mkdirp(root).map_err(|source| BulkError::CreateRoot {
            source,
            path: root.into(),
        })?;

        let mut run = FetchRun::new(root, self.settings.failure_log_path(root));
        info!(
            "fetch {} repositories into {:?}",
            locators.len(),
            root.display()
        );

        self.progress.set_length(locators.len() as u64);
        for record in locators {
            self.progress.set_message(record.label().to_string());
            let outcome = self.fetch_record(record, root, &mut run).await;
            run.record(record, outcome);
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        Ok(run.report)
    }

    /// Resolve locator record into fetch job.
    ///
    /// # Errors
    ///
    /// - Return [`UrlError`](crate::remote::UrlError) if the URL of the
    ///   locator record cannot be normalized.
    pub fn resolve(
        &self,
        record: &LocatorRecord,
        root: &Path,
        names: &mut NameAllocator,
    ) -> Result<FetchJob, crate::remote::UrlError> {
        let url = RepoUrl::parse(&record.url, &self.settings.fetch.hosts)?;
        let directory = names.allocate(url.name());
        let destination = root.join(&directory);

        Ok(FetchJob {
            url,
            directory,
            destination,
        })
    }

    async fn fetch_record(
        &self,
        record: &LocatorRecord,
        root: &Path,
        run: &mut FetchRun,
    ) -> FetchOutcome {
        // INVARIANT: Malformed URLs never reach the fetcher, or the disk.
        let job = match self.resolve(record, root, &mut run.names) {
            Ok(job) => job,
            Err(err) => {
                return FetchOutcome::Failed {
                    url: record.url.clone(),
                    error: err.to_string(),
                }
            }
        };

        let existed = job.destination.exists();
        if existed && !job.destination.is_dir() {
            return FetchOutcome::Failed {
                url: record.url.clone(),
                error: format!(
                    "destination {:?} exists and is not a directory",
                    job.destination.display()
                ),
            };
        }

        if existed && self.settings.fetch.skip_existing {
            // INVARIANT: Never reuse a clone of some other repository.
            if let Some(origin) = existing_origin(&job.destination) {
                if !origin.same_repository(&job.url) {
                    return FetchOutcome::Failed {
                        url: record.url.clone(),
                        error: format!(
                            "destination {:?} already holds a clone of {origin}",
                            job.destination.display()
                        ),
                    };
                }
            }

            info!("reuse existing {:?}", job.destination.display());
            return FetchOutcome::Succeeded {
                url: record.url.clone(),
                directory: job.directory,
                reused: true,
            };
        }

        info!("fetch {} into {:?}", job.url, job.destination.display());
        match self.fetcher.fetch(&job.url.to_string(), &job.destination).await {
            Ok(()) => {
                debug!("fetched {}", job.url);
                FetchOutcome::Succeeded {
                    url: record.url.clone(),
                    directory: job.directory,
                    reused: false,
                }
            }
            Err(err) => {
                // INVARIANT: Only clean up directories this job created itself.
                if !existed && job.destination.exists() {
                    if let Err(err) = remove_dir_all(&job.destination) {
                        warn!(
                            "cannot remove partial fetch {:?}: {err}",
                            job.destination.display()
                        );
                    }
                }

                FetchOutcome::Failed {
                    url: record.url.clone(),
                    error: err.to_string(),
                }
            }
        }
    }
}

impl BulkFetcher<AnyFetcher> {
    /// Construct new bulk fetcher using the backend selected by settings.
    pub fn from_settings(settings: FetchSettings) -> Self {
        let fetcher = AnyFetcher::from_settings(&settings);
        Self::new(fetcher, settings)
    }
}

/// Normalized origin URL of existing clone at target path, if any.
fn existing_origin(path: &Path) -> Option<RepoUrl> {
    let repo = Repository::open(path).ok()?;
    let origin = repo.find_remote("origin").ok()?;
    let any_host: [&str; 0] = [];

    RepoUrl::parse(origin.url()?, &any_host).ok()
}

/// Bookkeeping state of one run.
struct FetchRun {
    names: NameAllocator,
    failures: FailureLog,
    report: FetchReport,
}

impl FetchRun {
    fn new(root: &Path, failure_log: PathBuf) -> Self {
        let mut names = NameAllocator::new();

        // INVARIANT: No fetch job may claim the path of the failure log.
        if let Some(Component::Normal(entry)) = failure_log
            .strip_prefix(root)
            .ok()
            .and_then(|relative| relative.components().next())
        {
            names.reserve(entry.to_string_lossy());
        }

        Self {
            names,
            report: FetchReport::new(&failure_log),
            failures: FailureLog::new(failure_log),
        }
    }

    fn record(&mut self, record: &LocatorRecord, outcome: FetchOutcome) {
        if let FetchOutcome::Failed { url, error } = &outcome {
            let locator = if url.trim().is_empty() {
                record.label()
            } else {
                url.as_str()
            };

            warn!("failed to fetch {locator}: {error}");
            if let Err(err) = self.failures.append(locator, error) {
                error!("{err:?}");
            }
        }

        self.report.push(outcome);
    }
}

/// Fetcher backend chosen at runtime.
#[derive(Debug, Clone)]
pub enum AnyFetcher {
    /// Clone through libgit2.
    Libgit2(Git2Fetcher),

    /// Clone through the git binary.
    Git(GitCliFetcher),
}

impl AnyFetcher {
    /// Construct backend selected by settings.
    pub fn from_settings(settings: &FetchSettings) -> Self {
        match settings.fetch.backend {
            FetchBackend::Libgit2 => Self::Libgit2(Git2Fetcher::from_settings(settings)),
            FetchBackend::Git => Self::Git(GitCliFetcher::from_settings(settings)),
        }
    }
}

impl Fetcher for AnyFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        match self {
            Self::Libgit2(fetcher) => fetcher.fetch(url, destination).await,
            Self::Git(fetcher) => fetcher.fetch(url, destination).await,
        }
    }
}

/// Replace every occurance of access token in message.
pub(crate) fn scrub_token(message: impl Into<String>, token: Option<&str>) -> String {
    let message = message.into();
    match token {
        Some(token) if !token.is_empty() => message.replace(token, "***"),
        _ => message,
    }
}

/// Failure to fetch one remote repository.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Git binary cannot be run.
    #[error("failed to run git: {0}")]
    Syscall(#[from] io::Error),

    /// Git binary exits unsuccessfully.
    #[error("git clone failed ({status}): {message}")]
    Command { status: ExitStatus, message: String },

    /// Fetch takes longer than allowed.
    #[error("fetch timed out after {0:?}")]
    TimedOut(Duration),

    /// Blocking fetch worker dies.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Fatal failure that aborts a whole run.
#[derive(Debug, thiserror::Error)]
pub enum BulkError {
    /// Destination root cannot be created.
    #[error("cannot create output directory {path:?}")]
    CreateRoot { source: io::Error, path: PathBuf },

    /// Input list cannot be loaded.
    #[error(transparent)]
    Locator(#[from] LocatorError),
}
