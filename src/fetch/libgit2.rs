// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Fetch backend built on libgit2.
//!
//! Clones run on a blocking worker thread, because libgit2 blocks the caller
//! for the entire transfer. Credentials come from [`GitAuthenticator`], which
//! consults the git credential helper, the SSH agent, and the access token
//! from the environment if one was supplied. The user is never prompted, since
//! a bulk run is expected to work unattended.

use crate::{
    config::FetchSettings,
    fetch::{scrub_token, FetchError, Fetcher},
};

use auth_git2::GitAuthenticator;
use git2::{build::RepoBuilder, Config, FetchOptions, RemoteCallbacks};
use std::{
    cell::Cell,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, instrument};
use url::Url;

/// Fetch remote repositories through libgit2.
#[derive(Debug, Clone, Default)]
pub struct Git2Fetcher {
    depth: u32,
    timeout: Option<Duration>,
    token: Option<String>,
}

impl Git2Fetcher {
    /// Construct new libgit2 fetcher.
    ///
    /// A depth of zero fetches full history.
    pub fn new(depth: u32, timeout: Option<Duration>, token: Option<String>) -> Self {
        Self {
            depth,
            timeout,
            token,
        }
    }

    /// Construct new libgit2 fetcher from settings.
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self::new(settings.fetch.depth, settings.timeout(), settings.token())
    }

    fn authenticator(&self, url: &str) -> GitAuthenticator {
        let authenticator = GitAuthenticator::default().try_password_prompt(0);
        let host = Url::parse(url)
            .ok()
            .and_then(|url| url.host_str().map(ToString::to_string));

        match (&self.token, host) {
            (Some(token), Some(host)) => {
                authenticator.add_plaintext_credentials(host, "x-access-token", token)
            }
            _ => authenticator,
        }
    }

    /// Depth to request from libgit2, if the fetch is shallow.
    fn shallow_depth(&self) -> Option<i32> {
        (self.depth > 0).then(|| i32::try_from(self.depth).unwrap_or(i32::MAX))
    }

    fn fetch_options<'cb>(&self, callbacks: RemoteCallbacks<'cb>) -> FetchOptions<'cb> {
        let mut fo = FetchOptions::new();
        fo.remote_callbacks(callbacks);
        if let Some(depth) = self.shallow_depth() {
            fo.depth(depth);
        }

        fo
    }

    fn clone_blocking(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        let authenticator = self.authenticator(url);
        let config = Config::open_default()?;
        let deadline = Deadline::new(self.timeout);

        // INVARIANT: Returning false from any callback aborts the transfer.
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|_| deadline.check());
        rc.sideband_progress(|_| deadline.check());

        let result = RepoBuilder::new()
            .fetch_options(self.fetch_options(rc))
            .clone(url, destination);

        match result {
            Ok(_) => Ok(()),
            Err(_) if deadline.expired() => {
                Err(FetchError::TimedOut(self.timeout.unwrap_or_default()))
            }
            Err(err) => Err(git2::Error::from_str(&scrub_token(
                err.message(),
                self.token.as_deref(),
            ))
            .into()),
        }
    }
}

/// Transfer deadline of one clone.
///
/// Remembers whether a callback saw the deadline pass, so an abort caused by
/// the deadline can be told apart from any other clone failure.
#[derive(Debug)]
struct Deadline {
    at: Option<Instant>,
    expired: Cell<bool>,
}

impl Deadline {
    fn new(timeout: Option<Duration>) -> Self {
        Self {
            at: timeout.map(|timeout| Instant::now() + timeout),
            expired: Cell::new(false),
        }
    }

    /// Check that the transfer may continue.
    fn check(&self) -> bool {
        if self.at.is_some_and(|at| Instant::now() >= at) {
            self.expired.set(true);
        }

        !self.expired.get()
    }

    fn expired(&self) -> bool {
        self.expired.get()
    }
}

impl Fetcher for Git2Fetcher {
    #[instrument(skip(self, destination), level = "debug")]
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        debug!("clone {url} through libgit2");
        let fetcher = self.clone();
        let url = url.to_string();
        let destination = PathBuf::from(destination);

        tokio::task::spawn_blocking(move || fetcher.clone_blocking(&url, &destination)).await?
    }
}
