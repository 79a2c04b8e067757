// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Fetch backend that shells out to the git binary.
//!
//! Useful when libgit2 lacks something the system git supports, e.g., a
//! custom credential helper or transport. The access token, if any, is
//! placed in the userinfo of https remotes. Git is never allowed to prompt
//! for anything.

use crate::{
    config::FetchSettings,
    fetch::{scrub_token, FetchError, Fetcher},
};

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;
use tracing::{debug, instrument};
use url::Url;

/// Fetch remote repositories through the git binary.
#[derive(Debug, Clone)]
pub struct GitCliFetcher {
    program: OsString,
    depth: u32,
    timeout: Option<Duration>,
    token: Option<String>,
}

impl GitCliFetcher {
    /// Construct new git binary fetcher.
    ///
    /// A depth of zero fetches full history.
    pub fn new(depth: u32, timeout: Option<Duration>, token: Option<String>) -> Self {
        Self {
            program: "git".into(),
            depth,
            timeout,
            token,
        }
    }

    /// Construct new git binary fetcher from settings.
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self::new(settings.fetch.depth, settings.timeout(), settings.token())
    }

    /// Use target program instead of "git" found through `$PATH`.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn expand_bin_args(&self, url: &str, destination: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["clone".into(), "--quiet".into()];
        if self.depth > 0 {
            args.extend(["--depth".into(), self.depth.to_string().into()]);
        }
        args.push(self.authenticated(url).into());
        args.push(destination.into());

        args
    }

    fn authenticated(&self, url: &str) -> String {
        let Some(token) = self.token.as_deref() else {
            return url.to_string();
        };

        match Url::parse(url) {
            Ok(mut remote) if remote.scheme() == "https" && remote.username().is_empty() => {
                match remote.set_username(token) {
                    Ok(()) => remote.into(),
                    Err(()) => url.to_string(),
                }
            }
            _ => url.to_string(),
        }
    }
}

impl Fetcher for GitCliFetcher {
    #[instrument(skip(self, destination), level = "debug")]
    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        debug!("clone {url} through {:?}", self.program);
        let args = self.expand_bin_args(url, destination);
        let message = syscall_non_interactive(&self.program, args, self.timeout)
            .await
            .map_err(|err| match err {
                FetchError::Command { status, message } => FetchError::Command {
                    status,
                    message: scrub_token(message, self.token.as_deref()),
                },
                err => err,
            })?;

        if !message.is_empty() {
            debug!("{}", scrub_token(message, self.token.as_deref()));
        }

        Ok(())
    }
}

async fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    timeout: Option<Duration>,
) -> Result<String, FetchError> {
    // INVARIANT: Never block on a credential prompt.
    let child = Command::new(cmd.as_ref())
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child)
            .await
            .map_err(|_| FetchError::TimedOut(limit))??,
        None => child.await?,
    };

    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message.trim_end().to_string();

    if !output.status.success() {
        return Err(FetchError::Command {
            status: output.status,
            message,
        });
    }

    Ok(message)
}
