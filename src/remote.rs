// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote repository URL normalization.
//!
//! Locator records come from hand-maintained metadata, so the URLs they carry
//! are rarely in one consistent shape. Some point at a file inside the
//! repository, some lack a scheme, some use the SSH shorthand, and some carry
//! a stray ".git" suffix. Before anything is fetched, each URL is reduced to
//! the canonical `https://<host>/<owner>/<repo>` form, or rejected outright.
//!
//! # Accepted Forms
//!
//! - `https://host/owner/repo`, optionally followed by a trailing slash, a
//!   ".git" suffix, or extra path like `/tree/main/src`.
//! - `http://host/owner/repo`, upgraded to https.
//! - `//host/owner/repo` and `host/owner/repo`.
//! - `git@host:owner/repo.git`.

use std::fmt::{Display, Formatter, Result as FmtResult};
use url::Url;

const MAX_OWNER_LEN: usize = 39;
const MAX_REPO_LEN: usize = 100;
const GIT_SUFFIXES: [&str; 5] = [".git", ".gitcd", ".github", ".gitignore", ".gitmodules"];

/// Normalized remote repository URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoUrl {
    host: String,
    owner: String,
    name: String,
}

impl RepoUrl {
    /// Parse and normalize raw repository URL.
    ///
    /// The host of the URL must be listed in `hosts`, compared without regard
    /// to case. An empty host listing accepts any host.
    ///
    /// # Errors
    ///
    /// - Return [`UrlError::Empty`] if raw URL is blank.
    /// - Return [`UrlError::Parse`] if raw URL is not a URL at all.
    /// - Return [`UrlError::Scheme`] if scheme is neither http nor https.
    /// - Return [`UrlError::Host`] if host is not allowed.
    /// - Return [`UrlError::MissingPath`] if owner or repository is missing.
    /// - Return [`UrlError::InvalidOwner`] or [`UrlError::InvalidRepo`] if
    ///   either path component breaks naming rules.
    pub fn parse(raw: impl AsRef<str>, hosts: &[impl AsRef<str>]) -> Result<Self> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(UrlError::Empty);
        }

        let url = Url::parse(&with_scheme(raw)).map_err(|source| UrlError::Parse {
            url: raw.into(),
            source,
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(UrlError::Scheme(url.scheme().into()));
        }

        let host = url
            .host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| UrlError::MissingPath(raw.into()))?;
        if !hosts.is_empty()
            && !hosts
                .iter()
                .any(|allowed| allowed.as_ref().eq_ignore_ascii_case(&host))
        {
            return Err(UrlError::Host(host));
        }

        let mut segments = url
            .path_segments()
            .map(|segments| segments.filter(|segment| !segment.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();
        let (owner, repo) = match (segments.next(), segments.next()) {
            (Some(owner), Some(repo)) => (owner.to_string(), strip_git_suffixes(repo)),
            _ => return Err(UrlError::MissingPath(raw.into())),
        };

        if !is_valid_name(&owner, MAX_OWNER_LEN, false) {
            return Err(UrlError::InvalidOwner(owner));
        }

        if !is_valid_name(&repo, MAX_REPO_LEN, true) {
            return Err(UrlError::InvalidRepo(repo));
        }

        Ok(Self {
            host,
            owner,
            name: repo,
        })
    }

    /// Host the repository lives on.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Owner of the repository.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Project name, i.e., the final path segment of the normalized URL.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if both URLs name the same repository.
    ///
    /// Owner and project names are compared without regard to ASCII case,
    /// since hosting services treat them that way.
    pub fn same_repository(&self, other: &RepoUrl) -> bool {
        self.host == other.host
            && self.owner.eq_ignore_ascii_case(&other.owner)
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Display for RepoUrl {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "https://{}/{}/{}", self.host, self.owner, self.name)
    }
}

fn with_scheme(raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix("git@") {
        // INVARIANT: SSH shorthand separates host from path with a colon.
        return match rest.split_once(':') {
            Some((host, path)) => format!("https://{host}/{path}"),
            None => format!("https://{rest}"),
        };
    }

    if raw.starts_with("//") {
        format!("https:{raw}")
    } else if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    }
}

fn strip_git_suffixes(repo: &str) -> String {
    let mut repo = repo;
    for suffix in GIT_SUFFIXES {
        if let Some(stripped) = repo.strip_suffix(suffix) {
            repo = stripped;
        }
    }

    repo.to_string()
}

fn is_valid_name(name: &str, max_len: usize, allow_dot: bool) -> bool {
    let valid_inner =
        |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_') || (allow_dot && c == '.');
    let starts_and_ends_alnum = name.starts_with(|c: char| c.is_ascii_alphanumeric())
        && name.ends_with(|c: char| c.is_ascii_alphanumeric());

    name.len() <= max_len && starts_and_ends_alnum && name.chars().all(valid_inner)
}

/// URL normalization error types.
#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    /// Repository URL is blank.
    #[error("repository url is empty")]
    Empty,

    /// Repository URL cannot be parsed.
    #[error("malformed repository url {url:?}")]
    Parse { url: String, source: url::ParseError },

    /// Repository URL uses unsupported scheme.
    #[error("unsupported url scheme {0:?}")]
    Scheme(String),

    /// Repository URL points at host that is not allowed.
    #[error("host {0:?} is not an allowed repository host")]
    Host(String),

    /// Repository URL lacks owner or repository component.
    #[error("repository url {0:?} does not name an owner and repository")]
    MissingPath(String),

    /// Owner component breaks naming rules.
    #[error("invalid repository owner {0:?}")]
    InvalidOwner(String),

    /// Repository component breaks naming rules.
    #[error("invalid repository name {0:?}")]
    InvalidRepo(String),
}

/// Friendly result alias :3
type Result<T, E = UrlError> = std::result::Result<T, E>;
