// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bulk fetching of remote repositories.
//!
//! Fetch-all reads a list of __locator records__, each naming a remote
//! repository, and materializes every repository under its own directory of
//! an output root. Names that collide get disambiguated, failures get
//! recorded instead of aborting the run, and a report of every outcome is
//! produced at the end.
//!
//! # See Also
//!
//! 1. [`BulkFetcher`]
//! 2. [`FetchSettings`]

pub mod config;
pub mod fetch;
pub mod locator;
pub mod names;
pub mod path;
pub mod remote;
pub mod report;

pub use config::{FetchBackend, FetchSettings};
pub use fetch::{AnyFetcher, BulkError, BulkFetcher, FetchError, FetchJob, Fetcher};
pub use locator::{LocatorList, LocatorRecord};
pub use remote::RepoUrl;
pub use report::{FetchOutcome, FetchReport};
