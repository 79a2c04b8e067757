// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use fetch_all::{
    config::{FetchBackend, FetchSettings},
    fetch::BulkFetcher,
    path::default_settings_path,
};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Clone every repository listed in a metadata file.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "fetch-all [options] <input-file> <output-directory>",
    version
)]
struct Cli {
    /// JSON list of locator records, or plain text list of URLs.
    #[arg(value_name = "input-file")]
    pub input: PathBuf,

    /// Root directory to place fetched repositories under.
    #[arg(value_name = "output-directory")]
    pub output: PathBuf,

    /// Path to settings file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// History depth to fetch, zero for full history.
    #[arg(short, long, value_name = "n")]
    pub depth: Option<u32>,

    /// Per-fetch timeout in seconds, zero to disable.
    #[arg(short, long, value_name = "secs")]
    pub timeout: Option<u64>,

    /// Backend to fetch repositories with.
    #[arg(short, long, value_enum, value_name = "backend")]
    pub backend: Option<FetchBackend>,

    /// Allowed repository host, replaces configured hosts.
    #[arg(long = "host", value_name = "host")]
    pub hosts: Vec<String>,

    /// Fetch again even if destination directory already exists.
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Write JSON report of every outcome to path.
    #[arg(short, long, value_name = "path")]
    pub report: Option<PathBuf>,

    /// Do not display progress bar.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    fn settings(&self) -> Result<FetchSettings> {
        let mut settings = match &self.config {
            Some(path) => FetchSettings::load(path)?,
            None => match default_settings_path() {
                Ok(path) => FetchSettings::load_or_default(path)?,
                Err(err) => {
                    warn!("{err}, using default settings");
                    FetchSettings::default()
                }
            },
        };

        if let Some(depth) = self.depth {
            settings.fetch.depth = depth;
        }

        if let Some(timeout) = self.timeout {
            settings.fetch.timeout = timeout;
        }

        if let Some(backend) = self.backend {
            settings.fetch.backend = backend;
        }

        if !self.hosts.is_empty() {
            settings.fetch.hosts = self.hosts.clone();
        }

        if self.no_skip_existing {
            settings.fetch.skip_existing = false;
        }

        Ok(settings)
    }

    async fn run(self) -> Result<()> {
        let settings = self.settings()?;
        if settings.token().is_none() {
            info!(
                "no access token in ${}, fetching unauthenticated",
                settings.fetch.token_env
            );
        }

        let bulk = BulkFetcher::from_settings(settings).with_progress(self.progress_bar()?);
        let report = bulk.run_file(&self.input, &self.output).await?;

        info!(
            "fetched {} of {} repositories, {} failed",
            report.succeeded(),
            report.outcomes().len(),
            report.failed()
        );

        if report.failed() > 0 {
            info!("failures logged to {:?}", report.failure_log().display());
        }

        // INVARIANT: A completed run succeeds even if its report cannot be written.
        if let Some(path) = &self.report {
            match report.write_json(path) {
                Ok(()) => info!("report written to {:?}", path.display()),
                Err(err) => error!("{err:?}"),
            }
        }

        Ok(())
    }

    fn progress_bar(&self) -> Result<ProgressBar> {
        if self.quiet {
            return Ok(ProgressBar::hidden());
        }

        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {pos}/{len}",
        )?
        .progress_chars("-Cco.");
        let bar = ProgressBar::new(0).with_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Ok(bar)
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}
