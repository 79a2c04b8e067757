// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::FakeFetcher;

use anyhow::Result;
use fetch_all::{BulkError, BulkFetcher, FetchOutcome, FetchSettings, LocatorRecord};
use git2::Repository;
use pretty_assertions::assert_eq;
use std::fs::{self, read_to_string};

fn records(urls: &[&str]) -> Vec<LocatorRecord> {
    urls.iter().copied().map(LocatorRecord::new).collect()
}

fn directories(outcomes: &[FetchOutcome]) -> Vec<Option<String>> {
    outcomes
        .iter()
        .map(|outcome| match outcome {
            FetchOutcome::Succeeded { directory, .. } => Some(directory.clone()),
            FetchOutcome::Failed { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn colliding_project_names_get_distinct_directories() -> Result<()> {
    let out = tempfile::tempdir()?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());
    let locators = records(&["https://github.com/a/repo1", "https://github.com/b/repo1"]);

    let report = bulk.run(&locators, out.path()).await?;

    assert_eq!(report.outcomes().len(), 2);
    assert_eq!(
        directories(report.outcomes()),
        vec![Some("repo1".into()), Some("repo1-1".into())]
    );
    assert_eq!(
        read_to_string(out.path().join("repo1").join("README.md"))?,
        "https://github.com/a/repo1"
    );
    assert_eq!(
        read_to_string(out.path().join("repo1-1").join("README.md"))?,
        "https://github.com/b/repo1"
    );

    Ok(())
}

#[tokio::test]
async fn malformed_url_never_fetched() -> Result<()> {
    let out = tempfile::tempdir()?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let report = bulk.run(&records(&["not-a-url"]), out.path()).await?;

    assert_eq!(report.outcomes().len(), 1);
    assert!(matches!(
        &report.outcomes()[0],
        FetchOutcome::Failed { url, .. } if url == "not-a-url"
    ));

    assert!(bulk.fetcher().calls().is_empty());

    // INVARIANT: Only the failure log exists under the output root.
    let entries = fs::read_dir(out.path())?
        .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(entries, vec!["clone_failed.txt"]);

    let log = read_to_string(report.failure_log())?;
    assert_eq!(log.lines().count(), 1);
    assert!(log.starts_with("not-a-url\t"));

    Ok(())
}

#[tokio::test]
async fn empty_input_yields_empty_report() -> Result<()> {
    let out = tempfile::tempdir()?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let report = bulk.run(&[], out.path()).await?;

    assert!(report.outcomes().is_empty());
    assert!(!report.failure_log().exists());

    Ok(())
}

#[tokio::test]
async fn missing_output_root_gets_created() -> Result<()> {
    let out = tempfile::tempdir()?;
    let root = out.path().join("clients").join("nested");
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let report = bulk
        .run(&records(&["https://github.com/a/repo1"]), &root)
        .await?;

    assert!(root.is_dir());
    assert!(root.join("repo1").is_dir());
    assert_eq!(report.succeeded(), 1);

    Ok(())
}

#[tokio::test]
async fn uncreatable_output_root_is_fatal() -> Result<()> {
    let out = tempfile::tempdir()?;
    let blocker = out.path().join("file");
    fs::write(&blocker, "not a directory")?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let result = bulk
        .run(&records(&["https://github.com/a/repo1"]), blocker.join("root"))
        .await;

    assert!(matches!(result, Err(BulkError::CreateRoot { .. })));
    assert!(bulk.fetcher().calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn failure_does_not_stop_run() -> Result<()> {
    let out = tempfile::tempdir()?;
    let fetcher = FakeFetcher::failing(["https://github.com/b/broken"]);
    let bulk = BulkFetcher::new(fetcher, FetchSettings::default());
    let locators = records(&[
        "https://github.com/a/first",
        "https://github.com/b/broken",
        "not-a-url",
        "https://github.com/c/last",
    ]);

    let report = bulk.run(&locators, out.path()).await?;

    assert_eq!(report.outcomes().len(), locators.len());
    assert_eq!(
        directories(report.outcomes()),
        vec![Some("first".into()), None, None, Some("last".into())]
    );
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 2);

    // INVARIANT: Every success has a directory, every failure has a log line.
    for outcome in report.outcomes() {
        if let FetchOutcome::Succeeded { directory, .. } = outcome {
            assert!(out.path().join(directory).is_dir());
        }
    }

    let log = read_to_string(report.failure_log())?;
    let logged = log
        .lines()
        .filter_map(|line| line.split_once('\t').map(|(url, _)| url))
        .collect::<Vec<_>>();
    assert_eq!(logged, vec!["https://github.com/b/broken", "not-a-url"]);

    // INVARIANT: Partial fetch of the broken record got cleaned up.
    assert!(!out.path().join("broken").exists());

    Ok(())
}

#[tokio::test]
async fn reruns_allocate_same_names() -> Result<()> {
    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;
    let locators = records(&[
        "https://github.com/a/repo1",
        "https://github.com/b/repo1",
        "https://github.com/c/repo1",
    ]);
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let one = bulk.run(&locators, first.path()).await?;
    let two = bulk.run(&locators, second.path()).await?;

    assert_eq!(directories(one.outcomes()), directories(two.outcomes()));
    assert_eq!(
        directories(one.outcomes()),
        vec![
            Some("repo1".into()),
            Some("repo1-1".into()),
            Some("repo1-2".into())
        ]
    );

    Ok(())
}

#[tokio::test]
async fn existing_destinations_are_reused() -> Result<()> {
    let out = tempfile::tempdir()?;
    fs::create_dir_all(out.path().join("repo1"))?;
    let locators = records(&["https://github.com/a/repo1"]);

    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());
    let report = bulk.run(&locators, out.path()).await?;

    assert_eq!(
        report.outcomes(),
        &[FetchOutcome::Succeeded {
            url: "https://github.com/a/repo1".into(),
            directory: "repo1".into(),
            reused: true,
        }]
    );

    Ok(())
}

#[tokio::test]
async fn existing_destinations_kept_when_refetch_fails() -> Result<()> {
    let out = tempfile::tempdir()?;
    let existing = out.path().join("repo1");
    fs::create_dir_all(&existing)?;
    fs::write(existing.join("keep.txt"), "precious")?;

    let mut settings = FetchSettings::default();
    settings.fetch.skip_existing = false;
    let fetcher = FakeFetcher::failing(["https://github.com/a/repo1"]);
    let bulk = BulkFetcher::new(fetcher, settings);

    let report = bulk
        .run(&records(&["https://github.com/a/repo1"]), out.path())
        .await?;

    assert_eq!(report.failed(), 1);
    assert_eq!(read_to_string(existing.join("keep.txt"))?, "precious");

    Ok(())
}

#[tokio::test]
async fn fetcher_receives_normalized_urls() -> Result<()> {
    let out = tempfile::tempdir()?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());
    let locators = records(&[
        "github.com/a/repo1/tree/main",
        "git@github.com:b/tool.git",
    ]);

    bulk.run(&locators, out.path()).await?;

    // Outcomes keep the original URL, the fetcher sees the normalized one.
    let written = read_to_string(out.path().join("tool").join("README.md"))?;
    assert_eq!(written, "https://github.com/b/tool");

    Ok(())
}

#[tokio::test]
async fn run_file_reads_json_input() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("clients.json");
    fs::write(
        &input,
        r#"[{"github_url": "https://github.com/a/repo1"}, {"github_url": "https://github.com/b/repo1"}]"#,
    )?;
    let out = dir.path().join("out");
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let report = bulk.run_file(&input, &out).await?;

    assert_eq!(report.succeeded(), 2);
    assert!(out.join("repo1").is_dir());
    assert!(out.join("repo1-1").is_dir());

    Ok(())
}

#[tokio::test]
async fn run_file_with_unreadable_input_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let result = bulk
        .run_file(dir.path().join("missing.json"), dir.path().join("out"))
        .await;

    assert!(matches!(result, Err(BulkError::Locator(_))));

    Ok(())
}

#[tokio::test]
async fn file_in_place_of_destination_fails() -> Result<()> {
    let out = tempfile::tempdir()?;
    fs::write(out.path().join("repo1"), "not a clone")?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let report = bulk
        .run(&records(&["https://github.com/a/repo1"]), out.path())
        .await?;

    assert_eq!(report.failed(), 1);
    assert!(bulk.fetcher().calls().is_empty());
    assert_eq!(read_to_string(out.path().join("repo1"))?, "not a clone");

    let log = read_to_string(report.failure_log())?;
    assert!(log.starts_with("https://github.com/a/repo1\t"));

    Ok(())
}

#[tokio::test]
async fn failure_log_name_is_never_a_destination() -> Result<()> {
    let out = tempfile::tempdir()?;
    let fetcher = FakeFetcher::failing(["https://github.com/b/broken"]);
    let bulk = BulkFetcher::new(fetcher, FetchSettings::default());
    let locators = records(&[
        "https://github.com/a/clone_failed.txt",
        "https://github.com/b/broken",
    ]);

    let report = bulk.run(&locators, out.path()).await?;

    assert_eq!(
        directories(report.outcomes()),
        vec![Some("clone_failed.txt-1".into()), None]
    );
    assert!(out.path().join("clone_failed.txt-1").is_dir());

    let log = read_to_string(report.failure_log())?;
    assert_eq!(log.lines().count(), 1);
    assert!(log.starts_with("https://github.com/b/broken\t"));

    Ok(())
}

#[tokio::test]
async fn odd_input_entries_fail_alone() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("clients.json");
    fs::write(
        &input,
        r#"[42, {"name": "Nameless"}, {"github_url": "https://github.com/a/repo1"}]"#,
    )?;
    let out = dir.path().join("out");
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let report = bulk.run_file(&input, &out).await?;

    assert_eq!(
        directories(report.outcomes()),
        vec![None, None, Some("repo1".into())]
    );

    // INVARIANT: Records without a URL are logged under their display name.
    let log = read_to_string(report.failure_log())?;
    let logged = log
        .lines()
        .filter_map(|line| line.split_once('\t').map(|(locator, _)| locator))
        .collect::<Vec<_>>();
    assert_eq!(logged, vec!["42", "Nameless"]);

    Ok(())
}

#[tokio::test]
async fn existing_clone_of_other_repository_not_reused() -> Result<()> {
    let out = tempfile::tempdir()?;
    let existing = Repository::init(out.path().join("repo1"))?;
    existing.remote("origin", "https://github.com/b/repo1.git")?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let report = bulk
        .run(
            &records(&["https://github.com/a/repo1", "https://github.com/b/repo1"]),
            out.path(),
        )
        .await?;

    assert!(matches!(
        &report.outcomes()[0],
        FetchOutcome::Failed { url, error }
            if url == "https://github.com/a/repo1" && error.contains("github.com/b/repo1")
    ));
    assert_eq!(
        directories(report.outcomes()),
        vec![None, Some("repo1-1".into())]
    );
    assert_eq!(
        bulk.fetcher().calls(),
        vec![(
            "https://github.com/b/repo1".to_string(),
            out.path().join("repo1-1")
        )]
    );
    assert!(!out.path().join("repo1").join("README.md").exists());

    Ok(())
}

#[tokio::test]
async fn existing_clone_of_same_repository_reused() -> Result<()> {
    let out = tempfile::tempdir()?;
    let existing = Repository::init(out.path().join("repo1"))?;
    existing.remote("origin", "git@github.com:A/repo1.git")?;
    let bulk = BulkFetcher::new(FakeFetcher::default(), FetchSettings::default());

    let report = bulk
        .run(&records(&["https://github.com/a/repo1"]), out.path())
        .await?;

    assert_eq!(
        report.outcomes(),
        &[FetchOutcome::Succeeded {
            url: "https://github.com/a/repo1".into(),
            directory: "repo1".into(),
            reused: true,
        }]
    );
    assert!(bulk.fetcher().calls().is_empty());

    Ok(())
}
