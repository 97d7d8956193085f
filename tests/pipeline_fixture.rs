// tests/pipeline_fixture.rs
use arxiv_watcher::error::WatchError;
use arxiv_watcher::feed::arxiv::ArxivFeed;
use arxiv_watcher::feed::{FeedQuery, FeedSource, Lookback};
use arxiv_watcher::ledger::Ledger;
use arxiv_watcher::patterns::{PatternCategory, PatternSet};
use arxiv_watcher::pipeline::{run, RunSettings, Sinks};
use arxiv_watcher::record::RawEntry;
use arxiv_watcher::sink::csv_log::CsvLog;
use chrono::{DateTime, TimeZone, Utc};

const ARXIV_XML: &str = include_str!("fixtures/arxiv_page.xml");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 18, 9, 0, 0).unwrap()
}

fn patterns() -> (PatternSet, PatternSet) {
    (
        PatternSet::from_str_lines(PatternCategory::Keyword, "kaon\nCKM\n"),
        PatternSet::from_str_lines(PatternCategory::Author, "grossman\n"),
    )
}

fn query() -> FeedQuery {
    FeedQuery::new("q", Lookback::Hours(24), now())
}

#[tokio::test]
async fn fixture_run_reports_ranked_hits_once() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("state").join("state.json");
    let csv_path = dir.path().join("hits_log.csv");
    let (kw, au) = patterns();
    let feed = ArxivFeed::from_fixture(ARXIV_XML);
    let sinks = Sinks {
        csv: Some(CsvLog::new(&csv_path)),
        ..Default::default()
    };

    let mut ledger = Ledger::load_or_empty(&ledger_path);
    let out = run(&feed, &query(), &kw, &au, &mut ledger, RunSettings::default(), &sinks)
        .await
        .expect("fixture run");

    let ids: Vec<_> = out.hits.iter().map(|h| h.record.id.as_str()).collect();
    assert_eq!(ids, ["2507.13445", "2507.13500"]);
    assert_eq!(out.hits[0].result.explain(), "2 = kw1+au1");
    assert_eq!(out.hits[0].result.matched_keywords, vec!["ckm"]);
    assert_eq!(out.hits[0].result.matched_authors, vec!["grossman"]);
    assert_eq!(out.summary.fetched, 4, "old revision is outside the window");
    assert_eq!(out.summary.skipped, 1);
    assert_eq!(out.summary.below_threshold, 1);
    assert_eq!(out.summary.found, 2);
    assert_eq!(out.saved, vec![None, None]);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 3, "header + one row per hit");

    let reloaded = Ledger::load(&ledger_path).unwrap();
    assert!(!reloaded.is_new("2507.13445"));
    assert!(!reloaded.is_new("2507.13500"));
    assert!(reloaded.is_new("2507.13600"), "below-threshold records are not recorded");
    assert_eq!(reloaded.last_success(), Some(now()));

    // Same window again: everything is already reported.
    let mut ledger = Ledger::load_or_empty(&ledger_path);
    let again = run(&feed, &query(), &kw, &au, &mut ledger, RunSettings::default(), &sinks)
        .await
        .unwrap();
    assert!(again.hits.is_empty());
    assert_eq!(again.summary.already_reported, 2);

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 3, "no header repeated, no new rows");
}

struct DownFeed;

#[async_trait::async_trait]
impl FeedSource for DownFeed {
    async fn fetch(&self, _query: &FeedQuery) -> arxiv_watcher::Result<Vec<RawEntry>> {
        Err(WatchError::FeedFetch("connection refused".into()))
    }
    fn name(&self) -> &'static str {
        "down"
    }
}

#[tokio::test]
async fn feed_failure_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("state.json");
    let csv_path = dir.path().join("hits_log.csv");
    let (kw, au) = patterns();
    let sinks = Sinks {
        csv: Some(CsvLog::new(&csv_path)),
        ..Default::default()
    };

    let mut ledger = Ledger::load_or_empty(&ledger_path);
    let err = run(&DownFeed, &query(), &kw, &au, &mut ledger, RunSettings::default(), &sinks)
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(!ledger_path.exists());
    assert!(!csv_path.exists());
}

#[tokio::test]
async fn empty_patterns_report_nothing_unless_threshold_zero() {
    let dir = tempfile::tempdir().unwrap();
    let kw = PatternSet::empty(PatternCategory::Keyword);
    let au = PatternSet::empty(PatternCategory::Author);
    let feed = ArxivFeed::from_fixture(ARXIV_XML);
    let sinks = Sinks::default();

    let mut ledger = Ledger::new(dir.path().join("a.json"));
    let out = run(&feed, &query(), &kw, &au, &mut ledger, RunSettings::default(), &sinks)
        .await
        .unwrap();
    assert!(out.hits.is_empty());
    assert_eq!(out.summary.below_threshold, 3);

    let everything = RunSettings {
        threshold: 0,
        ..Default::default()
    };
    let mut ledger = Ledger::new(dir.path().join("b.json"));
    let out = run(&feed, &query(), &kw, &au, &mut ledger, everything, &sinks)
        .await
        .unwrap();
    assert_eq!(out.hits.len(), 3);
    assert!(out.hits.iter().all(|h| h.score() == 0));
    // all zero: newest first
    let ids: Vec<_> = out.hits.iter().map(|h| h.record.id.as_str()).collect();
    assert_eq!(ids, ["2507.13600", "2507.13500", "2507.13445"]);
}
