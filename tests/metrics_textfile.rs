// tests/metrics_textfile.rs
use arxiv_watcher::feed::arxiv::ArxivFeed;
use arxiv_watcher::feed::{FeedQuery, Lookback};
use arxiv_watcher::ledger::Ledger;
use arxiv_watcher::metrics::Metrics;
use arxiv_watcher::patterns::{PatternCategory, PatternSet};
use arxiv_watcher::pipeline::{run, RunSettings, Sinks};
use chrono::{TimeZone, Utc};

const ARXIV_XML: &str = include_str!("fixtures/arxiv_page.xml");

// One recorder per process, so this binary holds a single test.
#[tokio::test]
async fn fixture_run_lands_in_prometheus_textfile() {
    let metrics = Metrics::init().expect("recorder installs once");

    let dir = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2025, 7, 18, 9, 0, 0).unwrap();
    let kw = PatternSet::from_str_lines(PatternCategory::Keyword, "kaon\nCKM\n");
    let au = PatternSet::from_str_lines(PatternCategory::Author, "grossman\n");
    let feed = ArxivFeed::from_fixture(ARXIV_XML);
    let query = FeedQuery::new("q", Lookback::Hours(24), now);
    let mut ledger = Ledger::new(dir.path().join("state.json"));

    let out = run(&feed, &query, &kw, &au, &mut ledger, RunSettings::default(), &Sinks::default())
        .await
        .expect("fixture run");
    assert_eq!(out.summary.found, 2);

    let path = dir.path().join("textfile").join("arxiv_watcher.prom");
    metrics.write_textfile(&path).expect("textfile written");

    let text = std::fs::read_to_string(&path).unwrap();
    for needle in ["watch_hits_total", "watch_last_run_ts", "watch_skipped_total"] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
    assert!(text.contains("watch_hits_total 2"), "{text}");

    let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, ["arxiv_watcher.prom"]);
}
