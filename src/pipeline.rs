// src/pipeline.rs
//! One watcher run: fetch → normalize → score → dedup → threshold → rank →
//! sinks → ledger commit.
//!
//! A feed failure returns before any sink sees a hit and before the ledger is
//! touched. Sink failures are logged and the run carries on.

use chrono::{DateTime, Local, Utc};
use metrics::{counter, gauge};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::feed::{FeedQuery, FeedSource};
use crate::ledger::Ledger;
use crate::patterns::PatternSet;
use crate::ranking::{rank, Hit, DEFAULT_THRESHOLD};
use crate::record::{normalize, RawEntry};
use crate::scoring::{score_weighted, ScoreWeights};
use crate::sink::csv_log::CsvLog;
use crate::sink::download::PdfDownloader;
use crate::sink::{Notification, NotifierMux};

/// Scoring knobs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub weights: ScoreWeights,
    pub threshold: u32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Output side of a run. Every sink is optional.
#[derive(Default)]
pub struct Sinks {
    pub downloader: Option<PdfDownloader>,
    pub csv: Option<CsvLog>,
    pub notifier: NotifierMux,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Raw entries returned by the feed.
    pub fetched: usize,
    /// Hits reported this run.
    pub found: usize,
    /// Entries dropped by the normalizer.
    pub skipped: usize,
    /// Repeats of an id already seen earlier in the same run.
    pub duplicates: usize,
    pub already_reported: usize,
    pub below_threshold: usize,
}

#[derive(Debug, Default)]
pub struct RunOutcome {
    pub hits: Vec<Hit>,
    /// Downloaded PDF per hit, same order as `hits`.
    pub saved: Vec<Option<PathBuf>>,
    pub summary: RunSummary,
}

/// Pure core of a run: turns raw entries into ranked, not-yet-reported hits.
/// The ledger is only read.
pub fn evaluate(
    entries: Vec<RawEntry>,
    keywords: &PatternSet,
    authors: &PatternSet,
    ledger: &Ledger,
    settings: RunSettings,
) -> (Vec<Hit>, RunSummary) {
    let mut summary = RunSummary {
        fetched: entries.len(),
        ..Default::default()
    };
    let mut seen_in_run: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for raw in entries {
        let record = match normalize(raw) {
            Ok(r) => r,
            Err(e) => {
                debug!(target: "pipeline", error = %e, "entry skipped");
                summary.skipped += 1;
                continue;
            }
        };
        if !seen_in_run.insert(record.id.clone()) {
            summary.duplicates += 1;
            continue;
        }

        let result = score_weighted(&record, keywords, authors, settings.weights);

        if !ledger.is_new(&record.id) {
            summary.already_reported += 1;
            continue;
        }
        if result.score < settings.threshold {
            summary.below_threshold += 1;
            continue;
        }
        candidates.push(Hit::new(record, result));
    }

    let hits = rank(candidates, settings.threshold);
    summary.found = hits.len();
    (hits, summary)
}

/// Full run against `feed`. Hits are staged in the ledger and committed at
/// `query.now`; a commit failure is logged, not returned.
pub async fn run(
    feed: &dyn FeedSource,
    query: &FeedQuery,
    keywords: &PatternSet,
    authors: &PatternSet,
    ledger: &mut Ledger,
    settings: RunSettings,
    sinks: &Sinks,
) -> Result<RunOutcome> {
    let now: DateTime<Utc> = query.now;
    info!(
        target: "pipeline",
        source = feed.name(),
        lookback = %query.lookback.scope().trim(),
        keywords = keywords.len(),
        authors = authors.len(),
        threshold = settings.threshold,
        weighted = !settings.weights.is_unweighted(),
        "run started"
    );

    let entries = feed.fetch(query).await?;
    let (hits, summary) = evaluate(entries, keywords, authors, ledger, settings);

    counter!("watch_skipped_total").increment(summary.skipped as u64);
    counter!("watch_already_reported_total").increment(summary.already_reported as u64);
    counter!("watch_hits_total").increment(summary.found as u64);

    let mut saved = Vec::with_capacity(hits.len());
    for hit in &hits {
        let path = match &sinks.downloader {
            Some(dl) => match dl.download(hit).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(target: "pipeline", id = %hit.record.id, error = %e, "pdf download failed");
                    counter!("watch_download_errors_total").increment(1);
                    None
                }
            },
            None => None,
        };
        saved.push(path);
        if !sinks.notifier.is_empty() {
            sinks.notifier.notify(&Notification::from_hit(hit)).await;
        }
    }

    if let Some(csv) = &sinks.csv {
        if let Err(e) = csv.append(&hits, &saved, now.with_timezone(&Local)) {
            warn!(target: "pipeline", path = %csv.path().display(), error = %e, "csv append failed");
        }
    }

    for hit in &hits {
        ledger.mark_reported(&hit.record.id, now);
    }
    if let Err(e) = ledger.commit(now) {
        warn!(target: "pipeline", error = %e, "ledger commit failed; hits may be reported again");
    }
    gauge!("watch_last_run_ts").set(now.timestamp() as f64);

    info!(
        target: "pipeline",
        fetched = summary.fetched,
        found = summary.found,
        skipped = summary.skipped,
        duplicates = summary.duplicates,
        already_reported = summary.already_reported,
        below_threshold = summary.below_threshold,
        "run finished"
    );
    Ok(RunOutcome {
        hits,
        saved,
        summary,
    })
}
