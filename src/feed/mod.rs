// src/feed/mod.rs
//! Feed collaborator: lookback windows, query parameters and the `FeedSource` trait.

pub mod arxiv;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::error::Result;
use crate::record::RawEntry;

/// Categories hep-ex/hep-ph/hep-lat AND kaon-physics terms.
pub const DEFAULT_QUERY: &str = concat!(
    "(cat:hep-ex OR cat:hep-ph OR cat:hep-lat)",
    " AND (all:kaon OR all:kaons OR all:\"CKM\" OR all:\"Vus\" OR all:\"|V_us|\"",
    " OR all:NA62 OR all:\"KOTO\" OR all:\"KOTO-II\" OR all:KLEVER OR all:HIKE)"
);

pub const DEFAULT_PAGE_SIZE: usize = 150;
const MAX_PAGES_HOURS: usize = 3;
const MAX_PAGES_SINCE: usize = 500;

/// Time range of interest for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookback {
    Hours(u32),
    /// From 00:00 UTC of the given date.
    Since(NaiveDate),
}

impl Lookback {
    /// Explicit `hours` or `since` win; otherwise derive hours from the last
    /// successful run (see `dynamic_hours`).
    pub fn resolve(
        hours: Option<u32>,
        since: Option<NaiveDate>,
        last_success: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        match (since, hours) {
            (Some(d), _) => Lookback::Since(d),
            (None, Some(h)) => Lookback::Hours(h),
            (None, None) => Lookback::Hours(dynamic_hours(last_success, now)),
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Lookback::Hours(h) => now - Duration::hours(i64::from(*h)),
            Lookback::Since(d) => d.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Human suffix for "Found N matching entries{scope}."
    pub fn scope(&self) -> String {
        match self {
            Lookback::Hours(h) => format!(" in the last {h}h"),
            Lookback::Since(d) => format!(" since {}", d.format("%Y-%m-%d")),
        }
    }

    pub fn default_max_pages(&self) -> usize {
        match self {
            Lookback::Hours(_) => MAX_PAGES_HOURS,
            Lookback::Since(_) => MAX_PAGES_SINCE,
        }
    }
}

/// Hours since the last success, rounded and clamped to [23, 25]; 24 when unknown.
pub fn dynamic_hours(last_success: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    match last_success {
        None => 24,
        Some(last) => {
            let delta_h = (now - last).num_seconds() as f64 / 3600.0;
            delta_h.round().clamp(23.0, 25.0) as u32
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedQuery {
    pub search_query: String,
    pub lookback: Lookback,
    pub page_size: usize,
    pub max_pages: usize,
    pub now: DateTime<Utc>,
}

impl FeedQuery {
    pub fn new(search_query: impl Into<String>, lookback: Lookback, now: DateTime<Utc>) -> Self {
        Self {
            search_query: search_query.into(),
            lookback,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: lookback.default_max_pages(),
            now,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// Supplies raw entries for a lookback window, newest first.
/// Any error is fatal for the run (`WatchError::FeedFetch`).
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawEntry>>;
    fn name(&self) -> &'static str;
}
