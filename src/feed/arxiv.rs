// src/feed/arxiv.rs
//! arXiv Atom API provider.
//!
//! `Hours` windows page through `submittedDate` order and keep entries whose
//! `updated` timestamp falls inside the window. `Since` windows page through
//! `lastUpdatedDate` order and stop at the first entry older than the cutoff.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, WatchError};
use crate::feed::{FeedQuery, FeedSource, Lookback};
use crate::record::{parse_timestamp, RawEntry};

pub const ARXIV_API: &str = "http://export.arxiv.org/api/query";
const USER_AGENT: &str = concat!("arxiv-watcher/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    updated: Option<String>,
    published: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<AtomAuthor>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(rename = "category", default)]
    categories: Vec<AtomCategory>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomCategory {
    #[serde(rename = "@term")]
    term: Option<String>,
}

impl From<AtomEntry> for RawEntry {
    fn from(e: AtomEntry) -> Self {
        let mut abs_url = None;
        let mut pdf_url = None;
        for l in e.links {
            let Some(href) = l.href else { continue };
            if l.kind.as_deref().is_some_and(|k| k.ends_with("pdf")) {
                pdf_url = Some(href);
            } else if l.rel.as_deref() == Some("alternate") {
                abs_url = Some(href);
            }
        }
        let categories: Vec<String> = e.categories.into_iter().filter_map(|c| c.term).collect();
        RawEntry {
            id: e.id,
            title: e.title,
            summary: e.summary,
            authors: e
                .authors
                .into_iter()
                .filter_map(|a| a.name)
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
            // arXiv lists the primary category first
            primary_category: categories.first().cloned(),
            categories,
            published: e.published,
            updated: e.updated,
            abs_url,
            pdf_url,
        }
    }
}

/// Parse one Atom page into raw entries (feed order).
pub fn parse_page(xml: &str) -> Result<Vec<RawEntry>> {
    let t0 = std::time::Instant::now();
    let feed: AtomFeed =
        from_str(xml).map_err(|e| WatchError::FeedFetch(format!("parsing atom xml: {e}")))?;
    let out: Vec<RawEntry> = feed.entries.into_iter().map(RawEntry::from).collect();

    histogram!("watch_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("watch_entries_total").increment(out.len() as u64);
    Ok(out)
}

pub fn build_url(query: &FeedQuery, start: usize) -> Result<Url> {
    let sort_by = match query.lookback {
        Lookback::Hours(_) => "submittedDate",
        Lookback::Since(_) => "lastUpdatedDate",
    };
    let start = start.to_string();
    let max_results = query.page_size.to_string();
    Url::parse_with_params(
        ARXIV_API,
        &[
            ("search_query", query.search_query.as_str()),
            ("start", start.as_str()),
            ("max_results", max_results.as_str()),
            ("sortBy", sort_by),
            ("sortOrder", "descending"),
        ],
    )
    .map_err(|e| WatchError::FeedFetch(format!("building query url: {e}")))
}

fn entry_time(e: &RawEntry) -> Option<DateTime<Utc>> {
    parse_timestamp(e.updated.as_deref()).or_else(|| parse_timestamp(e.published.as_deref()))
}

pub struct ArxivFeed {
    mode: Mode,
}

enum Mode {
    /// Pre-recorded pages, served in order (tests, offline runs).
    Fixture(Vec<String>),
    Http {
        client: reqwest::Client,
        page_delay: Duration,
    },
}

impl ArxivFeed {
    pub fn from_fixture(xml: &str) -> Self {
        Self::from_fixture_pages(vec![xml.to_string()])
    }

    pub fn from_fixture_pages(pages: Vec<String>) -> Self {
        Self {
            mode: Mode::Fixture(pages),
        }
    }

    /// HTTP client with a single request timeout; no retries.
    pub fn http(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WatchError::FeedFetch(format!("building http client: {e}")))?;
        Ok(Self {
            mode: Mode::Http {
                client,
                page_delay: Duration::from_secs(3),
            },
        })
    }

    /// `Ok(None)` when the source has no further pages.
    async fn page(&self, query: &FeedQuery, index: usize) -> Result<Option<String>> {
        match &self.mode {
            Mode::Fixture(pages) => Ok(pages.get(index).cloned()),
            Mode::Http { client, page_delay } => {
                if index > 0 {
                    // arXiv asks clients to space consecutive requests
                    tokio::time::sleep(*page_delay).await;
                }
                let url = build_url(query, index * query.page_size)?;
                debug!(target: "feed", %url, page = index, "fetching arxiv page");
                let resp = client.get(url).send().await.map_err(|e| {
                    counter!("watch_feed_errors_total").increment(1);
                    WatchError::FeedFetch(format!("arxiv request: {e}"))
                })?;
                let status = resp.status();
                if !status.is_success() {
                    counter!("watch_feed_errors_total").increment(1);
                    return Err(WatchError::FeedFetch(format!("arxiv returned status {status}")));
                }
                let body = resp
                    .text()
                    .await
                    .map_err(|e| WatchError::FeedFetch(format!("reading arxiv body: {e}")))?;
                Ok(Some(body))
            }
        }
    }
}

#[async_trait]
impl FeedSource for ArxivFeed {
    async fn fetch(&self, query: &FeedQuery) -> Result<Vec<RawEntry>> {
        let cutoff = query.lookback.cutoff(query.now);
        let mut out = Vec::new();

        for index in 0..query.max_pages {
            let Some(xml) = self.page(query, index).await? else {
                break;
            };
            let entries = parse_page(&xml)?;
            if entries.is_empty() {
                break;
            }

            for e in entries {
                match (query.lookback, entry_time(&e)) {
                    // Sorted by lastUpdatedDate: everything after this is older.
                    (Lookback::Since(_), Some(t)) if t < cutoff => {
                        debug!(target: "feed", kept = out.len(), "reached since-cutoff");
                        return Ok(out);
                    }
                    (Lookback::Hours(_), Some(t)) if t < cutoff => continue,
                    (_, None) => {
                        warn!(target: "feed", id = ?e.id, "entry without parseable timestamp kept");
                        out.push(e);
                    }
                    _ => out.push(e),
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "arxiv"
    }
}
