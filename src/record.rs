// src/record.rs
//! Record normalizer: raw feed entry → canonical matching unit.

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// One feed entry as delivered by the feed collaborator. Everything is optional
/// at this stage; `normalize` decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Entry identifier, usually the abs URL (`http://arxiv.org/abs/2507.13445v1`).
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub authors: Vec<String>,
    pub primary_category: Option<String>,
    pub categories: Vec<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub abs_url: Option<String>,
    pub pdf_url: Option<String>,
}

/// Canonical, normalized record. `id` is the only identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub title: String,
    pub summary: String,
    /// Display names, original casing.
    pub authors: Vec<String>,
    pub primary_category: String,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub abs_url: String,
    pub pdf_url: String,
    /// Lower-cased `title + " " + summary`, whitespace collapsed.
    pub searchable_text: String,
    /// Lower-cased author names, same order as `authors`.
    pub author_keys: Vec<String>,
}

impl Record {
    /// Most recent known timestamp (updated, else published).
    pub fn last_touched(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.published_at)
    }
}

/// Normalize text: strip tags, decode entities, fold fancy quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // Tags first, so escaped markup (`&lt;b&gt;`) survives as text.
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    let stripped = re_tags.replace_all(s, "");
    let mut out = html_escape::decode_html_entities(&stripped).to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduce an arXiv entry id to its bare identifier:
/// `http://arxiv.org/abs/2507.13445v2` → `2507.13445`,
/// `http://arxiv.org/abs/hep-ph/0601001v1` → `hep-ph/0601001`.
pub fn canonical_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let tail = match trimmed.rfind("/abs/") {
        Some(pos) => &trimmed[pos + "/abs/".len()..],
        None => match trimmed.rfind("/pdf/") {
            Some(pos) => trimmed[pos + "/pdf/".len()..].trim_end_matches(".pdf"),
            None => trimmed,
        },
    };

    static RE_VERSION: OnceCell<Regex> = OnceCell::new();
    let re_version = RE_VERSION.get_or_init(|| Regex::new(r"v\d+$").expect("version regex"));
    let id = re_version.replace(tail, "").to_string();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a raw entry into a `Record`. Fails only when the identifier is absent.
pub fn normalize(raw: RawEntry) -> Result<Record> {
    let id = raw
        .id
        .as_deref()
        .and_then(canonical_id)
        .ok_or_else(|| {
            WatchError::MalformedRecord(format!(
                "entry without identifier (title: {:?})",
                raw.title.as_deref().unwrap_or_default()
            ))
        })?;

    let title = normalize_text(raw.title.as_deref().unwrap_or_default());
    let summary = normalize_text(raw.summary.as_deref().unwrap_or_default());

    let authors: Vec<String> = raw
        .authors
        .iter()
        .map(|a| normalize_text(a))
        .filter(|a| !a.is_empty())
        .collect();
    let author_keys = authors.iter().map(|a| a.to_lowercase()).collect();

    let searchable_text = match (title.is_empty(), summary.is_empty()) {
        (true, true) => String::new(),
        (false, true) => title.to_lowercase(),
        (true, false) => summary.to_lowercase(),
        (false, false) => format!("{} {}", title, summary).to_lowercase(),
    };

    let mut categories: Vec<String> = raw
        .categories
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    categories.dedup();
    let primary_category = raw
        .primary_category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .or_else(|| categories.first().cloned())
        .unwrap_or_default();

    let abs_url = raw
        .abs_url
        .or(raw.id)
        .map(|u| u.trim().to_string())
        .unwrap_or_default();

    Ok(Record {
        id,
        title,
        summary,
        authors,
        primary_category,
        categories,
        published_at: parse_timestamp(raw.published.as_deref()),
        updated_at: parse_timestamp(raw.updated.as_deref()),
        abs_url,
        pdf_url: raw.pdf_url.map(|u| u.trim().to_string()).unwrap_or_default(),
        searchable_text,
        author_keys,
    })
}
