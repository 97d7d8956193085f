// src/sink/csv_log.rs
//! Append-only CSV log of reported hits.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::ranking::Hit;
use crate::report::format_authors;

pub const HEADER: [&str; 10] = [
    "timestamp",
    "score_total",
    "score_keywords",
    "score_authors",
    "title",
    "link",
    "pdf_saved_or_url",
    "updated",
    "categories",
    "authors",
];

const LOG_AUTHORS: usize = 3;

pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One row per hit. `saved[i]` is the downloaded PDF for `hits[i]`, if any.
    /// The header is written only when the file is new.
    pub fn append(&self, hits: &[Hit], saved: &[Option<PathBuf>], at: DateTime<Local>) -> Result<usize> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let is_new = !self.path.exists()
            || fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening csv log {}", self.path.display()))?;
        let mut w = csv::Writer::from_writer(file);
        if is_new {
            w.write_record(HEADER).context("writing csv header")?;
        }

        let ts = at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        for (i, hit) in hits.iter().enumerate() {
            let r = &hit.record;
            let pdf = saved
                .get(i)
                .and_then(|p| p.as_ref())
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| r.pdf_url.clone());
            let updated = r
                .last_touched()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            let row = vec![
                ts.clone(),
                hit.result.score.to_string(),
                hit.result.keyword_score.to_string(),
                hit.result.author_score.to_string(),
                r.title.clone(),
                r.abs_url.clone(),
                pdf,
                updated,
                r.categories.join(";"),
                format_authors(&r.authors, LOG_AUTHORS),
            ];
            w.write_record(&row).context("writing csv row")?;
        }
        w.flush().context("flushing csv log")?;
        Ok(hits.len())
    }
}
