// src/sink/download.rs
//! PDF downloader for reported hits.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ranking::Hit;

const MAX_NAME_CHARS: usize = 180;
const TITLE_CHARS: usize = 80;

/// `{id}_{title[..80]}` with everything outside `[A-Za-z0-9_.-]` folded to `_`,
/// capped at 180 characters (extension excluded).
pub fn safe_file_name(id: &str, title: &str) -> String {
    static RE_UNSAFE: OnceCell<Regex> = OnceCell::new();
    let re = RE_UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]+").expect("filename regex"));
    let short_title: String = title.chars().take(TITLE_CHARS).collect();
    let raw = format!("{id}_{short_title}");
    re.replace_all(&raw, "_").chars().take(MAX_NAME_CHARS).collect()
}

pub struct PdfDownloader {
    client: reqwest::Client,
    out_dir: PathBuf,
}

impl PdfDownloader {
    pub fn new(out_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building download client")?;
        Ok(Self {
            client,
            out_dir: out_dir.into(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn target_path(&self, hit: &Hit) -> PathBuf {
        self.out_dir
            .join(format!("{}.pdf", safe_file_name(&hit.record.id, &hit.record.title)))
    }

    /// `Ok(None)` when the hit has no PDF link.
    pub async fn download(&self, hit: &Hit) -> Result<Option<PathBuf>> {
        if hit.record.pdf_url.is_empty() {
            return Ok(None);
        }
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("creating {}", self.out_dir.display()))?;

        let path = self.target_path(hit);
        let bytes = self
            .client
            .get(&hit.record.pdf_url)
            .send()
            .await
            .context("pdf request")?
            .error_for_status()
            .context("pdf non-2xx")?
            .bytes()
            .await
            .context("pdf body")?;
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        tracing::debug!(target: "download", id = %hit.record.id, path = %path.display(), bytes = bytes.len(), "pdf saved");
        Ok(Some(path))
    }
}
