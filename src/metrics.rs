// src/metrics.rs
//! Prometheus recorder for one run, rendered into a textfile at the end
//! (node-exporter textfile-collector style).

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Installs the global recorder. Fails if one is already installed.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Writes the rendering via a temp file so collectors never read a partial file.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render())
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("renaming to {}", path.display()))?;
        Ok(())
    }
}

fn describe() {
    describe_counter!("watch_entries_total", "Raw feed entries parsed.");
    describe_counter!("watch_skipped_total", "Entries dropped by the normalizer.");
    describe_counter!(
        "watch_already_reported_total",
        "Entries dropped because the ledger already holds their id."
    );
    describe_counter!("watch_hits_total", "Hits reported.");
    describe_counter!("watch_feed_errors_total", "Failed feed requests.");
    describe_counter!("watch_notify_errors_total", "Failed notification deliveries.");
    describe_counter!("watch_download_errors_total", "Failed PDF downloads.");
    describe_histogram!("watch_parse_ms", "Atom page parse time in milliseconds.");
    describe_gauge!("watch_last_run_ts", "Unix time of the last completed run.");
}
