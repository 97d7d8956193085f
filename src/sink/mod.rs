// src/sink/mod.rs
//! Output side effects for ranked hits: CSV log, PDF download, notifications.
//! Failures here are logged and never abort a run.

pub mod csv_log;
pub mod desktop;
pub mod discord;
pub mod download;
pub mod email;
pub mod slack;

use anyhow::Result;

use crate::ranking::Hit;

/// What a notifier needs to know about one hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub subtitle: String,
    pub message: String,
    pub link: String,
}

impl Notification {
    pub fn from_hit(hit: &Hit) -> Self {
        Self {
            title: "arXiv hit".to_string(),
            subtitle: format!(
                "score {} (kw{} + au{})",
                hit.result.score, hit.result.keyword_score, hit.result.author_score
            ),
            message: format!("[{}] {}", hit.record.id, hit.record.title),
            link: hit.record.abs_url.clone(),
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, n: &Notification) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans one notification out to every configured channel.
#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, n: Box<dyn Notifier>) -> Self {
        self.channels.push(n);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Returns how many channels accepted the notification.
    pub async fn notify(&self, n: &Notification) -> usize {
        let mut ok = 0;
        for ch in &self.channels {
            match ch.send(n).await {
                Ok(()) => ok += 1,
                Err(e) => {
                    tracing::warn!(target: "notify", channel = ch.name(), error = %e, "notification failed");
                    metrics::counter!("watch_notify_errors_total").increment(1);
                }
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{normalize, RawEntry};
    use crate::scoring::MatchResult;
    use std::sync::Mutex;

    struct Recording {
        seen: std::sync::Arc<Mutex<Vec<Notification>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for Recording {
        async fn send(&self, n: &Notification) -> Result<()> {
            if self.fail {
                anyhow::bail!("boom");
            }
            self.seen.lock().unwrap().push(n.clone());
            Ok(())
        }
        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn hit() -> Hit {
        let record = normalize(RawEntry {
            id: Some("http://arxiv.org/abs/2507.13445v1".into()),
            title: Some("CP violation in K decays".into()),
            ..Default::default()
        })
        .unwrap();
        Hit::new(
            record,
            MatchResult {
                keyword_hits: 1,
                author_hits: 1,
                score: 2,
                keyword_score: 1,
                author_score: 1,
                ..Default::default()
            },
        )
    }

    #[test]
    fn notification_text() {
        let n = Notification::from_hit(&hit());
        assert_eq!(n.subtitle, "score 2 (kw1 + au1)");
        assert_eq!(n.message, "[2507.13445] CP violation in K decays");
    }

    #[tokio::test]
    async fn mux_survives_failing_channel() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let mux = NotifierMux::new()
            .with(Box::new(Recording {
                seen: seen.clone(),
                fail: true,
            }))
            .with(Box::new(Recording {
                seen: seen.clone(),
                fail: false,
            }));
        let delivered = mux.notify(&Notification::from_hit(&hit())).await;
        assert_eq!(delivered, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
