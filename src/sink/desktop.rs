// src/sink/desktop.rs
//! Desktop notifications: Notification Center via `osascript` on macOS,
//! `notify-send` elsewhere.

use anyhow::{bail, Context, Result};
use tokio::process::Command;

use super::{Notification, Notifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

pub(crate) fn applescript(n: &Notification) -> String {
    format!(
        "display notification \"{}\" with title \"{}\" subtitle \"{}\"",
        escape_applescript(&n.message),
        escape_applescript(&n.title),
        escape_applescript(&n.subtitle)
    )
}

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        let status = if cfg!(target_os = "macos") {
            Command::new("osascript")
                .arg("-e")
                .arg(applescript(n))
                .status()
                .await
                .context("spawning osascript")?
        } else {
            Command::new("notify-send")
                .arg(&n.title)
                .arg(format!("{}\n{}", n.subtitle, n.message))
                .status()
                .await
                .context("spawning notify-send")?
        };
        if !status.success() {
            bail!("desktop notifier exited with {status}");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "desktop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applescript_escapes_quotes() {
        let n = Notification {
            title: "arXiv hit".into(),
            subtitle: "score 1 (kw1 + au0)".into(),
            message: "[2507.1] The \"golden\" mode".into(),
            link: String::new(),
        };
        assert_eq!(
            applescript(&n),
            r#"display notification "[2507.1] The \"golden\" mode" with title "arXiv hit" subtitle "score 1 (kw1 + au0)""#
        );
    }
}
