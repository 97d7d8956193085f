// src/config.rs
//! Layered watcher configuration: built-in defaults, then the TOML file
//! (`$WATCHER_CONFIG_PATH` or `config/watcher.toml`), then env overrides.
//! CLI flags are applied on top by the binary.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, WatchError};
use crate::feed::{DEFAULT_PAGE_SIZE, DEFAULT_QUERY};
use crate::ledger::DEFAULT_LEDGER_CAPACITY;
use crate::ranking::DEFAULT_THRESHOLD;
use crate::scoring::ScoreWeights;

pub const ENV_CONFIG_PATH: &str = "WATCHER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/watcher.toml";
pub const ENV_THRESHOLD: &str = "WATCHER_THRESHOLD";
pub const ENV_LEDGER_PATH: &str = "WATCHER_LEDGER_PATH";
pub const ENV_OUT_DIR: &str = "WATCHER_OUT_DIR";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub feed: FeedConfig,
    pub patterns: PatternsConfig,
    pub scoring: ScoringConfig,
    pub ledger: LedgerConfig,
    pub output: OutputConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub query: String,
    pub page_size: usize,
    /// Overrides the per-lookback page cap when set.
    pub max_pages: Option<usize>,
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    pub keywords: PathBuf,
    pub authors: PathBuf,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            keywords: PathBuf::from("patterns/keywords.txt"),
            authors: PathBuf::from("patterns/authors.txt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub keyword_weight: u32,
    pub author_weight: u32,
    pub threshold: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let w = ScoreWeights::default();
        Self {
            keyword_weight: w.keyword,
            author_weight: w.author,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ScoringConfig {
    pub fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            keyword: self.keyword_weight,
            author: self.author_weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
    /// Newest ids kept on commit; 0 = unlimited.
    pub capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: home().join(".local/share/arxiv_watcher/state.json"),
            capacity: DEFAULT_LEDGER_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub out_dir: PathBuf,
    pub csv: PathBuf,
    pub report_md: Option<PathBuf>,
    pub download_timeout_secs: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let out_dir = home().join("Papers").join("arxiv_hits");
        Self {
            csv: out_dir.join("hits_log.csv"),
            out_dir,
            report_md: None,
            download_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub desktop: bool,
    pub slack_webhook: Option<String>,
    pub discord_webhook: Option<String>,
    pub discord_timeout_secs: u64,
    /// Attempts per Discord message, at least 1.
    pub discord_retries: u8,
    /// SMTP settings come from SMTP_* / NOTIFY_EMAIL_* env vars.
    pub email: bool,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            desktop: false,
            slack_webhook: None,
            discord_webhook: None,
            discord_timeout_secs: 5,
            discord_retries: 3,
            email: false,
        }
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~` and `~/...` resolved against the home directory.
pub fn expand_tilde(p: &Path) -> PathBuf {
    match p.strip_prefix("~") {
        Ok(rest) => home().join(rest),
        Err(_) => p.to_path_buf(),
    }
}

impl WatcherConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: Self =
            toml::from_str(s).map_err(|e| WatchError::Config(format!("invalid TOML: {e}")))?;
        cfg.expand_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            WatchError::Config(format!("reading config {}: {e}", path.display()))
        })?;
        debug!(target: "config", path = %path.display(), "config loaded");
        Self::from_toml_str(&content)
    }

    /// Resolution order:
    /// 1) $WATCHER_CONFIG_PATH (must exist)
    /// 2) config/watcher.toml
    /// 3) built-in defaults
    ///
    /// Env overrides are applied to whichever of these wins.
    pub fn load_default() -> Result<Self> {
        let mut cfg = match default_config_path()? {
            Some(p) => Self::load_from(&p)?,
            None => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// WATCHER_THRESHOLD, WATCHER_LEDGER_PATH, WATCHER_OUT_DIR. Unparseable
    /// values are ignored with a warning.
    pub fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(ENV_THRESHOLD) {
            match parse_threshold_env(&raw) {
                Some(t) => self.scoring.threshold = t,
                None => warn!(target: "config", value = %raw, "ignoring invalid {ENV_THRESHOLD}"),
            }
        }
        if let Some(p) = non_empty_env(ENV_LEDGER_PATH) {
            self.ledger.path = expand_tilde(Path::new(&p));
        }
        if let Some(p) = non_empty_env(ENV_OUT_DIR) {
            self.output.out_dir = expand_tilde(Path::new(&p));
        }
    }

    fn expand_paths(&mut self) {
        self.patterns.keywords = expand_tilde(&self.patterns.keywords);
        self.patterns.authors = expand_tilde(&self.patterns.authors);
        self.ledger.path = expand_tilde(&self.ledger.path);
        self.output.out_dir = expand_tilde(&self.output.out_dir);
        self.output.csv = expand_tilde(&self.output.csv);
        if let Some(p) = self.output.report_md.as_mut() {
            *p = expand_tilde(p);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.feed.query.trim().is_empty() {
            return Err(WatchError::Config("feed.query must not be empty".into()));
        }
        if self.feed.page_size == 0 {
            return Err(WatchError::Config("feed.page_size must be at least 1".into()));
        }
        Ok(())
    }
}

/// The file `load_default` reads: `$WATCHER_CONFIG_PATH` (an error if it
/// does not exist), else `config/watcher.toml` when present.
pub fn default_config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(WatchError::Config(format!(
                "{ENV_CONFIG_PATH} points to non-existent path {}",
                pb.display()
            )));
        }
        return Ok(Some(pb));
    }
    let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default_p.exists().then_some(default_p))
}

fn parse_threshold_env(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const SAMPLE: &str = r#"
[feed]
query = "cat:hep-ph AND all:kaon"
page_size = 50

[patterns]
keywords = "~/watch/keywords.txt"

[scoring]
author_weight = 2
threshold = 2

[ledger]
capacity = 0

[notify]
desktop = true
discord_webhook = "https://discord.example/hook"
discord_retries = 1
"#;

    #[test]
    fn toml_sections_override_defaults() {
        let cfg = WatcherConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.feed.query, "cat:hep-ph AND all:kaon");
        assert_eq!(cfg.feed.page_size, 50);
        assert_eq!(cfg.feed.timeout_secs, 60);
        assert_eq!(cfg.patterns.keywords, home().join("watch/keywords.txt"));
        assert_eq!(cfg.patterns.authors, PathBuf::from("patterns/authors.txt"));
        assert_eq!(cfg.scoring.weights(), ScoreWeights { keyword: 1, author: 2 });
        assert_eq!(cfg.scoring.threshold, 2);
        assert_eq!(cfg.ledger.capacity, 0);
        assert!(cfg.notify.desktop);
        assert!(cfg.notify.slack_webhook.is_none());
        assert_eq!(cfg.notify.discord_retries, 1);
        assert_eq!(cfg.notify.discord_timeout_secs, 5);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = WatcherConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, WatcherConfig::default());
        assert_eq!(cfg.scoring.threshold, 1);
        assert_eq!(cfg.ledger.capacity, 5_000);
        assert!(cfg.ledger.path.ends_with(".local/share/arxiv_watcher/state.json"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(WatcherConfig::from_toml_str("[feed]\npage_size = 0").is_err());
        assert!(WatcherConfig::from_toml_str("[scoring]\nthreshold = \"high\"").is_err());
    }

    #[test]
    fn tilde_expansion() {
        assert_eq!(expand_tilde(Path::new("~")), home());
        assert_eq!(expand_tilde(Path::new("/tmp/x")), PathBuf::from("/tmp/x"));
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_apply_last() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        assert_eq!(default_config_path().unwrap(), None);

        let p = tmp.path().join("watcher.toml");
        fs::write(&p, "[scoring]\nthreshold = 3\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(default_config_path().unwrap(), Some(p.clone()));
        env::set_var(ENV_THRESHOLD, "0");
        env::set_var(ENV_LEDGER_PATH, "/tmp/ledger.json");

        let cfg = WatcherConfig::load_default().unwrap();
        assert_eq!(cfg.scoring.threshold, 0);
        assert_eq!(cfg.ledger.path, PathBuf::from("/tmp/ledger.json"));

        env::set_var(ENV_THRESHOLD, "lots");
        let cfg = WatcherConfig::load_default().unwrap();
        assert_eq!(cfg.scoring.threshold, 3);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(WatcherConfig::load_default().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var(ENV_THRESHOLD);
        env::remove_var(ENV_LEDGER_PATH);
        env::set_current_dir(&old).unwrap();
    }
}
