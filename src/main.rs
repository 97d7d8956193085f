//! arxiv-watcher: binary entrypoint.
//! Fetches the recent arXiv window, reports new matches once, and can build
//! or install the launchd job that runs it daily.

use anyhow::{Context, Result};
use arxiv_watcher::config::{self, expand_tilde, WatcherConfig};
use arxiv_watcher::feed::arxiv::ArxivFeed;
use arxiv_watcher::feed::{FeedQuery, Lookback};
use arxiv_watcher::ledger::Ledger;
use arxiv_watcher::metrics::Metrics;
use arxiv_watcher::patterns::{PatternCategory, PatternSet};
use arxiv_watcher::pipeline::{self, RunSettings, Sinks};
use arxiv_watcher::report::{self, ReportOptions};
use arxiv_watcher::schedule::{self, PlistSpec};
use arxiv_watcher::sink::csv_log::CsvLog;
use arxiv_watcher::sink::desktop::DesktopNotifier;
use arxiv_watcher::sink::discord::DiscordNotifier;
use arxiv_watcher::sink::download::PdfDownloader;
use arxiv_watcher::sink::email::EmailNotifier;
use arxiv_watcher::sink::slack::SlackNotifier;
use arxiv_watcher::sink::NotifierMux;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LOG_FILTER: &str =
    "warn,pipeline=info,feed=info,ledger=info,patterns=info,schedule=info,config=info,notify=info";

/// Watch arXiv for new preprints matching keyword and author patterns.
#[derive(Parser, Debug)]
#[command(name = "arxiv-watcher", version, about)]
struct Cli {
    /// TOML config; defaults to $WATCHER_CONFIG_PATH or config/watcher.toml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lookback window in hours. Without --hours/--since it is derived from the last run.
    #[arg(long, conflicts_with = "since")]
    hours: Option<u32>,

    /// Everything updated since this date (YYYY-MM-DD, 00:00 UTC).
    #[arg(long, value_parser = parse_date)]
    since: Option<NaiveDate>,

    /// Directory for downloaded PDFs.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Results per feed page.
    #[arg(long)]
    max: Option<usize>,

    /// Desktop notification for each hit.
    #[arg(long)]
    notify: bool,

    /// CSV hit log.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Do not download PDFs.
    #[arg(long)]
    dry: bool,

    /// Only keep hits with total score >= this value.
    #[arg(long)]
    min_score: Option<u32>,

    /// Number of hits to print (-1 for all).
    #[arg(long = "print", default_value_t = report::DEFAULT_PRINT, allow_negative_numbers = true)]
    print_n: i64,

    /// Max authors shown in the console (the CSV keeps its own cap).
    #[arg(long, default_value_t = report::DEFAULT_PRINT_AUTHORS)]
    print_authors: usize,

    /// Do not print the authors line.
    #[arg(long)]
    no_authors: bool,

    /// Wrap console lines to this width (0 = terminal width).
    #[arg(long, default_value_t = 0)]
    print_width: usize,

    /// Truncate console titles to this many characters (0 = no limit).
    #[arg(long, default_value_t = report::DEFAULT_MAX_TITLE)]
    max_title: usize,

    /// Also write a Markdown report of the run.
    #[arg(long)]
    report_md: Option<PathBuf>,

    /// arXiv search_query override.
    #[arg(long)]
    query: Option<String>,

    /// Keyword pattern file.
    #[arg(long)]
    keywords: Option<PathBuf>,

    /// Author pattern file.
    #[arg(long)]
    authors: Option<PathBuf>,

    /// Dedup ledger (JSON).
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Write Prometheus metrics for the run to this file.
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// Build a LaunchAgent plist in the current directory and exit. The job
    /// runs from this directory with absolute config and pattern paths.
    #[arg(long)]
    build_plist: bool,

    /// Build, install into ~/Library/LaunchAgents and load the plist, then exit.
    #[arg(long)]
    install_plist: bool,

    /// Daily run time for the LaunchAgent (HH:MM, 24h).
    #[arg(long, default_value = schedule::DEFAULT_SCHEDULE)]
    schedule: String,

    /// LaunchAgent label, also the plist file name.
    #[arg(long, default_value = schedule::DEFAULT_LABEL)]
    label: String,

    /// Lookback hours passed to scheduled runs.
    #[arg(long, default_value_t = schedule::DEFAULT_HOURS_LOOKBACK)]
    hours_lookback: u32,

    /// Extra periodic run in seconds via StartInterval (0 disables).
    #[arg(long, default_value_t = schedule::DEFAULT_BACKOFF_INTERVAL)]
    backoff_interval: u64,

    /// Directory for the LaunchAgent's stdout/stderr logs.
    #[arg(long)]
    logs_dir: Option<PathBuf>,

    /// Leave --notify out of the scheduled command.
    #[arg(long)]
    no_notify: bool,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

/// Logs go to stderr; `WATCHER_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("WATCHER_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<WatcherConfig> {
    let mut cfg = match &cli.config {
        Some(p) => {
            let mut c = WatcherConfig::load_from(p)?;
            c.apply_env();
            c
        }
        None => WatcherConfig::load_default()?,
    };

    if let Some(q) = &cli.query {
        cfg.feed.query = q.clone();
    }
    if let Some(m) = cli.max {
        cfg.feed.page_size = m.max(1);
    }
    if let Some(p) = &cli.keywords {
        cfg.patterns.keywords = expand_tilde(p);
    }
    if let Some(p) = &cli.authors {
        cfg.patterns.authors = expand_tilde(p);
    }
    if let Some(t) = cli.min_score {
        cfg.scoring.threshold = t;
    }
    if let Some(p) = &cli.ledger {
        cfg.ledger.path = expand_tilde(p);
    }
    if let Some(p) = &cli.out {
        cfg.output.out_dir = expand_tilde(p);
    }
    if let Some(p) = &cli.csv {
        cfg.output.csv = expand_tilde(p);
    }
    if let Some(p) = &cli.report_md {
        cfg.output.report_md = Some(expand_tilde(p));
    }
    if cli.notify {
        cfg.notify.desktop = true;
    }
    Ok(cfg)
}

fn build_notifier(cfg: &WatcherConfig) -> NotifierMux {
    let mut mux = NotifierMux::new();
    if cfg.notify.desktop {
        mux = mux.with(Box::new(DesktopNotifier::new()));
    }
    let slack = cfg
        .notify
        .slack_webhook
        .clone()
        .map(SlackNotifier::new)
        .or_else(SlackNotifier::from_env);
    if let Some(s) = slack {
        mux = mux.with(Box::new(s));
    }
    if let Some(d) = DiscordNotifier::from_config(&cfg.notify) {
        mux = mux.with(Box::new(d));
    }
    if cfg.notify.email {
        match EmailNotifier::from_env() {
            Ok(Some(e)) => mux = mux.with(Box::new(e)),
            Ok(None) => warn!(target: "notify", "email enabled but SMTP_HOST is not set"),
            Err(e) => warn!(target: "notify", error = %e, "email notifier disabled"),
        }
    }
    if !mux.is_empty() {
        info!(target: "notify", channels = ?mux.channel_names(), "notifications enabled");
    }
    mux
}

fn plist_only(cli: &Cli, cfg: &WatcherConfig) -> Result<()> {
    let (hour, minute) = schedule::parse_hhmm(&cli.schedule)?;
    let log_dir = match &cli.logs_dir {
        Some(p) => expand_tilde(p),
        None => dirs::home_dir()
            .context("cannot resolve home directory")?
            .join("Library")
            .join("Logs"),
    };
    let cwd = std::env::current_dir().context("resolving current directory")?;
    let config_path = match &cli.config {
        Some(p) => Some(expand_tilde(p)),
        None => config::default_config_path()?,
    };
    let spec = PlistSpec {
        label: cli.label.clone(),
        hour,
        minute,
        hours_lookback: cli.hours_lookback,
        out_dir: cfg.output.out_dir.clone(),
        notify: !cli.no_notify,
        program: std::env::current_exe().context("resolving watcher executable")?,
        log_dir,
        start_interval: cli.backoff_interval,
        working_dir: cwd.clone(),
        config: config_path,
        keywords: cfg.patterns.keywords.clone(),
        authors: cfg.patterns.authors.clone(),
    }
    .anchored();
    let plist = schedule::write_plist(&spec, &cwd)?;
    println!("Built plist: {}", plist.display());

    if cli.install_plist {
        let dest = schedule::install_plist(&plist)?;
        println!("Installed & loaded: {}", dest.display());
        println!(
            "Tip: run `launchctl kickstart -k gui/$(id -u)/{}` to trigger a run now.",
            spec.label
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; SMTP and webhook settings usually live there.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = load_config(&cli).context("loading configuration")?;

    if cli.build_plist || cli.install_plist {
        return plist_only(&cli, &cfg);
    }

    let metrics = match &cli.metrics_file {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    let keywords = PatternSet::load_or_empty(PatternCategory::Keyword, &cfg.patterns.keywords);
    let authors = PatternSet::load_or_empty(PatternCategory::Author, &cfg.patterns.authors);
    if keywords.is_empty() && authors.is_empty() {
        warn!(
            target: "patterns",
            keywords = %cfg.patterns.keywords.display(),
            authors = %cfg.patterns.authors.display(),
            "no patterns loaded; every score will be 0"
        );
    }

    let mut ledger = Ledger::load_or_empty(&cfg.ledger.path).with_capacity(cfg.ledger.capacity);

    let now = Utc::now();
    let lookback = Lookback::resolve(cli.hours, cli.since, ledger.last_success(), now);
    let mut query = FeedQuery::new(cfg.feed.query.clone(), lookback, now)
        .with_page_size(cfg.feed.page_size);
    if let Some(m) = cfg.feed.max_pages {
        query.max_pages = m;
    }

    let feed = ArxivFeed::http(Duration::from_secs(cfg.feed.timeout_secs))?;
    let sinks = Sinks {
        downloader: if cli.dry {
            None
        } else {
            Some(PdfDownloader::new(
                cfg.output.out_dir.clone(),
                Duration::from_secs(cfg.output.download_timeout_secs),
            )?)
        },
        csv: Some(CsvLog::new(cfg.output.csv.clone())),
        notifier: build_notifier(&cfg),
    };
    let settings = RunSettings {
        weights: cfg.scoring.weights(),
        threshold: cfg.scoring.threshold,
    };

    let result = pipeline::run(&feed, &query, &keywords, &authors, &mut ledger, settings, &sinks).await;

    if let (Some(m), Some(path)) = (&metrics, &cli.metrics_file) {
        if let Err(e) = m.write_textfile(path) {
            warn!(target: "pipeline", error = %e, "metrics textfile not written");
        }
    }

    let outcome = match result {
        Ok(o) => o,
        Err(e) => {
            error!(target: "pipeline", error = %e, "run aborted; ledger unchanged");
            return Err(e.into());
        }
    };

    let scope = lookback.scope();
    println!("{}\n", report::found_line(outcome.hits.len(), &scope));

    let opts = ReportOptions {
        print_n: cli.print_n,
        print_authors: cli.print_authors,
        show_authors: !cli.no_authors,
        width: if cli.print_width > 0 {
            cli.print_width
        } else {
            report::term_width()
        },
        max_title: cli.max_title,
    };
    print!("{}", report::render_console(&outcome.hits, &opts));

    if let Some(path) = &cfg.output.report_md {
        let md = report::render_markdown(&outcome.hits, &scope, &opts, Utc::now());
        match report::write_markdown(path, &md) {
            Ok(()) => println!("Wrote Markdown report to: {}", path.display()),
            Err(e) => warn!(target: "pipeline", error = %e, "markdown report not written"),
        }
    }
    Ok(())
}
