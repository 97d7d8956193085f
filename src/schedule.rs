// src/schedule.rs
//! launchd schedule descriptor: builds the LaunchAgent plist that runs the
//! watcher daily (plus an optional `StartInterval`) and installs it with
//! `launchctl`.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::error::{Result, WatchError};

pub const DEFAULT_LABEL: &str = "com.arxiv.watcher";
pub const DEFAULT_SCHEDULE: &str = "09:30";
pub const DEFAULT_HOURS_LOOKBACK: u32 = 24;
pub const DEFAULT_BACKOFF_INTERVAL: u64 = 3600;

/// `"09:30"` → `(9, 30)`.
pub fn parse_hhmm(s: &str) -> Result<(u32, u32)> {
    let bad = || WatchError::Schedule(format!("schedule must be HH:MM, got {s:?}"));
    let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
    let h: u32 = h.trim().parse().map_err(|_| bad())?;
    let m: u32 = m.trim().parse().map_err(|_| bad())?;
    if h > 23 || m > 59 {
        return Err(WatchError::Schedule(format!(
            "hour must be 0-23 and minute 0-59, got {s:?}"
        )));
    }
    Ok((h, m))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlistSpec {
    pub label: String,
    pub hour: u32,
    pub minute: u32,
    pub hours_lookback: u32,
    pub out_dir: PathBuf,
    pub notify: bool,
    /// Watcher executable launchd should run.
    pub program: PathBuf,
    pub log_dir: PathBuf,
    /// Extra periodic run in seconds; 0 leaves `StartInterval` out.
    pub start_interval: u64,
    /// launchd starts agents in `/`; relative paths resolve against this.
    pub working_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub keywords: PathBuf,
    pub authors: PathBuf,
}

fn xml(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

fn xml_path(p: &Path) -> String {
    xml(&p.display().to_string())
}

impl PlistSpec {
    pub fn file_name(&self) -> String {
        format!("{}.plist", self.label)
    }

    /// Makes every path the scheduled run reads or writes absolute, relative
    /// ones taken against `working_dir`.
    pub fn anchored(mut self) -> Self {
        let base = self.working_dir.clone();
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        anchor(&mut self.program);
        anchor(&mut self.out_dir);
        anchor(&mut self.log_dir);
        anchor(&mut self.keywords);
        anchor(&mut self.authors);
        if let Some(c) = self.config.as_mut() {
            anchor(c);
        }
        self
    }

    pub fn render(&self) -> String {
        let mut args = vec![xml_path(&self.program)];
        if let Some(c) = &self.config {
            args.push("--config".to_string());
            args.push(xml_path(c));
        }
        args.extend([
            "--keywords".to_string(),
            xml_path(&self.keywords),
            "--authors".to_string(),
            xml_path(&self.authors),
            "--hours".to_string(),
            self.hours_lookback.to_string(),
            "--out".to_string(),
            xml_path(&self.out_dir),
        ]);
        if self.notify {
            args.push("--notify".to_string());
        }

        let mut out = String::new();
        out.push_str(concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\"\n",
            "   \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
            "<plist version=\"1.0\">\n",
            "<dict>\n"
        ));
        let _ = writeln!(out, "  <key>Label</key>\n  <string>{}</string>\n", xml(&self.label));
        let _ = writeln!(
            out,
            "  <key>StartCalendarInterval</key>\n  <dict>\n    <key>Hour</key>\n    <integer>{}</integer>\n    <key>Minute</key>\n    <integer>{}</integer>\n  </dict>\n",
            self.hour, self.minute
        );
        if self.start_interval > 0 {
            let _ = writeln!(
                out,
                "  <key>StartInterval</key>\n  <integer>{}</integer>\n",
                self.start_interval
            );
        }
        let _ = writeln!(
            out,
            "  <key>WorkingDirectory</key>\n  <string>{}</string>\n",
            xml_path(&self.working_dir)
        );
        out.push_str("  <key>ProgramArguments</key>\n  <array>\n");
        for a in &args {
            let _ = writeln!(out, "    <string>{a}</string>");
        }
        out.push_str("  </array>\n\n");
        let log_dir = xml_path(&self.log_dir);
        let _ = writeln!(
            out,
            "  <key>StandardOutPath</key>\n  <string>{log_dir}/arxiv_watcher.out</string>\n  <key>StandardErrorPath</key>\n  <string>{log_dir}/arxiv_watcher.err</string>\n"
        );
        out.push_str(concat!(
            "  <key>RunAtLoad</key>\n",
            "  <true/>\n",
            "  <key>KeepAlive</key>\n",
            "  <false/>\n",
            "</dict>\n",
            "</plist>\n"
        ));
        out
    }
}

/// Writes `{label}.plist` into `dir` and returns its path.
pub fn write_plist(spec: &PlistSpec, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(spec.file_name());
    fs::write(&path, spec.render())
        .map_err(|e| WatchError::Schedule(format!("writing {}: {e}", path.display())))?;
    info!(target: "schedule", path = %path.display(), label = %spec.label, "plist built");
    Ok(path)
}

fn launch_agents_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|h| h.join("Library").join("LaunchAgents"))
        .ok_or_else(|| WatchError::Schedule("cannot resolve home directory".into()))
}

fn current_uid() -> Result<String> {
    let out = Command::new("id")
        .arg("-u")
        .output()
        .map_err(|e| WatchError::Schedule(format!("running id -u: {e}")))?;
    let uid = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if !out.status.success() || uid.is_empty() {
        return Err(WatchError::Schedule("could not determine uid".into()));
    }
    Ok(uid)
}

/// Copies the plist into `~/Library/LaunchAgents`, unloads any previous job
/// with the same file and bootstraps the new one.
pub fn install_plist(plist: &Path) -> Result<PathBuf> {
    let agents = launch_agents_dir()?;
    fs::create_dir_all(&agents)
        .map_err(|e| WatchError::Schedule(format!("creating {}: {e}", agents.display())))?;
    let name = plist
        .file_name()
        .ok_or_else(|| WatchError::Schedule(format!("not a file: {}", plist.display())))?;
    let dest = agents.join(name);
    fs::copy(plist, &dest)
        .map_err(|e| WatchError::Schedule(format!("copying to {}: {e}", dest.display())))?;

    let domain = format!("gui/{}", current_uid()?);

    // Not loaded yet is fine.
    let bootout = Command::new("launchctl")
        .args(["bootout", &domain])
        .arg(&dest)
        .output();
    if let Ok(o) = bootout {
        debug!(target: "schedule", status = %o.status, "launchctl bootout");
    }

    let r = Command::new("launchctl")
        .args(["bootstrap", &domain])
        .arg(&dest)
        .output()
        .map_err(|e| WatchError::Schedule(format!("running launchctl: {e}")))?;
    if !r.status.success() {
        return Err(WatchError::Schedule(format!(
            "bootstrap failed: {}",
            String::from_utf8_lossy(&r.stderr).trim()
        )));
    }
    info!(target: "schedule", path = %dest.display(), "launch agent installed");
    Ok(dest)
}
