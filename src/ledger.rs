// src/ledger.rs
//! Dedup ledger: durable `{id: first reported at}` map shared by successive runs.
//!
//! Reads happen once at start, `mark_reported` only stages ids in memory, and
//! `commit` writes everything in one atomic replace at the end of a successful
//! run. A run that fails before `commit` leaves the file untouched.
//!
//! Degraded read: an unreadable or corrupt ledger is treated as empty by
//! `load_or_empty` (and logged at WARN). The bad file is moved aside to
//! `<name>.corrupt` so the next commit does not overwrite it. The cost is
//! possible re-reporting of old ids.
//! There is no locking; one invocation at a time is assumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, WatchError};
use crate::record::canonical_id;

pub const DEFAULT_LEDGER_CAPACITY: usize = 5_000;

/// On-disk shape. `seen_ids`/`last_success_iso` are accepted from the older
/// state-file format and folded into `reported` on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    last_success: Option<DateTime<Utc>>,
    #[serde(default)]
    reported: BTreeMap<String, DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    seen_ids: Vec<String>,
    #[serde(default, skip_serializing)]
    last_success_iso: Option<String>,
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    capacity: usize,
    last_success: Option<DateTime<Utc>>,
    reported: BTreeMap<String, DateTime<Utc>>,
    staged: BTreeMap<String, DateTime<Utc>>,
}

impl Ledger {
    /// Empty ledger bound to `path`; nothing touches disk until `commit`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capacity: DEFAULT_LEDGER_CAPACITY,
            last_success: None,
            reported: BTreeMap::new(),
            staged: BTreeMap::new(),
        }
    }

    /// Cap on stored ids; the oldest are dropped on commit. 0 = unlimited.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Read the ledger. A missing file is an empty ledger, not an error.
    pub fn load(path: &Path) -> Result<Self> {
        let mut ledger = Self::new(path);
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(target: "ledger", path = %path.display(), "no ledger yet");
                return Ok(ledger);
            }
            Err(e) => return Err(WatchError::ledger(path, e)),
        };
        if content.trim().is_empty() {
            return Ok(ledger);
        }

        let file: LedgerFile =
            serde_json::from_str(&content).map_err(|e| WatchError::ledger(path, e))?;

        let legacy_success = file
            .last_success_iso
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        ledger.last_success = file.last_success.or(legacy_success);
        ledger.reported = file.reported;

        let legacy_ts = ledger.last_success.unwrap_or_default();
        for id in file.seen_ids {
            let id = canonical_id(&id).unwrap_or(id);
            ledger.reported.entry(id).or_insert(legacy_ts);
        }

        debug!(target: "ledger", path = %path.display(), ids = ledger.reported.len(), "ledger loaded");
        Ok(ledger)
    }

    /// `load` with the degraded mode applied.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    target: "ledger",
                    error = %e,
                    "ledger unreadable; continuing with an empty ledger (previously reported ids may be reported again)"
                );
                if path.is_file() {
                    let aside = sibling_path(path, ".corrupt");
                    match fs::rename(path, &aside) {
                        Ok(()) => warn!(target: "ledger", kept = %aside.display(), "unreadable ledger moved aside"),
                        Err(e) => warn!(target: "ledger", error = %e, "could not move unreadable ledger aside"),
                    }
                }
                Self::new(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Committed ids (staged ones excluded).
    pub fn known_ids(&self) -> HashSet<String> {
        self.reported.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// True when `id` was neither committed earlier nor staged in this run.
    pub fn is_new(&self, id: &str) -> bool {
        !self.reported.contains_key(id) && !self.staged.contains_key(id)
    }

    pub fn reported_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.reported
            .get(id)
            .or_else(|| self.staged.get(id))
            .copied()
    }

    /// Stage `id` as reported at `at`. Already known ids keep their first timestamp.
    pub fn mark_reported(&mut self, id: &str, at: DateTime<Utc>) {
        if self.is_new(id) {
            self.staged.insert(id.to_string(), at);
        }
    }

    /// Merge staged ids, stamp `last_success`, trim to capacity and write
    /// atomically (temp file + rename).
    pub fn commit(&mut self, run_at: DateTime<Utc>) -> Result<()> {
        let mut reported = self.reported.clone();
        reported.extend(self.staged.iter().map(|(k, v)| (k.clone(), *v)));
        trim_to_capacity(&mut reported, self.capacity);

        let file = LedgerFile {
            last_success: Some(run_at),
            reported,
            ..Default::default()
        };
        let body = serde_json::to_string_pretty(&file).map_err(|e| WatchError::ledger(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| WatchError::ledger(&self.path, e))?;
        }
        let tmp = sibling_path(&self.path, ".tmp");
        fs::write(&tmp, body).map_err(|e| WatchError::ledger(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| WatchError::ledger(&self.path, e))?;

        info!(
            target: "ledger",
            path = %self.path.display(),
            added = self.staged.len(),
            total = file.reported.len(),
            "ledger committed"
        );
        self.reported = file.reported;
        self.staged.clear();
        self.last_success = Some(run_at);
        Ok(())
    }
}

/// `state.json` + `.tmp` → `state.json.tmp`, in the same directory.
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "ledger.json".into());
    name.push(suffix);
    path.with_file_name(name)
}

/// Keep the newest `capacity` ids (by timestamp, then id).
fn trim_to_capacity(reported: &mut BTreeMap<String, DateTime<Utc>>, capacity: usize) {
    if capacity == 0 || reported.len() <= capacity {
        return;
    }
    let mut by_age: Vec<(DateTime<Utc>, String)> =
        reported.iter().map(|(k, v)| (*v, k.clone())).collect();
    by_age.sort();
    let excess = by_age.len() - capacity;
    for (_, id) in by_age.into_iter().take(excess) {
        reported.remove(&id);
    }
}
