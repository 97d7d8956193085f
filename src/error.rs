// src/error.rs
//! Error taxonomy for the watcher.
//!
//! Each variant maps to one recovery policy:
//! - `PatternSource`: the pattern file could not be read; callers degrade to an empty set.
//! - `MalformedRecord`: one feed entry lacks an identifier; it is skipped and counted.
//! - `LedgerIo`: the ledger could not be read or written; reads degrade to an empty ledger.
//! - `FeedFetch`: the feed request failed; the run aborts before any output or commit.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    /// Pattern file exists but cannot be read
    #[error("pattern source {path} unreadable: {source}")]
    PatternSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Feed entry without an identifier
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Ledger store read/write failure
    #[error("ledger {path}: {reason}")]
    LedgerIo { path: PathBuf, reason: String },

    /// Feed collaborator failure (network, HTTP status, XML)
    #[error("feed fetch failed: {0}")]
    FeedFetch(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Schedule descriptor build/install failure
    #[error("schedule error: {0}")]
    Schedule(String),
}

impl WatchError {
    pub fn ledger(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::LedgerIo {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that must abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FeedFetch(_) | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
