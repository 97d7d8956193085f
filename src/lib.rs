// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod feed;
pub mod ledger;
pub mod metrics;
pub mod patterns;
pub mod pipeline;
pub mod ranking;
pub mod record;
pub mod report;
pub mod schedule;
pub mod scoring;
pub mod sink;

// ---- Re-exports for stable public API ----
pub use crate::error::{Result, WatchError};
pub use crate::ledger::Ledger;
pub use crate::patterns::{Pattern, PatternCategory, PatternSet};
pub use crate::pipeline::{evaluate, run, RunOutcome, RunSettings, RunSummary, Sinks};
pub use crate::ranking::{rank, Hit};
pub use crate::record::{normalize, RawEntry, Record};
pub use crate::scoring::{score, score_weighted, MatchResult, ScoreWeights};
