// src/ranking.rs
//! Threshold filter and deterministic ordering of scored records.

use serde::Serialize;
use std::cmp::Ordering;

use crate::record::Record;
use crate::scoring::MatchResult;

pub const DEFAULT_THRESHOLD: u32 = 1;

/// A scored record on its way to the sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub record: Record,
    pub result: MatchResult,
}

impl Hit {
    pub fn new(record: Record, result: MatchResult) -> Self {
        Self { record, result }
    }

    pub fn score(&self) -> u32 {
        self.result.score
    }
}

/// Newer first; records without a timestamp sort after dated ones.
fn cmp_published_desc(a: &Record, b: &Record) -> Ordering {
    match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Total order: score desc, published_at desc, id asc.
pub fn compare(a: &Hit, b: &Hit) -> Ordering {
    b.score()
        .cmp(&a.score())
        .then_with(|| cmp_published_desc(&a.record, &b.record))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Drop hits with `score < threshold`, then sort by `compare`.
/// A threshold of 0 keeps every hit, including zero scores.
pub fn rank(hits: Vec<Hit>, threshold: u32) -> Vec<Hit> {
    let mut kept: Vec<Hit> = hits
        .into_iter()
        .filter(|h| h.score() >= threshold)
        .collect();
    kept.sort_by(compare);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{normalize, RawEntry};

    fn hit(id: &str, score: u32, published: Option<&str>) -> Hit {
        let record = normalize(RawEntry {
            id: Some(id.to_string()),
            published: published.map(str::to_string),
            ..Default::default()
        })
        .unwrap();
        Hit::new(
            record,
            MatchResult {
                keyword_hits: score,
                score,
                keyword_score: score,
                ..Default::default()
            },
        )
    }

    fn ids(hits: &[Hit]) -> Vec<&str> {
        hits.iter().map(|h| h.record.id.as_str()).collect()
    }

    #[test]
    fn orders_by_score_then_date_then_id() {
        let hits = vec![
            hit("2507.00003", 1, Some("2025-07-17T10:00:00Z")),
            hit("2507.00002", 2, Some("2025-07-16T10:00:00Z")),
            hit("2507.00001", 1, Some("2025-07-17T10:00:00Z")),
            hit("2507.00004", 1, Some("2025-07-18T10:00:00Z")),
            hit("2507.00005", 1, None),
        ];
        let ranked = rank(hits, 1);
        assert_eq!(
            ids(&ranked),
            vec!["2507.00002", "2507.00004", "2507.00001", "2507.00003", "2507.00005"]
        );
    }

    #[test]
    fn threshold_filters_low_scores() {
        let hits = vec![hit("a", 0, None), hit("b", 1, None), hit("c", 3, None)];
        assert_eq!(ids(&rank(hits.clone(), 1)), vec!["c", "b"]);
        assert_eq!(ids(&rank(hits.clone(), 3)), vec!["c"]);
        assert_eq!(ids(&rank(hits, 0)), vec!["c", "b", "a"]);
    }

    #[test]
    fn ranking_is_independent_of_input_order() {
        let a = vec![hit("x", 2, None), hit("y", 2, None), hit("z", 1, None)];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(rank(a, 1), rank(b, 1));
    }
}
