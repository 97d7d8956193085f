// src/scoring.rs
//! Scoring engine: applies keyword and author pattern sets to a normalized
//! record and returns a structured, reproducible breakdown.
//!
//! Each distinct pattern contributes at most once, no matter how often it
//! occurs. Keyword patterns run against `Record::searchable_text`; author
//! patterns run against each entry of `Record::author_keys`, and one matching
//! author is enough. The score is a weighted sum of the two hit counts with
//! weights 1:1 unless configured otherwise.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::patterns::PatternSet;
use crate::record::Record;

/// Per-category multipliers. `Default` is the unweighted 1:1 sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_weight")]
    pub keyword: u32,
    #[serde(default = "default_weight")]
    pub author: u32,
}

fn default_weight() -> u32 {
    1
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            keyword: 1,
            author: 1,
        }
    }
}

impl ScoreWeights {
    pub fn is_unweighted(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub keyword_hits: u32,
    pub author_hits: u32,
    pub score: u32,
    /// Pattern strings that fired, in pattern-set order.
    pub matched_keywords: Vec<String>,
    pub matched_authors: Vec<String>,
    /// Weighted contributions; equal to the hit counts at default weights.
    pub keyword_score: u32,
    pub author_score: u32,
}

impl MatchResult {
    /// `"{score} = kw{K}+au{A}"`
    pub fn explain(&self) -> String {
        format!(
            "{} = kw{}+au{}",
            self.score, self.keyword_score, self.author_score
        )
    }

    pub fn is_match(&self) -> bool {
        self.score > 0
    }
}

/// Unweighted scoring (keyword_hits + author_hits).
pub fn score(record: &Record, keywords: &PatternSet, authors: &PatternSet) -> MatchResult {
    score_weighted(record, keywords, authors, ScoreWeights::default())
}

pub fn score_weighted(
    record: &Record,
    keywords: &PatternSet,
    authors: &PatternSet,
    weights: ScoreWeights,
) -> MatchResult {
    let matched_keywords: Vec<String> = if record.searchable_text.is_empty() {
        Vec::new()
    } else {
        keywords
            .iter()
            .filter(|p| p.matches(&record.searchable_text))
            .map(|p| p.as_str().to_string())
            .collect()
    };

    let matched_authors: Vec<String> = authors
        .iter()
        .filter(|p| record.author_keys.iter().any(|name| p.matches(name)))
        .map(|p| p.as_str().to_string())
        .collect();

    let keyword_hits = matched_keywords.len() as u32;
    let author_hits = matched_authors.len() as u32;
    let keyword_score = keyword_hits.saturating_mul(weights.keyword);
    let author_score = author_hits.saturating_mul(weights.author);
    let score = keyword_score.saturating_add(author_score);

    trace!(
        target: "scoring",
        id = %record.id,
        keyword_hits,
        author_hits,
        score,
        "scored record"
    );

    MatchResult {
        keyword_hits,
        author_hits,
        score,
        matched_keywords,
        matched_authors,
        keyword_score,
        author_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternCategory;
    use crate::record::{normalize, RawEntry};

    fn kw(lines: &str) -> PatternSet {
        PatternSet::from_str_lines(PatternCategory::Keyword, lines)
    }

    fn au(lines: &str) -> PatternSet {
        PatternSet::from_str_lines(PatternCategory::Author, lines)
    }

    fn rec(title: &str, summary: &str, authors: &[&str]) -> Record {
        normalize(RawEntry {
            id: Some("http://arxiv.org/abs/2507.13445v1".into()),
            title: Some(title.into()),
            summary: Some(summary.into()),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn kaon_ckm_grossman_scenario() {
        let r = rec(
            "CP violation in K decays",
            "We constrain the CKM phase using rare decays.",
            &["Y. Grossman", "T. Kitahara"],
        );
        let m = score(&r, &kw("kaon\nCKM"), &au("grossman"));
        assert_eq!(m.keyword_hits, 1);
        assert_eq!(m.author_hits, 1);
        assert_eq!(m.score, 2);
        assert_eq!(m.matched_keywords, vec!["ckm"]);
        assert_eq!(m.matched_authors, vec!["grossman"]);
        assert_eq!(m.explain(), "2 = kw1+au1");
    }

    #[test]
    fn repeated_occurrences_count_once() {
        let r = rec("Kaon kaon KAON", "kaons everywhere", &[]);
        let m = score(&r, &kw("kaon"), &au(""));
        assert_eq!(m.keyword_hits, 1);
        assert_eq!(m.score, 1);
    }

    #[test]
    fn one_author_pattern_matching_several_authors_counts_once() {
        let r = rec("t", "s", &["A. Buras", "B. Buras"]);
        let m = score(&r, &kw(""), &au("buras"));
        assert_eq!(m.author_hits, 1);
    }

    #[test]
    fn empty_inputs_score_zero() {
        let empty = rec("", "", &[]);
        let m = score(&empty, &kw("kaon"), &au("grossman"));
        assert_eq!(m, MatchResult::default());
        assert!(!m.is_match());

        let full = rec("Kaon physics", "CKM", &["Y. Grossman"]);
        let m = score(&full, &kw(""), &au(""));
        assert_eq!(m.score, 0);
    }

    #[test]
    fn author_patterns_do_not_see_the_abstract() {
        let r = rec("On work by Grossman", "Grossman et al. showed", &["Someone Else"]);
        let m = score(&r, &kw(""), &au("grossman"));
        assert_eq!(m.author_hits, 0);
    }

    #[test]
    fn weights_scale_contributions() {
        let r = rec("kaon", "", &["Y. Grossman"]);
        let w = ScoreWeights {
            keyword: 1,
            author: 2,
        };
        let m = score_weighted(&r, &kw("kaon"), &au("grossman"), w);
        assert_eq!(m.keyword_hits, 1);
        assert_eq!(m.author_hits, 1);
        assert_eq!(m.score, 3);
        assert_eq!(m.explain(), "3 = kw1+au2");
        assert!(!w.is_unweighted());
        assert!(ScoreWeights::default().is_unweighted());
    }

    #[test]
    fn invariant_under_author_case_and_abstract_whitespace() {
        let k = kw("rare kaon decays\nckm");
        let a = au("grossman");
        let base = score(
            &rec("T", "rare kaon decays and CKM", &["Y. Grossman"]),
            &k,
            &a,
        );
        let noisy = score(
            &rec("T", "  rare   kaon\n\tdecays  and   CKM  ", &["Y. GROSSMAN"]),
            &k,
            &a,
        );
        assert_eq!(base, noisy);
        assert_eq!(base.score, 3);
    }
}
