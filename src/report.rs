// src/report.rs
//! Human-facing renderings of a run: the console listing and the optional
//! Markdown report.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;

use crate::ranking::Hit;

pub const DEFAULT_PRINT: i64 = 50;
pub const DEFAULT_PRINT_AUTHORS: usize = 6;
pub const DEFAULT_MAX_TITLE: usize = 140;
const FALLBACK_WIDTH: usize = 120;
const INDENT: &str = "     ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    /// Hits to print; negative means all.
    pub print_n: i64,
    pub print_authors: usize,
    pub show_authors: bool,
    /// Wrap width; 0 disables wrapping.
    pub width: usize,
    /// Console title cap in characters; 0 disables truncation.
    pub max_title: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            print_n: DEFAULT_PRINT,
            print_authors: DEFAULT_PRINT_AUTHORS,
            show_authors: true,
            width: FALLBACK_WIDTH,
            max_title: DEFAULT_MAX_TITLE,
        }
    }
}

/// `"A, B, C"` or `"A, B, et al."` once the list is longer than `max`.
pub fn format_authors(authors: &[String], max: usize) -> String {
    if authors.len() <= max {
        return authors.join(", ");
    }
    if max == 0 {
        return "et al.".to_string();
    }
    format!("{}, et al.", authors[..max].join(", "))
}

pub fn truncate_title(title: &str, max: usize) -> String {
    if max == 0 || title.chars().count() <= max {
        return title.to_string();
    }
    let mut out: String = title.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Terminal width from `COLUMNS`, else 120.
pub fn term_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|w| *w > 0)
        .unwrap_or(FALLBACK_WIDTH)
}

/// Greedy word wrap; continuation lines are indented to line up under the
/// listing. Words longer than `width` are split.
pub fn wrap_line(s: &str, width: usize) -> String {
    if width == 0 {
        return s.to_string();
    }
    let mut lines: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for word in s.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if cur_len > 0 {
                lines.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let wlen = word.len();
        if cur_len > 0 && cur_len + 1 + wlen > width {
            lines.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if cur_len > 0 {
            cur.push(' ');
            cur_len += 1;
        }
        cur.extend(word);
        cur_len += wlen;
    }
    if cur_len > 0 {
        lines.push(cur);
    }
    lines.join(&format!("\n{INDENT}"))
}

pub fn found_line(n: usize, scope: &str) -> String {
    format!("Found {n} matching entries{scope}.")
}

fn shown<'a>(hits: &'a [Hit], print_n: i64) -> &'a [Hit] {
    if print_n < 0 {
        hits
    } else {
        &hits[..hits.len().min(print_n as usize)]
    }
}

/// Console listing for the hits selected by `opts.print_n`.
pub fn render_console(hits: &[Hit], opts: &ReportOptions) -> String {
    let mut out = String::new();
    for hit in shown(hits, opts.print_n) {
        let r = &hit.record;
        let header = format!(
            "[{}] {}",
            hit.result.explain(),
            truncate_title(&r.title, opts.max_title)
        );
        let _ = writeln!(out, "{}", wrap_line(&header, opts.width));
        let _ = writeln!(out, "{INDENT}{}", r.abs_url);
        if !r.pdf_url.is_empty() {
            let _ = writeln!(out, "{INDENT}PDF: {}", r.pdf_url);
        }
        let authors = format_authors(&r.authors, opts.print_authors);
        if opts.show_authors && !authors.is_empty() {
            let _ = writeln!(
                out,
                "{INDENT}Authors: {}",
                wrap_line(&authors, opts.width)
            );
        }
        out.push('\n');
    }
    out
}

pub fn render_markdown(hits: &[Hit], scope: &str, opts: &ReportOptions, at: DateTime<Utc>) -> String {
    let mut out = format!(
        "# arXiv Watch — {}\n\nFound **{}** matching entries{}.\n\n",
        at.format("%Y-%m-%d %H:%M UTC"),
        hits.len(),
        scope
    );
    let items: Vec<String> = shown(hits, opts.print_n)
        .iter()
        .map(|hit| {
            let r = &hit.record;
            let mut md = vec![
                format!("- **{}**", r.title),
                format!("  Score: `{}`", hit.result.explain()),
                format!("  Link: {}", r.abs_url),
            ];
            if !r.pdf_url.is_empty() {
                md.push(format!("  PDF: {}", r.pdf_url));
            }
            let authors = format_authors(&r.authors, opts.print_authors);
            if opts.show_authors && !authors.is_empty() {
                md.push(format!("  Authors: {authors}"));
            }
            md.join("  \n")
        })
        .collect();
    out.push_str(&items.join("\n"));
    out.push('\n');
    out
}

pub fn write_markdown(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, body).with_context(|| format!("writing report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{normalize, RawEntry};
    use crate::scoring::MatchResult;

    fn names(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("A{i}")).collect()
    }

    fn hit(title: &str, authors: Vec<String>) -> Hit {
        let record = normalize(RawEntry {
            id: Some("http://arxiv.org/abs/2507.13445v1".into()),
            title: Some(title.into()),
            authors,
            abs_url: Some("http://arxiv.org/abs/2507.13445v1".into()),
            pdf_url: Some("http://arxiv.org/pdf/2507.13445v1".into()),
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
    fn authors_shortened() {
        assert_eq!(format_authors(&[], 3), "");
        assert_eq!(format_authors(&names(3), 3), "A1, A2, A3");
        assert_eq!(format_authors(&names(4), 3), "A1, A2, A3, et al.");
        assert_eq!(format_authors(&names(2), 0), "et al.");
        assert_eq!(format_authors(&[], 0), "");
    }

    #[test]
    fn title_truncation() {
        assert_eq!(truncate_title("abcdef", 0), "abcdef");
        assert_eq!(truncate_title("abcdef", 6), "abcdef");
        assert_eq!(truncate_title("abcdef", 4), "abc…");
    }

    #[test]
    fn wrapping_indents_continuations() {
        assert_eq!(wrap_line("one two three", 0), "one two three");
        assert_eq!(wrap_line("one two three", 7), "one two\n     three");
        assert_eq!(wrap_line("abcdefghij", 4), "abcd\n     efgh\n     ij");
    }

    #[test]
    fn console_block() {
        let opts = ReportOptions {
            print_authors: 1,
            width: 0,
            ..Default::default()
        };
        let out = render_console(&[hit("CP violation in K decays", names(2))], &opts);
        assert_eq!(
            out,
            "[2 = kw1+au1] CP violation in K decays\n     http://arxiv.org/abs/2507.13445v1\n     PDF: http://arxiv.org/pdf/2507.13445v1\n     Authors: A1, et al.\n\n"
        );
    }

    #[test]
    fn print_limit_and_no_authors() {
        let hits = vec![hit("a", names(1)), hit("b", names(1))];
        let opts = ReportOptions {
            print_n: 1,
            show_authors: false,
            width: 0,
            ..Default::default()
        };
        let out = render_console(&hits, &opts);
        assert_eq!(out.matches("[2 = kw1+au1]").count(), 1);
        assert!(!out.contains("Authors:"));

        let all = ReportOptions { print_n: -1, ..opts };
        assert_eq!(render_console(&hits, &all).matches("[2 = kw1+au1]").count(), 2);
    }

    #[test]
    fn markdown_header_and_items() {
        let at = DateTime::parse_from_rfc3339("2025-07-18T09:30:00Z").unwrap().with_timezone(&Utc);
        let md = render_markdown(&[hit("CP violation", names(1))], " in the last 24h", &ReportOptions::default(), at);
        assert!(md.starts_with("# arXiv Watch — 2025-07-18 09:30 UTC\n\nFound **1** matching entries in the last 24h.\n\n"));
        assert!(md.contains("- **CP violation**  \n  Score: `2 = kw1+au1`  \n  Link: http://arxiv.org/abs/2507.13445v1"));
        assert!(md.contains("  Authors: A1\n"));
    }
}
