//! Line-level cleanup of extracted chapter text.
//!
//! Every rule is a best-effort heuristic. Short lines of real data (a lone
//! figure, a two-character heading) are dropped along with page furniture,
//! and unusual headers survive. Callers that need to audit the result read
//! [`CleanedText::dropped`] to see which rule removed which line.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;

pub const REASON_RUNNING_LINE: &str = "running_header_footer";
pub const REASON_TOO_SHORT: &str = "too_short";

const PATTERN_RULES: &[(&str, &str)] = &[
    ("page_number", r"^\d{1,4}$"),
    ("page_fraction", r"^\d{1,4}\s*/\s*\d{1,4}$"),
    ("dashed_page_number", r"^[-－—–]\s*\d{1,4}\s*[-－—–]$"),
    (
        "chinese_page_number",
        r"^第\s*\d{1,4}\s*页(?:\s*[,，/]?\s*共\s*\d{1,4}\s*页)?$",
    ),
    ("english_page_label", r"(?i)^page\s+\d{1,4}(?:\s+of\s+\d{1,4})?$"),
    (
        "boilerplate_header",
        r"(?i)^(?:公司|本公司|报告|年度报告|半年度报告|季度报告|年报|company|report|annual\s+report|\d{4}\s*年度?)$",
    ),
    (
        "report_title_repeat",
        r"^.{0,60}?\d{4}\s*年?\s*(?:年度|半年度|中期|第[一二三四1-4]季度|季度)报告(?:全文|摘要|正文)?$",
    ),
    (
        "report_title_repeat",
        r"(?i)^.{0,60}?\b\d{4}\s+(?:annual|interim|semi-annual|quarterly)\s+report\b.{0,20}$",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedLine {
    pub line: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedText {
    pub text: String,
    pub dropped: Vec<DroppedLine>,
}

#[derive(Debug)]
struct CleanRule {
    reason: &'static str,
    pattern: Regex,
}

#[derive(Debug)]
pub struct TextCleaner {
    rules: Vec<CleanRule>,
    min_line_chars: usize,
    running_lines: HashSet<String>,
}

impl TextCleaner {
    pub fn new(min_line_chars: usize) -> Result<Self> {
        let rules = PATTERN_RULES
            .iter()
            .map(|&(reason, pattern)| {
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile {reason} cleaning regex"))
                    .map(|pattern| CleanRule { reason, pattern })
            })
            .collect::<Result<Vec<CleanRule>>>()?;

        Ok(Self {
            rules,
            min_line_chars,
            running_lines: HashSet::new(),
        })
    }

    pub fn set_running_lines(&mut self, running_lines: HashSet<String>) {
        self.running_lines = running_lines;
    }

    pub fn drop_reason(&self, line: &str) -> Option<&'static str> {
        let trimmed = line.trim();
        if trimmed.is_empty() || line.contains('\t') {
            return None;
        }

        if self.running_lines.contains(&normalize_edge_line(trimmed)) {
            return Some(REASON_RUNNING_LINE);
        }

        if let Some(rule) = self.rules.iter().find(|rule| rule.pattern.is_match(trimmed)) {
            return Some(rule.reason);
        }

        if trimmed.chars().count() < self.min_line_chars {
            return Some(REASON_TOO_SHORT);
        }

        None
    }

    pub fn clean(&self, text: &str) -> CleanedText {
        let mut kept = Vec::<&str>::new();
        let mut dropped = Vec::new();

        for line in text.lines() {
            match self.drop_reason(line) {
                Some(reason) => dropped.push(DroppedLine {
                    line: line.trim().to_string(),
                    reason,
                }),
                None if line.contains('\t') => kept.push(line.trim_end_matches([' ', '\r'])),
                None => kept.push(line.trim()),
            }
        }

        CleanedText {
            text: collapse_blank_runs(&kept).trim().to_string(),
            dropped,
        }
    }
}

fn collapse_blank_runs(lines: &[&str]) -> String {
    let mut out = Vec::<&str>::with_capacity(lines.len());
    let mut previous_blank = false;
    for line in lines {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        out.push(if blank { "" } else { line });
        previous_blank = blank;
    }
    out.join("\n")
}

pub fn normalize_edge_line(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

pub fn detect_running_lines<'a, I>(pages: I, min_pages: usize) -> HashSet<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut counts = HashMap::<String, usize>::new();
    for lines in pages {
        let first = lines.iter().map(|line| line.trim()).find(|line| !line.is_empty());
        let last = lines
            .iter()
            .rev()
            .map(|line| line.trim())
            .find(|line| !line.is_empty());

        let mut seen_on_page = HashSet::<String>::new();
        for candidate in [first, last].into_iter().flatten() {
            if candidate.contains('\t') {
                continue;
            }
            let normalized = normalize_edge_line(candidate);
            if normalized.is_empty() || normalized.chars().count() > 120 {
                continue;
            }
            if seen_on_page.insert(normalized.clone()) {
                *counts.entry(normalized).or_insert(0) += 1;
            }
        }
    }

    counts
        .into_iter()
        .filter_map(|(candidate, count)| (count >= min_pages.max(2)).then_some(candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> TextCleaner {
        TextCleaner::new(4).expect("cleaning rules should compile")
    }

    #[test]
    fn page_number_forms_report_which_rule_fired() {
        let cleaner = cleaner();
        assert_eq!(cleaner.drop_reason("  12 "), Some("page_number"));
        assert_eq!(cleaner.drop_reason("12 / 230"), Some("page_fraction"));
        assert_eq!(cleaner.drop_reason("- 7 -"), Some("dashed_page_number"));
        assert_eq!(cleaner.drop_reason("—15—"), Some("dashed_page_number"));
        assert_eq!(cleaner.drop_reason("第 15 页"), Some("chinese_page_number"));
        assert_eq!(cleaner.drop_reason("第15页 共230页"), Some("chinese_page_number"));
        assert_eq!(cleaner.drop_reason("Page 3 of 40"), Some("english_page_label"));
    }

    #[test]
    fn boilerplate_and_report_title_lines_are_dropped() {
        let cleaner = cleaner();
        assert_eq!(cleaner.drop_reason("年度报告"), Some("boilerplate_header"));
        assert_eq!(cleaner.drop_reason("2023年度"), Some("boilerplate_header"));
        assert_eq!(cleaner.drop_reason("Annual Report"), Some("boilerplate_header"));
        assert_eq!(
            cleaner.drop_reason("比亚迪股份有限公司2023年年度报告全文"),
            Some("report_title_repeat")
        );
        assert_eq!(
            cleaner.drop_reason("平安银行股份有限公司 2024 年半年度报告"),
            Some("report_title_repeat")
        );
        assert_eq!(
            cleaner.drop_reason("ACME Holdings 2022 Annual Report"),
            Some("report_title_repeat")
        );
    }

    #[test]
    fn ordinary_sentences_survive() {
        let cleaner = cleaner();
        assert_eq!(
            cleaner.drop_reason("公司2023年年度报告已经董事会审议通过，全体董事出席。"),
            None
        );
        assert_eq!(cleaner.drop_reason("营业收入同比增长 42.04%"), None);
        assert_eq!(cleaner.drop_reason("项目\t2023年\t2022年"), None);
        assert_eq!(cleaner.drop_reason("   "), None);
    }

    #[test]
    fn short_lines_are_dropped_including_legitimate_ones() {
        let cleaner = cleaner();
        assert_eq!(cleaner.drop_reason("ok"), Some(REASON_TOO_SHORT));
        // Known false positive: a two-character heading is real content.
        assert_eq!(cleaner.drop_reason("释义"), Some(REASON_TOO_SHORT));
        // Known false positive: a lone figure looks like a page number.
        assert_eq!(cleaner.drop_reason("2023"), Some("page_number"));
        assert_eq!(cleaner.drop_reason("一、概述"), None);
    }

    #[test]
    fn clean_collapses_blank_runs_and_trims() {
        let cleaner = cleaner();
        let text = "\n\n第三节 管理层讨论与分析\n12\n\n\n\n一、报告期内公司所处行业情况\n- 3 -\n\n\n公司主营业务稳步发展。\n\n";

        let cleaned = cleaner.clean(text);
        assert_eq!(
            cleaned.text,
            "第三节 管理层讨论与分析\n\n一、报告期内公司所处行业情况\n\n公司主营业务稳步发展。"
        );
        let reasons = cleaned
            .dropped
            .iter()
            .map(|dropped| dropped.reason)
            .collect::<Vec<_>>();
        assert_eq!(reasons, vec!["page_number", "dashed_page_number"]);
    }

    #[test]
    fn running_lines_are_detected_and_dropped() {
        let pages = vec![
            vec!["比亚迪股份有限公司 年报摘录".to_string(), "正文一".to_string(), "尾注 A".to_string()],
            vec!["比亚迪股份有限公司  年报摘录".to_string(), "正文二".to_string(), "尾注 B".to_string()],
            vec!["比亚迪股份有限公司 年报摘录".to_string(), "正文三".to_string()],
            vec!["其他页眉".to_string(), "正文四".to_string()],
        ];

        let running = detect_running_lines(pages.iter().map(Vec::as_slice), 3);
        assert!(running.contains("比亚迪股份有限公司 年报摘录"));
        assert!(!running.contains("正文三"));
        assert_eq!(running.len(), 1);

        let mut cleaner = cleaner();
        cleaner.set_running_lines(running);
        assert_eq!(
            cleaner.drop_reason("比亚迪股份有限公司   年报摘录"),
            Some(REASON_RUNNING_LINE)
        );
    }
}
