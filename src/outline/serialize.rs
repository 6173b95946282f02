use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ParseStats;
use super::extract::ContentExtractor;
use super::tree::OutlineTree;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub pdf_metadata: PdfMetadata,
    pub outline: Vec<LeafRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfMetadata {
    pub file_name: String,
    pub report_title: String,
    pub report_year: i32,
    pub report_type: String,
    pub company_name: String,
    pub company_stock_code: String,
    pub total_pages: usize,
    pub parse_datetime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRecord {
    pub content: String,
    pub metadata: LeafMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafMetadata {
    pub section_id: String,
    pub section_title: String,
    pub section_path: Vec<String>,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Annual,
    Interim,
    Quarterly,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Interim => "interim",
            Self::Quarterly => "quarterly",
        }
    }

    fn title_label(self) -> &'static str {
        match self {
            Self::Annual => "年度报告",
            Self::Interim => "半年度报告",
            Self::Quarterly => "季度报告",
        }
    }

    fn from_stem(stem: &str) -> Self {
        let lower = stem.to_lowercase();
        if stem.contains("半年") || stem.contains("中期") || lower.contains("interim") {
            Self::Interim
        } else if stem.contains("季度") || lower.contains("quarter") {
            Self::Quarterly
        } else {
            Self::Annual
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportNaming {
    pub stock_code: String,
    pub company_name: String,
    pub year: i32,
    pub kind: ReportKind,
    pub title: String,
}

impl ReportNaming {
    pub fn from_file_name(file_name: &str) -> Self {
        let stem = file_name
            .rsplit_once('.')
            .map_or(file_name, |(stem, _)| stem)
            .trim_end_matches(".primitives")
            .trim();
        let kind = ReportKind::from_stem(stem);

        if let Some(captures) = naming_regex().captures(stem) {
            let stock_code = captures["code"].to_string();
            let company_name = captures["name"].trim().to_string();
            let year = captures["year"].parse::<i32>().unwrap_or_default();
            let title = format!("{company_name}{year}年{}", kind.title_label());
            return Self {
                stock_code,
                company_name,
                year,
                kind,
                title,
            };
        }

        let year = year_regex()
            .captures(stem)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<i32>().ok())
            .unwrap_or_default();

        Self {
            stock_code: String::new(),
            company_name: String::new(),
            year,
            kind,
            title: stem.to_string(),
        }
    }

    pub fn matches_convention(&self) -> bool {
        !self.stock_code.is_empty()
    }
}

fn naming_regex() -> &'static Regex {
    static NAMING: OnceLock<Regex> = OnceLock::new();
    NAMING.get_or_init(|| {
        Regex::new(r"^(?P<code>\d{6})_(?P<name>[^_]+)_(?P<year>\d{4})(?:_.*)?$")
            .unwrap_or_else(|error| panic!("report naming regex is invalid: {error}"))
    })
}

fn year_regex() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| {
        Regex::new(r"(?:^|\D)((?:19|20)\d{2})(?:\D|$)")
            .unwrap_or_else(|error| panic!("report year regex is invalid: {error}"))
    })
}

pub fn build_metadata(
    file_name: &str,
    total_pages: usize,
    parse_datetime: String,
) -> PdfMetadata {
    let naming = ReportNaming::from_file_name(file_name);
    PdfMetadata {
        file_name: file_name.to_string(),
        report_title: naming.title,
        report_year: naming.year,
        report_type: naming.kind.as_str().to_string(),
        company_name: naming.company_name,
        company_stock_code: naming.stock_code,
        total_pages,
        parse_datetime,
    }
}

pub fn serialize_leaves(
    tree: &mut OutlineTree,
    extractor: &mut ContentExtractor<'_>,
    stats: &mut ParseStats,
) -> Vec<LeafRecord> {
    let mut records = Vec::new();

    for id in tree.leaves() {
        if tree.node(id).content().is_none() {
            let content = extractor.extract(tree, id, stats);
            tree.node_mut(id).content = Some(content);
        }

        let node = tree.node(id);
        let content = node.content().unwrap_or_default().to_string();
        if content.is_empty() {
            stats.empty_leaf_count += 1;
        }
        stats.leaf_count += 1;

        records.push(LeafRecord {
            content,
            metadata: LeafMetadata {
                section_id: tree.section_id(id).unwrap_or_default().to_string(),
                section_title: node.title.clone(),
                section_path: tree.section_path(id),
                page: node.page_number,
            },
        });
    }

    records
}
