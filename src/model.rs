use serde::{Deserialize, Serialize};

use crate::outline::ParseStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub filename: String,
    pub stock_code: Option<String>,
    pub company_name: Option<String>,
    pub year: Option<i32>,
    pub report_type: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub report_count: usize,
    pub reports: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsePaths {
    pub reports_dir: String,
    pub output_dir: String,
    pub manifest_dir: String,
    pub inventory_manifest_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseCounts {
    pub document_count: usize,
    pub parsed_count: usize,
    pub no_outline_count: usize,
    pub failed_count: usize,
    pub leaf_count: usize,
    pub empty_leaf_count: usize,
    pub skipped_page_count: usize,
    pub table_block_count: usize,
    pub dropped_line_count: usize,
    pub warning_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Parsed,
    NoOutline,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub source: String,
    pub status: DocumentStatus,
    pub output_path: Option<String>,
    pub failure_reason: Option<String>,
    pub stats: ParseStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub backend: String,
    pub paths: ParsePaths,
    pub counts: ParseCounts,
    pub documents: Vec<DocumentOutcome>,
    pub warnings: Vec<String>,
}
