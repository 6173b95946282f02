use anyhow::Result;
use tracing::{info, warn};

use crate::primitives::PdfPrimitives;
use crate::util::now_utc_string;

use super::ParseStats;
use super::clean::TextCleaner;
use super::extract::{ContentExtractor, ExtractOptions};
use super::serialize::{ReportDocument, build_metadata, serialize_leaves};
use super::tree::OutlineTree;

#[derive(Debug)]
pub struct ParsedReport {
    pub document: Option<ReportDocument>,
    pub tree: OutlineTree,
    pub stats: ParseStats,
}

pub fn parse_document(
    primitives: &dyn PdfPrimitives,
    options: &ExtractOptions,
) -> Result<ParsedReport> {
    let mut stats = ParseStats::default();
    let file_name = primitives.file_name().to_string();
    let total_pages = primitives.total_page_count();

    let mut tree = build_outline(primitives, &mut stats);
    if tree.is_empty() {
        warn!(file = %file_name, "document has no outline; nothing to extract");
        stats.warnings.push("document has no outline".to_string());
        return Ok(ParsedReport {
            document: None,
            tree,
            stats,
        });
    }

    let cleaner = TextCleaner::new(options.min_line_chars)?;
    let mut extractor = ContentExtractor::new(primitives, cleaner);
    if options.strip_running_lines {
        extractor.install_running_lines(options.running_line_min_pages, &mut stats);
    }

    let outline = serialize_leaves(&mut tree, &mut extractor, &mut stats);
    let document = ReportDocument {
        pdf_metadata: build_metadata(&file_name, total_pages, now_utc_string()),
        outline,
    };

    info!(
        file = %file_name,
        total_pages,
        nodes = tree.len(),
        outline_entries = stats.outline_entries,
        unresolved = stats.unresolved_destinations,
        orphan_lists = stats.orphan_child_lists,
        leaves = stats.leaf_count,
        empty_leaves = stats.empty_leaf_count,
        skipped_pages = stats.skipped_pages,
        table_blocks = stats.table_blocks,
        dropped_lines = stats.dropped_lines,
        warnings = stats.warnings.len(),
        "parsed document outline"
    );

    Ok(ParsedReport {
        document: Some(document),
        tree,
        stats,
    })
}

pub fn build_outline(primitives: &dyn PdfPrimitives, stats: &mut ParseStats) -> OutlineTree {
    let items = match primitives.outline() {
        Ok(items) => items,
        Err(error) => {
            warn!(file = %primitives.file_name(), error = %error, "failed to read outline; treating as empty");
            stats
                .warnings
                .push(format!("failed to read outline: {error}"));
            Vec::new()
        }
    };

    let mut tree = OutlineTree::build(&items, primitives, stats);
    tree.resolve_boundaries(primitives.total_page_count());
    tree
}
