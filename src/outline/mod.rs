mod boundary;
mod clean;
mod extract;
mod pipeline;
mod serialize;
mod tree;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

pub use extract::ExtractOptions;
pub use pipeline::{build_outline, parse_document};
pub use serialize::{ReportDocument, ReportNaming};
pub use tree::OutlineTree;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ParseStats {
    pub outline_entries: usize,
    pub unresolved_destinations: usize,
    pub orphan_child_lists: usize,
    pub leaf_count: usize,
    pub empty_leaf_count: usize,
    pub skipped_pages: usize,
    pub table_blocks: usize,
    pub dropped_lines: usize,
    pub warnings: Vec<String>,
}
