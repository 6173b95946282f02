use std::collections::{HashMap, HashSet};

use tracing::{debug, error, trace, warn};

use crate::primitives::{DetectedTable, PdfPrimitives, TextLine};

use super::ParseStats;
use super::clean::{TextCleaner, detect_running_lines};
use super::tree::{NodeId, OutlineTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub min_line_chars: usize,
    pub strip_running_lines: bool,
    pub running_line_min_pages: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_line_chars: 4,
            strip_running_lines: true,
            running_line_min_pages: 3,
        }
    }
}

/// 0-based, inclusive page range of one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub start_page: usize,
    pub end_page: usize,
}

impl PageSpan {
    pub fn is_single_page(&self) -> bool {
        self.start_page == self.end_page
    }
}

pub fn chapter_span(page_number: u32, boundary_page: u32, total_pages: usize) -> Option<PageSpan> {
    if page_number == 0 || page_number as usize > total_pages {
        return None;
    }

    let start_page = page_number as usize - 1;
    let end_page = (boundary_page.saturating_sub(1) as usize)
        .min(total_pages - 1)
        .max(start_page);

    Some(PageSpan {
        start_page,
        end_page,
    })
}

pub fn reconcile_page_lines(mut lines: Vec<TextLine>, tables: &[DetectedTable]) -> (Vec<String>, usize) {
    lines.sort_by(|a, b| a.bbox.top.total_cmp(&b.bbox.top));

    let mut emitted = HashSet::<usize>::new();
    let mut units = Vec::with_capacity(lines.len());

    for line in lines {
        match tables
            .iter()
            .position(|table| table.bbox.overlaps(&line.bbox))
        {
            Some(index) => {
                if emitted.insert(index) {
                    units.push(tables[index].render());
                }
            }
            None => units.push(line.text),
        }
    }

    (units, emitted.len())
}

pub fn line_contains_title(line: &str, title: &str) -> bool {
    let needle = squash_whitespace(title);
    !needle.is_empty() && squash_whitespace(line).contains(&needle)
}

fn squash_whitespace(input: &str) -> String {
    input.chars().filter(|ch| !ch.is_whitespace()).collect()
}

pub struct ContentExtractor<'a> {
    primitives: &'a dyn PdfPrimitives,
    cleaner: TextCleaner,
    pages: HashMap<usize, Option<Vec<String>>>,
}

impl<'a> ContentExtractor<'a> {
    pub fn new(primitives: &'a dyn PdfPrimitives, cleaner: TextCleaner) -> Self {
        Self {
            primitives,
            cleaner,
            pages: HashMap::new(),
        }
    }

    pub fn install_running_lines(&mut self, min_pages: usize, stats: &mut ParseStats) {
        let total_pages = self.primitives.total_page_count();
        for page_index in 0..total_pages {
            self.ensure_page(page_index, stats);
        }

        let running = detect_running_lines(
            (0..total_pages).filter_map(|page_index| {
                self.pages
                    .get(&page_index)
                    .and_then(|lines| lines.as_deref())
            }),
            min_pages,
        );
        debug!(count = running.len(), "detected running header/footer lines");

        self.cleaner.set_running_lines(running);
    }

    pub fn extract(&mut self, tree: &OutlineTree, id: NodeId, stats: &mut ParseStats) -> String {
        let raw = self.extract_raw(tree, id, stats);
        let cleaned = self.cleaner.clean(&raw);
        for dropped in &cleaned.dropped {
            trace!(line = %dropped.line, reason = dropped.reason, "dropped line");
        }
        stats.dropped_lines += cleaned.dropped.len();
        cleaned.text
    }

    pub fn extract_raw(&mut self, tree: &OutlineTree, id: NodeId, stats: &mut ParseStats) -> String {
        let node = tree.node(id);
        let total_pages = self.primitives.total_page_count();
        let boundary_page = node
            .next_boundary_page()
            .unwrap_or_else(|| tree.find_next_start_page(id, total_pages));

        let Some(span) = chapter_span(node.page_number, boundary_page, total_pages) else {
            error!(
                title = %node.title,
                page = node.page_number,
                total_pages,
                "chapter start page is outside the document"
            );
            stats.warnings.push(format!(
                "chapter '{}' starts at page {} outside the document ({} pages)",
                node.title, node.page_number, total_pages
            ));
            return String::new();
        };

        let next_title = match node.next_boundary_page() {
            Some(_) => node.next_title().map(ToOwned::to_owned),
            None => tree.find_next_section(id).map(|next| next.title),
        };

        debug!(
            title = %node.title,
            start_page = span.start_page,
            end_page = span.end_page,
            single_page = span.is_single_page(),
            next_title = next_title.as_deref().unwrap_or(""),
            "extracting chapter"
        );

        let mut collected = Vec::<String>::new();
        for page_index in span.start_page..=span.end_page {
            self.ensure_page(page_index, stats);
            let Some(Some(lines)) = self.pages.get(&page_index) else {
                continue;
            };

            let mut begin = 0usize;
            let mut end = lines.len();
            let mut search_next_from = 0usize;

            if page_index == span.start_page {
                if let Some(position) = lines
                    .iter()
                    .position(|line| line_contains_title(line, &node.title))
                {
                    begin = position;
                    search_next_from = position + 1;
                }
            }

            if page_index == span.end_page {
                if let Some(next_title) = next_title.as_deref() {
                    if let Some(offset) = lines[search_next_from..]
                        .iter()
                        .position(|line| line_contains_title(line, next_title))
                    {
                        end = search_next_from + offset;
                    }
                }
            }

            if begin < end {
                collected.extend(lines[begin..end].iter().cloned());
            }
        }

        collected.join("\n")
    }

    fn ensure_page(&mut self, page_index: usize, stats: &mut ParseStats) {
        if self.pages.contains_key(&page_index) {
            return;
        }
        let loaded = self.load_page(page_index, stats);
        self.pages.insert(page_index, loaded);
    }

    fn load_page(&self, page_index: usize, stats: &mut ParseStats) -> Option<Vec<String>> {
        let page = page_index + 1;

        let lines = match self.primitives.extract_text_lines(page_index) {
            Ok(lines) => lines,
            Err(error) => {
                skip_page(page, "text line extraction failed", &error.to_string(), stats);
                return None;
            }
        };

        let tables = match self.primitives.find_tables(page_index) {
            Ok(tables) => tables,
            Err(error) => {
                skip_page(page, "table detection failed", &error.to_string(), stats);
                return None;
            }
        };

        if lines.is_empty() {
            return match self.primitives.extract_plain_text(page_index) {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(page, "page has no positioned lines; using plain text");
                    Some(text.lines().map(ToOwned::to_owned).collect())
                }
                Ok(_) => {
                    skip_page(page, "page has no text", "empty text layer", stats);
                    None
                }
                Err(error) => {
                    skip_page(page, "plain text extraction failed", &error.to_string(), stats);
                    None
                }
            };
        }

        let (units, table_blocks) = reconcile_page_lines(lines, &tables);
        stats.table_blocks += table_blocks;
        Some(units)
    }
}

fn skip_page(page: usize, reason: &str, detail: &str, stats: &mut ParseStats) {
    warn!(page, reason, detail, "skipping page");
    stats.skipped_pages += 1;
    stats
        .warnings
        .push(format!("skipped page {page}: {reason}: {detail}"));
}
