use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::OutlineArgs;
use crate::outline::{OutlineTree, ParseStats, build_outline, parse_document};
use crate::primitives;

pub fn run(args: OutlineArgs) -> Result<()> {
    let primitives = primitives::open(&args.input, args.extract.backend)?;
    info!(
        file = %primitives.file_name(),
        total_pages = primitives.total_page_count(),
        "loaded document"
    );

    let mut output = io::BufWriter::new(io::stdout().lock());

    if args.json || args.with_content || args.section.is_some() {
        let parsed = parse_document(primitives.as_ref(), &args.extract.options())?;
        if let Some(section_id) = &args.section {
            write_section(&mut output, &parsed.tree, section_id)?;
        } else if args.json {
            match &parsed.document {
                Some(document) => {
                    serde_json::to_writer_pretty(&mut output, document)
                        .context("failed to serialize report document")?;
                    writeln!(output)?;
                }
                None => warn!(file = %primitives.file_name(), "document has no outline"),
            }
        } else {
            write_tree(&mut output, &parsed.tree, true)?;
        }
        report_warnings(&parsed.stats);
    } else {
        let mut stats = ParseStats::default();
        let tree = build_outline(primitives.as_ref(), &mut stats);
        write_tree(&mut output, &tree, false)?;
        report_warnings(&stats);
    }

    output.flush()?;
    Ok(())
}

fn report_warnings(stats: &ParseStats) {
    for warning in &stats.warnings {
        warn!(warning = %warning, "outline warning");
    }
}

fn write_section<W: Write>(output: &mut W, tree: &OutlineTree, section_id: &str) -> Result<()> {
    let Some(id) = tree.find_by_section_id(section_id) else {
        bail!("no section {section_id} in outline");
    };

    let node = tree.node(id);
    let mut path = tree.section_path(id);
    path.push(node.title.clone());
    writeln!(output, "{}", path.join(" > "))?;

    match node.content() {
        Some(content) => writeln!(output, "{content}")?,
        None => bail!("section {section_id} carries no content; only extracted leaves do"),
    }
    Ok(())
}

pub fn write_tree<W: Write>(output: &mut W, tree: &OutlineTree, with_content: bool) -> Result<()> {
    if tree.is_empty() {
        writeln!(output, "(no outline)")?;
        return Ok(());
    }

    for id in tree.preorder() {
        let node = tree.node(id);
        let indent = "  ".repeat(node.level.unwrap_or_default());
        let page = match node.page_number {
            0 => "?".to_string(),
            page => page.to_string(),
        };
        let boundary = node
            .next_boundary_page()
            .map_or_else(|| "?".to_string(), |page| page.to_string());

        write!(
            output,
            "{indent}{}\t{}\tp.{page} -> {boundary}",
            tree.section_id(id).unwrap_or_default(),
            node.title
        )?;
        if with_content && node.is_leaf() {
            let chars = node.content().map_or(0, |content| content.chars().count());
            write!(output, "\tchars={chars}")?;
        }
        writeln!(output)?;
    }

    Ok(())
}
