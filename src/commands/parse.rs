use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{error, info, warn};

use crate::cli::ParseArgs;
use crate::commands::inventory;
use crate::model::{
    DocumentOutcome, DocumentStatus, ParseCounts, ParsePaths, ParseRunManifest,
    ReportInventoryManifest,
};
use crate::outline::{ExtractOptions, ParseStats, parse_document};
use crate::primitives;
use crate::util::{
    ensure_directory, now_utc_string, output_path_for, read_json, utc_compact_string,
    write_json_pretty,
};

pub fn run(args: ParseArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("parse-{}", utc_compact_string(started_ts));

    let manifest_dir = args.output_dir.join("manifests");
    let parse_manifest_path = args.parse_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("parse_run_{}.json", utc_compact_string(started_ts)))
    });

    info!(
        reports_dir = %args.reports_dir.display(),
        output_dir = %args.output_dir.display(),
        run_id = %run_id,
        backend = args.extract.backend.as_str(),
        "starting parse"
    );

    let (mut sources, inventory_manifest_path) = if args.inputs.is_empty() {
        let inventory_manifest_path = args
            .inventory_manifest_path
            .clone()
            .unwrap_or_else(|| inventory::default_manifest_path(&args.output_dir));
        let inventory = load_or_refresh_inventory(
            &args.reports_dir,
            &inventory_manifest_path,
            args.refresh_inventory,
            args.dry_run,
        )?;
        let sources = inventory
            .reports
            .iter()
            .map(|report| args.reports_dir.join(&report.filename))
            .collect::<Vec<PathBuf>>();
        (sources, Some(inventory_manifest_path))
    } else {
        (args.inputs.clone(), None)
    };

    if let Some(max_documents) = args.max_documents {
        sources.truncate(max_documents);
    }
    if sources.is_empty() {
        bail!("nothing to parse");
    }

    if !args.dry_run {
        ensure_directory(&args.output_dir)?;
    }

    let options = args.extract.options();
    let mut documents = Vec::with_capacity(sources.len());
    for source in &sources {
        documents.push(process_document(source, &args, &options));
    }

    let counts = summarize(&documents);
    let warnings = documents
        .iter()
        .flat_map(|outcome| {
            outcome
                .stats
                .warnings
                .iter()
                .map(move |warning| format!("{}: {}", outcome.source, warning))
        })
        .collect::<Vec<String>>();

    let status = if counts.failed_count > 0 {
        "completed_with_failures"
    } else {
        "completed"
    };

    let manifest = ParseRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_parse_command(&args),
        backend: args.extract.backend.as_str().to_string(),
        paths: ParsePaths {
            reports_dir: args.reports_dir.display().to_string(),
            output_dir: args.output_dir.display().to_string(),
            manifest_dir: manifest_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.map(|path| path.display().to_string()),
        },
        counts,
        documents,
        warnings,
    };

    if args.dry_run {
        info!(
            run_id = %run_id,
            documents = manifest.counts.document_count,
            parsed = manifest.counts.parsed_count,
            "parse dry-run complete"
        );
        return Ok(());
    }

    write_json_pretty(&parse_manifest_path, &manifest)?;
    info!(path = %parse_manifest_path.display(), "wrote parse run manifest");
    info!(
        run_id = %run_id,
        status,
        documents = manifest.counts.document_count,
        parsed = manifest.counts.parsed_count,
        no_outline = manifest.counts.no_outline_count,
        failed = manifest.counts.failed_count,
        leaves = manifest.counts.leaf_count,
        empty_leaves = manifest.counts.empty_leaf_count,
        skipped_pages = manifest.counts.skipped_page_count,
        "parse completed"
    );

    Ok(())
}

fn process_document(source: &Path, args: &ParseArgs, options: &ExtractOptions) -> DocumentOutcome {
    let source_label = source.display().to_string();

    let primitives = match primitives::open(source, args.extract.backend) {
        Ok(primitives) => primitives,
        Err(err) => {
            error!(file = %source_label, error = %format!("{err:#}"), "failed to open document");
            return failed(source_label, format!("{err:#}"), ParseStats::default());
        }
    };

    let parsed = match parse_document(primitives.as_ref(), options) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!(file = %source_label, error = %format!("{err:#}"), "failed to parse document");
            return failed(source_label, format!("{err:#}"), ParseStats::default());
        }
    };

    let stats = parsed.stats;
    let Some(document) = parsed.document else {
        warn!(file = %source_label, "no outline; no output written");
        return DocumentOutcome {
            source: source_label,
            status: DocumentStatus::NoOutline,
            output_path: None,
            failure_reason: None,
            stats,
        };
    };

    let output_path = output_path_for(&args.output_dir, source);
    if !args.dry_run {
        if let Err(err) = write_json_pretty(&output_path, &document) {
            error!(file = %source_label, error = %format!("{err:#}"), "failed to write outline");
            return failed(source_label, format!("{err:#}"), stats);
        }
        info!(
            file = %source_label,
            path = %output_path.display(),
            leaves = stats.leaf_count,
            "wrote outline"
        );
    }

    DocumentOutcome {
        source: source_label,
        status: DocumentStatus::Parsed,
        output_path: Some(output_path.display().to_string()),
        failure_reason: None,
        stats,
    }
}

fn failed(source: String, reason: String, stats: ParseStats) -> DocumentOutcome {
    DocumentOutcome {
        source,
        status: DocumentStatus::Failed,
        output_path: None,
        failure_reason: Some(reason),
        stats,
    }
}

fn summarize(documents: &[DocumentOutcome]) -> ParseCounts {
    let mut counts = ParseCounts {
        document_count: documents.len(),
        ..ParseCounts::default()
    };

    for outcome in documents {
        match outcome.status {
            DocumentStatus::Parsed => counts.parsed_count += 1,
            DocumentStatus::NoOutline => counts.no_outline_count += 1,
            DocumentStatus::Failed => counts.failed_count += 1,
        }
        counts.leaf_count += outcome.stats.leaf_count;
        counts.empty_leaf_count += outcome.stats.empty_leaf_count;
        counts.skipped_page_count += outcome.stats.skipped_pages;
        counts.table_block_count += outcome.stats.table_blocks;
        counts.dropped_line_count += outcome.stats.dropped_lines;
        counts.warning_count += outcome.stats.warnings.len();
    }

    counts
}

fn load_or_refresh_inventory(
    reports_dir: &Path,
    inventory_manifest_path: &Path,
    refresh_inventory: bool,
    dry_run: bool,
) -> Result<ReportInventoryManifest> {
    if refresh_inventory || !inventory_manifest_path.exists() {
        let manifest = inventory::build_manifest(reports_dir)?;
        if dry_run {
            info!(
                report_count = manifest.report_count,
                "inventory dry-run; manifest not written"
            );
            return Ok(manifest);
        }
        write_json_pretty(inventory_manifest_path, &manifest)?;
        info!(
            path = %inventory_manifest_path.display(),
            report_count = manifest.report_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: ReportInventoryManifest = read_json(inventory_manifest_path)?;
    info!(
        path = %inventory_manifest_path.display(),
        report_count = manifest.report_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

fn render_parse_command(args: &ParseArgs) -> String {
    let mut command = vec![
        "report-outline".to_string(),
        "parse".to_string(),
        "--reports-dir".to_string(),
        args.reports_dir.display().to_string(),
        "--output-dir".to_string(),
        args.output_dir.display().to_string(),
        "--backend".to_string(),
        args.extract.backend.as_str().to_string(),
    ];

    for input in &args.inputs {
        command.push("--input".to_string());
        command.push(input.display().to_string());
    }
    if let Some(path) = &args.inventory_manifest_path {
        command.push("--inventory-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.parse_manifest_path {
        command.push("--parse-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    if let Some(max_documents) = args.max_documents {
        command.push("--max-documents".to_string());
        command.push(max_documents.to_string());
    }
    if args.dry_run {
        command.push("--dry-run".to_string());
    }
    command.push("--min-line-chars".to_string());
    command.push(args.extract.min_line_chars.to_string());
    if args.extract.keep_running_lines {
        command.push("--keep-running-lines".to_string());
    }
    command.push("--running-line-min-pages".to_string());
    command.push(args.extract.running_line_min_pages.to_string());

    command.join(" ")
}
