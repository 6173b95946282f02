use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::inventory;
use crate::model::{DocumentStatus, ParseRunManifest, ReportInventoryManifest};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.output_dir.join("manifests");
    let inventory_path = inventory::default_manifest_path(&args.output_dir);

    info!(output_dir = %args.output_dir.display(), "status requested");

    if inventory_path.exists() {
        let inventory: ReportInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            source = %inventory.source_directory,
            report_count = inventory.report_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    match latest_parse_manifest(&manifest_dir)? {
        Some(path) => {
            let manifest: ParseRunManifest = read_json(&path)?;
            info!(
                path = %path.display(),
                run_id = %manifest.run_id,
                status = %manifest.status,
                started_at = %manifest.started_at,
                updated_at = %manifest.updated_at,
                backend = %manifest.backend,
                documents = manifest.counts.document_count,
                parsed = manifest.counts.parsed_count,
                no_outline = manifest.counts.no_outline_count,
                failed = manifest.counts.failed_count,
                leaves = manifest.counts.leaf_count,
                empty_leaves = manifest.counts.empty_leaf_count,
                skipped_pages = manifest.counts.skipped_page_count,
                warnings = manifest.counts.warning_count,
                "loaded latest parse run manifest"
            );

            for outcome in manifest
                .documents
                .iter()
                .filter(|outcome| outcome.status == DocumentStatus::Failed)
            {
                warn!(
                    source = %outcome.source,
                    reason = %outcome.failure_reason.as_deref().unwrap_or_default(),
                    "document failed in latest run"
                );
            }
        }
        None => warn!(path = %manifest_dir.display(), "no parse run manifest found"),
    }

    Ok(())
}

/// Newest `parse_run_*.json` in `manifest_dir`. Run manifests carry a
/// compact UTC timestamp, so the lexicographically largest name is newest.
pub fn latest_parse_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.exists() {
        return Ok(None);
    }

    let mut latest: Option<PathBuf> = None;
    let entries = fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to read {}", manifest_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", manifest_dir.display()))?;
        let path = entry.path();
        let is_run_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("parse_run_") && name.ends_with(".json"));

        if is_run_manifest && latest.as_ref().is_none_or(|current| path > *current) {
            latest = Some(path);
        }
    }

    Ok(latest)
}
