use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::InventoryArgs;
use crate::model::{ReportEntry, ReportInventoryManifest};
use crate::outline::ReportNaming;
use crate::util::{file_name_string, now_utc_string, sha256_file, write_json_pretty};

pub fn run(args: InventoryArgs) -> Result<()> {
    let manifest = build_manifest(&args.reports_dir)?;

    if args.dry_run {
        info!(
            report_count = manifest.report_count,
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| default_manifest_path(&args.output_dir));

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(report_count = manifest.report_count, "inventory completed");

    Ok(())
}

pub fn default_manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join("manifests").join("report_inventory.json")
}

pub fn build_manifest(reports_dir: &Path) -> Result<ReportInventoryManifest> {
    let mut report_paths = discover_reports(reports_dir)?;
    report_paths.sort();

    if report_paths.is_empty() {
        bail!("no reports found in {}", reports_dir.display());
    }

    let mut reports = Vec::with_capacity(report_paths.len());
    for path in report_paths {
        let filename = file_name_string(&path)?;
        let naming = ReportNaming::from_file_name(&filename);
        if !naming.matches_convention() {
            warn!(
                file = %filename,
                "filename does not follow {{stock_code}}_{{company}}_{{year}}; company fields left empty"
            );
        }

        let sha256 = sha256_file(&path)?;
        let matches = naming.matches_convention();
        reports.push(ReportEntry {
            filename,
            stock_code: matches.then(|| naming.stock_code.clone()),
            company_name: matches.then(|| naming.company_name.clone()),
            year: (naming.year > 0).then_some(naming.year),
            report_type: naming.kind.as_str().to_string(),
            sha256,
        });
    }

    reports.sort_by(|a, b| {
        a.stock_code
            .cmp(&b.stock_code)
            .then(a.year.cmp(&b.year))
            .then(a.filename.cmp(&b.filename))
    });

    Ok(ReportInventoryManifest {
        manifest_version: 1,
        generated_at: now_utc_string(),
        source_directory: reports_dir.display().to_string(),
        report_count: reports.len(),
        reports,
    })
}

pub fn discover_reports(reports_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut reports = Vec::new();

    let entries = fs::read_dir(reports_dir)
        .with_context(|| format!("failed to read {}", reports_dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", reports_dir.display()))?;
        let path = entry.path();

        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect file type: {}", path.display()))?
            .is_file()
        {
            continue;
        }

        let is_report = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf") || ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_report {
            reports.push(path);
        }
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::util::utc_compact_string;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "report-outline-{label}-{}-{}",
            std::process::id(),
            utc_compact_string(Utc::now())
        ));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    #[test]
    fn manifest_lists_reports_with_naming_fields() {
        let dir = scratch_dir("inventory");
        fs::write(dir.join("600519_贵州茅台_2022.pdf"), b"%PDF-1.7 a").expect("write");
        fs::write(dir.join("002594_比亚迪_2023.pdf"), b"%PDF-1.7 b").expect("write");
        fs::write(dir.join("notes.txt"), b"ignored").expect("write");
        fs::write(dir.join("scan 2021.json"), b"{}").expect("write");

        let manifest = build_manifest(&dir).expect("manifest");
        assert_eq!(manifest.report_count, 3);

        let names = manifest
            .reports
            .iter()
            .map(|report| report.filename.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["scan 2021.json", "002594_比亚迪_2023.pdf", "600519_贵州茅台_2022.pdf"]
        );

        let byd = &manifest.reports[1];
        assert_eq!(byd.stock_code.as_deref(), Some("002594"));
        assert_eq!(byd.company_name.as_deref(), Some("比亚迪"));
        assert_eq!(byd.year, Some(2023));
        assert_eq!(byd.report_type, "annual");
        assert_eq!(byd.sha256.len(), 64);

        let scan = &manifest.reports[0];
        assert_eq!(scan.stock_code, None);
        assert_eq!(scan.year, Some(2021));

        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = scratch_dir("inventory-empty");
        assert!(build_manifest(&dir).is_err());
        fs::remove_dir_all(&dir).expect("cleanup");
    }
}
