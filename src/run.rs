//! Batch orchestration: the top-level entry point that sequences a run.
//!
//! ## Pipeline order
//!
//! ```text
//! ensure output dirs ─▶ probe tools ─▶ discover lanes ─▶ dedup per lane
//!        ─▶ convert chosen (sequential) ─▶ rebuild library failures
//!        ─▶ summary ─▶ write manifest
//! ```
//!
//! The batch is single-threaded on purpose: file counts are small, the
//! dominant cost is external-process latency, and sequential execution
//! keeps backup rotation and manifest accumulation free of any
//! synchronisation concerns. Failures are isolated per file; the only
//! run-wide fatal conditions are output-directory creation and manifest
//! write failure — both mean the environment itself is unusable.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::manifest::{ConversionResult, RunManifest, MANIFEST_FILE_NAME};
use crate::pipeline::discover::{discover, Lane, SourceFile};
use crate::pipeline::dispatch::convert_one;
use crate::pipeline::plan::build_plan;
use crate::pipeline::rebuild::rebuild_invalid;
use crate::tools;
use std::time::Instant;
use tracing::{info, warn};

/// Run the whole batch to completion and return the manifest.
///
/// Never fails because of an individual document; inspect
/// `manifest.summary` (and `--strict` in the CLI) for per-file failures.
pub async fn run_pipeline(config: &PipelineConfig) -> Result<RunManifest, PipelineError> {
    let total_start = Instant::now();
    let mut manifest = RunManifest::new(config);
    info!(
        "starting batch: content={} library={} output={}",
        config.content_root.display(),
        config.library_root.display(),
        config.output_root.display()
    );

    // ── Step 1: Ensure output directories ────────────────────────────────
    if !config.dry_run {
        for lane in [Lane::Content, Lane::Library] {
            let dir = config.output_root.join(lane.as_str());
            std::fs::create_dir_all(&dir).map_err(|e| PipelineError::OutputDirFailed {
                path: dir.clone(),
                source: e,
            })?;
        }
    }

    // ── Step 2: Probe external tools ─────────────────────────────────────
    let tools = tools::detect_with_install(config.install_missing_tools && !config.dry_run).await;

    // ── Step 3: Discover both lanes ──────────────────────────────────────
    let content_files = discover(&config.content_root, Lane::Content, config.recursive)?;
    let library_files = discover(&config.library_root, Lane::Library, config.recursive)?;

    // ── Step 4: One dedup plan per lane ──────────────────────────────────
    let content_plan = build_plan(content_files);
    let library_plan = build_plan(library_files);
    manifest.skipped.extend(content_plan.skipped);
    manifest.skipped.extend(library_plan.skipped);

    // ── Step 5: Convert every chosen file, in discovery order ────────────
    let chosen: Vec<SourceFile> = content_plan
        .chosen
        .into_iter()
        .chain(library_plan.chosen)
        .collect();
    let total = chosen.len();
    info!("{} files to convert ({} skipped by dedup)", total, manifest.skipped.len());
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut converted: Vec<(SourceFile, ConversionResult)> = Vec::with_capacity(total);
    for (index, source) in chosen.into_iter().enumerate() {
        let rel = source.output_relative_path();
        let rel_str = rel.to_string_lossy().into_owned();
        if let Some(ref cb) = config.progress_callback {
            cb.on_file_start(index + 1, total, &rel_str);
        }

        let result = convert_one(
            &source,
            &rel,
            config.overwrite,
            config.optimize,
            config,
            &tools,
        )
        .await;

        if let Some(ref cb) = config.progress_callback {
            match &result.error {
                None => cb.on_file_complete(index + 1, total, &rel_str, result.method.as_str()),
                Some(e) => cb.on_file_error(index + 1, total, &rel_str, e),
            }
        }
        converted.push((source, result));
    }

    // ── Step 6: Rebuild invalid library-lane outputs ─────────────────────
    // Only the authoritative lane is rebuild-eligible; a failed content
    // rendering has no better representation to fall back to.
    if !config.dry_run {
        let library_failures: Vec<(&SourceFile, &ConversionResult)> = converted
            .iter()
            .filter(|(s, r)| s.lane == Lane::Library && r.is_failed())
            .map(|(s, r)| (s, r))
            .collect();
        if !library_failures.is_empty() {
            warn!(
                "{} library outputs failed; attempting rebuild from content lane",
                library_failures.len()
            );
            let content_pool: Vec<SourceFile> = converted
                .iter()
                .filter(|(s, _)| s.lane == Lane::Content)
                .map(|(s, _)| s.clone())
                .collect();
            manifest.rebuilds =
                rebuild_invalid(&library_failures, &content_pool, config, &tools).await;
        }
    }

    // ── Step 7: Summary and manifest ─────────────────────────────────────
    manifest.results = converted.into_iter().map(|(_, r)| r).collect();
    manifest.finalize(total_start.elapsed().as_millis() as u64);

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(manifest.summary.ok, manifest.summary.failed);
    }

    if config.dry_run {
        info!(
            "dry run complete: {} files planned, nothing written",
            manifest.summary.total
        );
    } else {
        let manifest_path = config.output_root.join(MANIFEST_FILE_NAME);
        manifest.write(&manifest_path)?;
        info!(
            "batch complete: {}/{} ok, {} failed, {}ms — manifest at {}",
            manifest.summary.ok,
            manifest.summary.total,
            manifest.summary.failed,
            manifest.summary.elapsed_ms,
            manifest_path.display()
        );
    }

    Ok(manifest)
}
