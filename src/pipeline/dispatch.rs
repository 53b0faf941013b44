//! Conversion dispatch: one source file in, one validated PDF out.
//!
//! Dispatch by kind — PDFs are copied (and still validated: a hand-placed
//! PDF can itself be corrupt), office documents go through the external
//! office suite, markdown goes through the HTML print template and the
//! headless browser. Every real conversion lands in a staging file first,
//! flows through the optimizer (which owns backup rotation and candidate
//! validation), and only then reaches the published path.
//!
//! ## Idempotence
//!
//! Before converting, the destination is checked: if it exists, passes
//! validation, and the source is not newer than it (within a 5 s
//! clock-skew tolerance), the file is skipped. Repeated runs are therefore
//! cheap and safe, and an interrupted batch picks up where it left off.

use crate::config::PipelineConfig;
use crate::error::FileError;
use crate::manifest::{ConversionResult, ConvertMethod, Outcome};
use crate::optimize::optimize;
use crate::pipeline::discover::{DocKind, SourceFile};
use crate::pipeline::{office, render};
use crate::tools::ToolSet;
use crate::validate::validate;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Clock-skew tolerance for the source-newer-than-output check.
const MTIME_SKEW_MS: u64 = 5_000;

/// The conversion method a source kind calls for.
pub fn intended_method(kind: DocKind) -> ConvertMethod {
    if kind.is_pdf() {
        ConvertMethod::Copy
    } else if kind.is_office() {
        ConvertMethod::OfficeConvert
    } else {
        ConvertMethod::Render
    }
}

fn mtime_ms(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()?
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

/// Short content hash of the final output, for manifest traceability.
fn checksum_prefix(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let digest = Sha256::digest(&bytes);
    Some(hex::encode(&digest[..6]))
}

/// Convert one source file to `output_rel` under the configured output root.
///
/// Never returns an error: failures are folded into the returned
/// [`ConversionResult`] so one bad document cannot abort the batch. The
/// rebuild pass reuses this entry point with `overwrite = true` and the
/// optimizer disabled.
pub async fn convert_one(
    source: &SourceFile,
    output_rel: &Path,
    overwrite: bool,
    run_optimizer: bool,
    config: &PipelineConfig,
    tools: &ToolSet,
) -> ConversionResult {
    let start = Instant::now();
    let output_abs = config.output_root.join(output_rel);
    let method = intended_method(source.kind);
    let rel_str = output_rel.to_string_lossy().into_owned();
    let source_rel = source.relative_path.to_string_lossy().into_owned();

    let mut result = ConversionResult {
        outcome: Outcome::Ok,
        method,
        lane: source.lane,
        source_relative_path: source_rel,
        output_relative_path: rel_str,
        output_absolute_path: output_abs.clone(),
        size_bytes: 0,
        duration_ms: 0,
        checksum_prefix: None,
        error: None,
        optimization: None,
        planned_method: None,
    };

    // ── Dry run: record the plan, touch nothing ──────────────────────────
    if config.dry_run {
        result.method = ConvertMethod::SkipDryRun;
        result.planned_method = Some(method);
        result.duration_ms = start.elapsed().as_millis() as u64;
        return result;
    }

    // ── Idempotence: valid and current output needs no work ──────────────
    if !overwrite && output_abs.exists() {
        let existing = validate(&output_abs, config.min_pdf_bytes);
        let dest_mtime = mtime_ms(&output_abs).unwrap_or(0);
        if existing.ok && source.modified_at_ms <= dest_mtime + MTIME_SKEW_MS {
            debug!("skip-existing: {}", output_abs.display());
            result.method = ConvertMethod::SkipExisting;
            result.size_bytes = std::fs::metadata(&output_abs).map(|m| m.len()).unwrap_or(0);
            result.checksum_prefix = checksum_prefix(&output_abs);
            result.duration_ms = start.elapsed().as_millis() as u64;
            return result;
        }
    }

    match convert_inner(source, &output_abs, method, run_optimizer, config, tools).await {
        Ok(optimization) => {
            result.optimization = optimization;
            result.size_bytes = std::fs::metadata(&output_abs).map(|m| m.len()).unwrap_or(0);
            result.checksum_prefix = checksum_prefix(&output_abs);
            result.duration_ms = start.elapsed().as_millis() as u64;
            info!(
                "converted {} → {} ({} bytes, {}ms)",
                source.relative_path.display(),
                result.output_relative_path,
                result.size_bytes,
                result.duration_ms
            );
            result
        }
        Err(e) => {
            warn!(
                "failed {} → {}: {}",
                source.relative_path.display(),
                result.output_relative_path,
                e
            );
            result.outcome = Outcome::Failed;
            result.error = Some(e.to_string());
            result.duration_ms = start.elapsed().as_millis() as u64;
            result
        }
    }
}

/// Produce, validate, and publish the output. Returns the optimizer result
/// when a pass ran.
async fn convert_inner(
    source: &SourceFile,
    output_abs: &Path,
    method: ConvertMethod,
    run_optimizer: bool,
    config: &PipelineConfig,
    tools: &ToolSet,
) -> Result<Option<crate::manifest::OptimizationResult>, FileError> {
    if let Some(parent) = output_abs.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FileError::Io {
            path: parent.to_path_buf(),
            detail: format!("create output dir: {e}"),
        })?;
    }

    // Stage next to the destination so the final publish never crosses a
    // filesystem boundary.
    let staging = output_abs.with_extension("pdf.tmp");

    let produce = async {
        match method {
            ConvertMethod::Copy => {
                std::fs::copy(&source.absolute_path, &staging).map_err(|e| FileError::Io {
                    path: source.absolute_path.clone(),
                    detail: format!("copy: {e}"),
                })?;
                Ok(())
            }
            ConvertMethod::OfficeConvert => {
                let office_bin = tools.office.as_deref().ok_or_else(|| {
                    FileError::CapabilityMissing {
                        tool: "office".into(),
                        hint: "Install LibreOffice (soffice) to convert spreadsheet and slides sources.".into(),
                    }
                })?;
                office::convert_office_to_pdf(&source.absolute_path, &staging, office_bin, config)
                    .await
            }
            ConvertMethod::Render => {
                let browser = tools.browser.as_deref().ok_or_else(|| {
                    FileError::CapabilityMissing {
                        tool: "browser".into(),
                        hint: "Install Chromium (or Google Chrome) to render markdown sources.".into(),
                    }
                })?;
                render::render_markdown_to_pdf(
                    &source.absolute_path,
                    &source.base_name,
                    &staging,
                    browser,
                    config,
                )
                .await
            }
            ConvertMethod::SkipExisting | ConvertMethod::SkipDryRun => unreachable!(),
        }
    };

    if let Err(e) = produce.await {
        let _ = std::fs::remove_file(&staging);
        return Err(e);
    }

    // The tool ran to completion; garbage output is a permanent failure for
    // this source (rebuild-eligible), not a retryable one.
    let verdict = validate(&staging, config.min_pdf_bytes);
    if !verdict.ok {
        let _ = std::fs::remove_file(&staging);
        return Err(FileError::InvalidOutput {
            path: output_abs.to_path_buf(),
            reason: verdict.reason.unwrap_or_else(|| "unknown".into()),
        });
    }

    let optimizer = if run_optimizer && config.optimize {
        tools.optimizer.as_deref()
    } else {
        None
    };
    let optimization = optimize(&staging, output_abs, optimizer, config).await?;
    let _ = std::fs::remove_file(&staging);

    Ok(Some(optimization))
}
