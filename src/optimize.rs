//! PDF size/quality optimization via Ghostscript, with a cascading
//! fallback chain.
//!
//! Optimization is a *best-effort enhancement*, never a correctness risk.
//! The cascade runs from highest gain to lowest risk:
//!
//! 1. Full Ghostscript recompression at the configured quality profile
//! 2. A metadata-stripping rewrite (smaller potential gain, lower risk)
//! 3. A byte-for-byte copy of the source
//!
//! Whatever rung produces the candidate, the candidate must pass structural
//! validation before it is published. An invalid candidate is discarded and
//! the original republished — a broken optimizer output can never replace a
//! working file.
//!
//! Before overwriting a previously published target, the old file is copied
//! to a timestamped backup; at most [`MAX_BACKUPS`] are retained per output
//! (oldest deleted first, by modification time).

use crate::config::{PipelineConfig, QualityProfile};
use crate::error::FileError;
use crate::manifest::{OptimizationResult, OptimizeMethod};
use crate::process::{run, RunOptions};
use crate::validate::validate;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sources below this size are not worth an optimizer pass.
pub const OPTIMIZE_SIZE_FLOOR_BYTES: u64 = 100 * 1024;

/// Backups retained per published output.
pub const MAX_BACKUPS: usize = 3;

/// Ghostscript argument set for a quality profile.
///
/// Resolution and font embedding rise monotonically with the profile;
/// draft downsamples aggressively and drops font embedding, enterprise
/// embeds everything and never downsamples.
fn ghostscript_args(profile: QualityProfile, source: &Path, candidate: &Path) -> Vec<String> {
    let dpi = profile.image_dpi();
    let mut args = vec![
        "-sDEVICE=pdfwrite".to_string(),
        "-dCompatibilityLevel=1.5".to_string(),
        "-dNOPAUSE".to_string(),
        "-dBATCH".to_string(),
        "-dQUIET".to_string(),
    ];
    match profile {
        QualityProfile::Draft => {
            args.push("-dPDFSETTINGS=/screen".to_string());
            args.push("-dEmbedAllFonts=false".to_string());
        }
        QualityProfile::Standard => {
            args.push("-dPDFSETTINGS=/ebook".to_string());
        }
        QualityProfile::Premium => {
            args.push("-dPDFSETTINGS=/printer".to_string());
        }
        QualityProfile::Enterprise => {
            args.push("-dPDFSETTINGS=/prepress".to_string());
            args.push("-dEmbedAllFonts=true".to_string());
            args.push("-dDownsampleColorImages=false".to_string());
            args.push("-dDownsampleGrayImages=false".to_string());
            args.push("-dDownsampleMonoImages=false".to_string());
        }
    }
    if profile != QualityProfile::Enterprise {
        args.push(format!("-dColorImageResolution={dpi}"));
        args.push(format!("-dGrayImageResolution={dpi}"));
        args.push(format!("-dMonoImageResolution={dpi}"));
    }
    args.push(format!("-sOutputFile={}", candidate.display()));
    args.push(source.display().to_string());
    args
}

/// Plain pdfwrite rewrite: strips document metadata and rebuilds the xref
/// without touching image streams.
fn metadata_clean_args(source: &Path, candidate: &Path) -> Vec<String> {
    vec![
        "-sDEVICE=pdfwrite".to_string(),
        "-dCompatibilityLevel=1.5".to_string(),
        "-dNOPAUSE".to_string(),
        "-dBATCH".to_string(),
        "-dQUIET".to_string(),
        format!("-sOutputFile={}", candidate.display()),
        source.display().to_string(),
    ]
}

/// Copy the previous published file aside and prune old backups.
///
/// Backup names are `<filename>.bak.<UTC timestamp>`; pruning considers
/// only files with that exact prefix, so unrelated siblings are never
/// touched.
fn rotate_backups(target: &Path, max: usize) -> std::io::Result<()> {
    if !target.exists() {
        return Ok(());
    }
    let parent = match target.parent() {
        Some(p) => p.to_path_buf(),
        None => return Ok(()),
    };
    let file_name = match target.file_name() {
        Some(n) => n.to_string_lossy().into_owned(),
        None => return Ok(()),
    };

    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
    let backup = parent.join(format!("{file_name}.bak.{stamp}"));
    std::fs::copy(target, &backup)?;
    debug!("backed up {} → {}", target.display(), backup.display());

    // Prune: newest `max` stay, the rest go, oldest first.
    let prefix = format!("{file_name}.bak.");
    let mut backups: Vec<(std::time::SystemTime, PathBuf)> = std::fs::read_dir(&parent)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with(prefix.as_str())
        })
        .filter_map(|e| {
            let meta = e.metadata().ok()?;
            Some((meta.modified().ok()?, e.path()))
        })
        .collect();
    backups.sort_by_key(|(mtime, _)| *mtime);

    while backups.len() > max {
        let (_, oldest) = backups.remove(0);
        debug!("pruning old backup {}", oldest.display());
        std::fs::remove_file(&oldest)?;
    }
    Ok(())
}

/// Rotate the target's backup, then copy `from` over it.
fn publish(from: &Path, target: &Path) -> Result<(), FileError> {
    rotate_backups(target, MAX_BACKUPS).map_err(|e| FileError::Io {
        path: target.to_path_buf(),
        detail: format!("backup rotation: {e}"),
    })?;
    if from != target {
        std::fs::copy(from, target).map_err(|e| FileError::Io {
            path: target.to_path_buf(),
            detail: format!("publish copy: {e}"),
        })?;
    }
    Ok(())
}

fn skipped(original_size: u64) -> OptimizationResult {
    OptimizationResult {
        optimized: false,
        original_size_bytes: original_size,
        new_size_bytes: original_size,
        quality_gain_percent: None,
        method: OptimizeMethod::Skipped,
    }
}

/// Validate the candidate and publish whichever file is safe.
///
/// Invalid candidate → the original is republished and the pass reports
/// `optimized: false`. A candidate that grew the file is also discarded —
/// recompression that loses is not an optimization.
fn publish_candidate(
    source: &Path,
    target: &Path,
    candidate: &Path,
    method: OptimizeMethod,
    original_size: u64,
    min_pdf_bytes: u64,
) -> Result<OptimizationResult, FileError> {
    let verdict = validate(candidate, min_pdf_bytes);
    if !verdict.ok {
        warn!(
            "optimizer candidate for {} failed validation ({}); keeping original",
            target.display(),
            verdict.reason.as_deref().unwrap_or("unknown")
        );
        publish(source, target)?;
        return Ok(OptimizationResult {
            optimized: false,
            original_size_bytes: original_size,
            new_size_bytes: original_size,
            quality_gain_percent: None,
            method: OptimizeMethod::CopyFallback,
        });
    }

    let new_size = std::fs::metadata(candidate)
        .map(|m| m.len())
        .unwrap_or(original_size);

    if method == OptimizeMethod::CopyFallback || new_size >= original_size {
        if new_size >= original_size && method != OptimizeMethod::CopyFallback {
            debug!(
                "optimizer grew {} ({} → {} bytes); keeping original",
                target.display(),
                original_size,
                new_size
            );
        }
        publish(source, target)?;
        return Ok(OptimizationResult {
            optimized: false,
            original_size_bytes: original_size,
            new_size_bytes: original_size,
            quality_gain_percent: None,
            method,
        });
    }

    publish(candidate, target)?;
    let gain = (original_size - new_size) as f64 / original_size as f64 * 100.0;
    info!(
        "optimized {}: {} → {} bytes ({:.1}% smaller)",
        target.display(),
        original_size,
        new_size,
        gain
    );
    Ok(OptimizationResult {
        optimized: true,
        original_size_bytes: original_size,
        new_size_bytes: new_size,
        quality_gain_percent: Some(gain),
        method,
    })
}

/// Optimize `source` into `target` at the configured quality profile.
///
/// `optimizer` is the resolved Ghostscript binary, or `None` when it is not
/// installed — in which case the source is copied through unchanged.
pub async fn optimize(
    source: &Path,
    target: &Path,
    optimizer: Option<&Path>,
    config: &PipelineConfig,
) -> Result<OptimizationResult, FileError> {
    let original_size = std::fs::metadata(source)
        .map(|m| m.len())
        .map_err(|e| FileError::Io {
            path: source.to_path_buf(),
            detail: e.to_string(),
        })?;

    let Some(gs) = optimizer else {
        debug!("optimizer unavailable; copying {} through", source.display());
        publish(source, target)?;
        return Ok(skipped(original_size));
    };

    if original_size < OPTIMIZE_SIZE_FLOOR_BYTES {
        debug!(
            "{} is {} bytes, below the optimization floor; copying through",
            source.display(),
            original_size
        );
        publish(source, target)?;
        return Ok(skipped(original_size));
    }

    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let candidate = tempfile::Builder::new()
        .prefix(".docpress-opt-")
        .suffix(".pdf")
        .tempfile_in(parent)
        .map_err(|e| FileError::Io {
            path: parent.to_path_buf(),
            detail: format!("candidate temp: {e}"),
        })?;
    let candidate_path = candidate.path().to_path_buf();
    let opts = RunOptions::with_timeout(config.optimize_timeout_ms);
    let gs_str = gs.to_string_lossy();

    // Rung 1: full recompression at the configured profile.
    let method = match run(
        "gs",
        &gs_str,
        &ghostscript_args(config.quality, source, &candidate_path),
        &opts,
    )
    .await
    {
        Ok(_) => OptimizeMethod::Ghostscript,
        Err(e) => {
            warn!("ghostscript pass failed ({e}); trying metadata clean");
            // Rung 2: low-risk metadata rewrite.
            match run("gs", &gs_str, &metadata_clean_args(source, &candidate_path), &opts).await {
                Ok(_) => OptimizeMethod::MetadataClean,
                Err(e) => {
                    warn!("metadata clean failed ({e}); falling back to copy");
                    // Rung 3: byte-for-byte copy.
                    std::fs::copy(source, &candidate_path).map_err(|e| FileError::Io {
                        path: candidate_path.clone(),
                        detail: format!("copy fallback: {e}"),
                    })?;
                    OptimizeMethod::CopyFallback
                }
            }
        }
    };

    publish_candidate(
        source,
        target,
        &candidate_path,
        method,
        original_size,
        config.min_pdf_bytes,
    )
}
