//! Office-document conversion via the external office suite.
//!
//! LibreOffice's `soffice --headless --convert-to pdf` is the only
//! practical batch converter for legacy `.xls`/`.ppt` files. It writes the
//! output as `<stem>.pdf` into `--outdir` with no way to choose the final
//! name, so conversion goes through a scratch directory next to the
//! destination and the result is renamed into place. The scratch directory
//! sits in the destination's parent so the rename never crosses a
//! filesystem boundary.

use crate::config::PipelineConfig;
use crate::error::FileError;
use crate::process::{run_with_retry, RunOptions};
use std::path::Path;
use tracing::debug;

/// Convert a spreadsheet or slides file to a PDF at `dest`.
///
/// Timeouts and non-zero exits go through the runner's backoff (LibreOffice
/// under memory pressure is a known transient); a run that exits 0 but
/// produces no usable PDF is a deterministic failure and is left to the
/// rebuild path.
pub async fn convert_office_to_pdf(
    source: &Path,
    dest: &Path,
    office: &Path,
    config: &PipelineConfig,
) -> Result<(), FileError> {
    let parent = dest.parent().ok_or_else(|| FileError::Io {
        path: dest.to_path_buf(),
        detail: "destination has no parent directory".into(),
    })?;

    let outdir = tempfile::Builder::new()
        .prefix(".docpress-office-")
        .tempdir_in(parent)
        .map_err(|e| FileError::Io {
            path: parent.to_path_buf(),
            detail: format!("scratch dir: {e}"),
        })?;

    let args = vec![
        "--headless".to_string(),
        "--norestore".to_string(),
        "--convert-to".to_string(),
        "pdf".to_string(),
        "--outdir".to_string(),
        outdir.path().to_string_lossy().into_owned(),
        source.to_string_lossy().into_owned(),
    ];

    run_with_retry(
        "office",
        &office.to_string_lossy(),
        &args,
        &RunOptions::with_timeout(config.convert_timeout_ms),
        config.max_attempts,
        config.retry_base_delay_ms,
    )
    .await?;

    // soffice names the output after the source stem.
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let produced = outdir.path().join(format!("{stem}.pdf"));
    if !produced.exists() {
        return Err(FileError::InvalidOutput {
            path: produced,
            reason: "office converter exited 0 but produced no PDF".into(),
        });
    }

    debug!("office output {} → {}", produced.display(), dest.display());
    std::fs::rename(&produced, dest).map_err(|e| FileError::Io {
        path: dest.to_path_buf(),
        detail: format!("rename from scratch dir: {e}"),
    })?;

    Ok(())
}
