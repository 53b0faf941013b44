//! Run manifest: the structured, durable record of what a batch run did.
//!
//! Console logs scroll away; the manifest stays. One JSON document at the
//! output root captures the configuration snapshot, every per-file result,
//! the dedup skip list, the rebuild list, and the summary counts — enough
//! to answer "why is this PDF stale/missing/small" days after the run,
//! without re-running anything.
//!
//! The manifest is for operators and debugging. Nothing downstream consumes
//! it programmatically; the surrounding site consumes only the output
//! directory's file paths.

use crate::config::{PipelineConfig, QualityProfile};
use crate::error::PipelineError;
use crate::pipeline::discover::Lane;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the manifest, written at the output root.
pub const MANIFEST_FILE_NAME: &str = "conversion-manifest.json";

/// Outcome of one conversion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Failed,
}

/// How an output was (or would be) produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvertMethod {
    /// Source was already a PDF; copied through (and still validated).
    #[serde(rename = "copy")]
    Copy,
    /// Markdown rendered to HTML and rasterised by the headless browser.
    #[serde(rename = "render")]
    Render,
    /// Office document converted by the external office suite.
    #[serde(rename = "office-convert")]
    OfficeConvert,
    /// Existing output was valid and current; nothing written.
    #[serde(rename = "skip-existing")]
    SkipExisting,
    /// Dry-run: method recorded, nothing written.
    #[serde(rename = "skip-dryrun")]
    SkipDryRun,
}

impl ConvertMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvertMethod::Copy => "copy",
            ConvertMethod::Render => "render",
            ConvertMethod::OfficeConvert => "office-convert",
            ConvertMethod::SkipExisting => "skip-existing",
            ConvertMethod::SkipDryRun => "skip-dryrun",
        }
    }
}

/// Outcome of attempting to produce one PDF from one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub outcome: Outcome,
    pub method: ConvertMethod,
    pub lane: Lane,
    pub source_relative_path: String,
    pub output_relative_path: String,
    pub output_absolute_path: PathBuf,
    pub size_bytes: u64,
    pub duration_ms: u64,
    /// Short content hash of the final output, for traceability only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_prefix: Option<String>,
    /// Present iff `outcome` is `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present when the optimizer ran on this output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationResult>,
    /// Dry-run only: the method a real run would have used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_method: Option<ConvertMethod>,
}

impl ConversionResult {
    pub fn is_failed(&self) -> bool {
        self.outcome == Outcome::Failed
    }
}

/// Outcome of a quality-optimizer pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub optimized: bool,
    pub original_size_bytes: u64,
    /// Only meaningful when `optimized` is true.
    pub new_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_gain_percent: Option<f64>,
    pub method: OptimizeMethod,
}

/// Which rung of the optimizer's fallback cascade produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizeMethod {
    #[serde(rename = "ghostscript")]
    Ghostscript,
    #[serde(rename = "metadata-clean")]
    MetadataClean,
    #[serde(rename = "copy-fallback")]
    CopyFallback,
    #[serde(rename = "skipped")]
    Skipped,
}

/// A discovered file that was not converted, and why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub lane: Lane,
    pub file: String,
    pub reason: String,
}

/// What the rebuild pass did for one invalid output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildRecord {
    /// Output-relative path of the invalid file the pass tried to repair.
    pub target: String,
    pub action: RebuildAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ConvertMethod>,
    /// Whether the file at `target` passed validation after the pass.
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildAction {
    Rebuilt,
    None,
}

/// Summary counts for the whole run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub ok: usize,
    pub failed: usize,
    pub total: usize,
    pub elapsed_ms: u64,
}

/// The configuration snapshot embedded in the manifest.
///
/// A plain-data mirror of [`PipelineConfig`] so the manifest stays
/// deserialisable even as the live config grows non-serialisable fields
/// (progress callbacks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub content_root: PathBuf,
    pub library_root: PathBuf,
    pub output_root: PathBuf,
    pub recursive: bool,
    pub overwrite: bool,
    pub dry_run: bool,
    pub strict: bool,
    pub quality: QualityProfile,
    pub min_pdf_bytes: u64,
    pub optimize: bool,
}

impl From<&PipelineConfig> for ConfigSnapshot {
    fn from(c: &PipelineConfig) -> Self {
        ConfigSnapshot {
            content_root: c.content_root.clone(),
            library_root: c.library_root.clone(),
            output_root: c.output_root.clone(),
            recursive: c.recursive,
            overwrite: c.overwrite,
            dry_run: c.dry_run,
            strict: c.strict,
            quality: c.quality,
            min_pdf_bytes: c.min_pdf_bytes,
            optimize: c.optimize,
        }
    }
}

/// The run-level record: written once, at the very end of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub generated_at: String,
    pub config: ConfigSnapshot,
    pub results: Vec<ConversionResult>,
    pub skipped: Vec<SkippedFile>,
    pub rebuilds: Vec<RebuildRecord>,
    pub summary: RunSummary,
}

impl RunManifest {
    pub fn new(config: &PipelineConfig) -> Self {
        RunManifest {
            generated_at: chrono::Utc::now().to_rfc3339(),
            config: ConfigSnapshot::from(config),
            results: Vec::new(),
            skipped: Vec::new(),
            rebuilds: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Recompute summary counts from the accumulated results.
    ///
    /// A file whose conversion failed but whose output was successfully
    /// rebuilt counts as ok: what matters is the state of the published
    /// tree after the whole run, not the first attempt.
    pub fn finalize(&mut self, elapsed_ms: u64) {
        let rebuilt_ok: std::collections::HashSet<&str> = self
            .rebuilds
            .iter()
            .filter(|r| r.valid)
            .map(|r| r.target.as_str())
            .collect();
        let failed = self
            .results
            .iter()
            .filter(|r| r.is_failed() && !rebuilt_ok.contains(r.output_relative_path.as_str()))
            .count();
        self.summary = RunSummary {
            ok: self.results.len() - failed,
            failed,
            total: self.results.len(),
            elapsed_ms,
        };
    }

    /// Write the manifest as pretty JSON, atomically (temp file + rename).
    pub fn write(&self, path: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            PipelineError::ManifestWriteFailed {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            }
        })?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| {
            PipelineError::ManifestWriteFailed {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
        std::fs::rename(&tmp_path, path).map_err(|e| PipelineError::ManifestWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(outcome: Outcome) -> ConversionResult {
        ConversionResult {
            outcome,
            method: ConvertMethod::Copy,
            lane: Lane::Content,
            source_relative_path: "forms/waiver.pdf".into(),
            output_relative_path: "content/forms/waiver.pdf".into(),
            output_absolute_path: PathBuf::from("/out/content/forms/waiver.pdf"),
            size_bytes: 9_000,
            duration_ms: 12,
            checksum_prefix: Some("ab12cd34ef56".into()),
            error: None,
            optimization: None,
            planned_method: None,
        }
    }

    #[test]
    fn finalize_counts_outcomes() {
        let config = PipelineConfig::builder()
            .content_root("a")
            .library_root("b")
            .output_root("c")
            .build()
            .unwrap();
        let mut m = RunManifest::new(&config);
        m.results.push(sample_result(Outcome::Ok));
        m.results.push(sample_result(Outcome::Ok));
        m.results.push(sample_result(Outcome::Failed));
        m.finalize(1_234);
        assert_eq!(m.summary.ok, 2);
        assert_eq!(m.summary.failed, 1);
        assert_eq!(m.summary.total, 3);
        assert_eq!(m.summary.elapsed_ms, 1_234);
    }

    #[test]
    fn finalize_credits_successful_rebuilds() {
        let config = PipelineConfig::builder()
            .content_root("a")
            .library_root("b")
            .output_root("c")
            .build()
            .unwrap();
        let mut m = RunManifest::new(&config);
        let mut failed = sample_result(Outcome::Failed);
        failed.output_relative_path = "library/pdf/brief.pdf".into();
        m.results.push(failed);
        m.rebuilds.push(RebuildRecord {
            target: "library/pdf/brief.pdf".into(),
            action: RebuildAction::Rebuilt,
            source_used: Some("content/downloads/brief.mdx".into()),
            method: Some(ConvertMethod::Render),
            valid: true,
            reason: None,
        });
        m.finalize(10);
        assert_eq!(m.summary.failed, 0);
        assert_eq!(m.summary.ok, 1);
    }

    #[test]
    fn write_then_parse_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE_NAME);
        let config = PipelineConfig::builder()
            .content_root("a")
            .library_root("b")
            .output_root(dir.path())
            .build()
            .unwrap();
        let mut m = RunManifest::new(&config);
        m.results.push(sample_result(Outcome::Ok));
        m.finalize(5);
        m.write(&path).unwrap();

        let parsed: RunManifest =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.summary.ok, 1);
        assert_eq!(parsed.results[0].method, ConvertMethod::Copy);
    }

    #[test]
    fn method_names_are_kebab() {
        let json = serde_json::to_string(&ConvertMethod::OfficeConvert).unwrap();
        assert_eq!(json, "\"office-convert\"");
        let json = serde_json::to_string(&ConvertMethod::SkipExisting).unwrap();
        assert_eq!(json, "\"skip-existing\"");
    }
}
