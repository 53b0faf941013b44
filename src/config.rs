//! Configuration types for the batch conversion pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built
//! via its [`PipelineConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to snapshot the configuration into the run manifest and diff
//! two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::PipelineError;
use crate::progress::BatchProgressCallback;
use crate::validate::DEFAULT_MIN_PDF_BYTES;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one batch conversion run.
///
/// Built via [`PipelineConfig::builder()`].
///
/// # Example
/// ```rust
/// use docpress::{PipelineConfig, QualityProfile};
///
/// let config = PipelineConfig::builder()
///     .content_root("content/downloads")
///     .library_root("lib/pdf")
///     .output_root("public/pdf")
///     .quality(QualityProfile::Premium)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Root of the content lane (authored markdown/mdx and office documents).
    pub content_root: PathBuf,

    /// Root of the library lane (hand-placed, authoritative PDFs).
    pub library_root: PathBuf,

    /// Root of the output tree. Each lane mirrors its source structure
    /// underneath this directory, every entry renamed to `.pdf`.
    pub output_root: PathBuf,

    /// Walk source roots recursively. Default: true.
    pub recursive: bool,

    /// Force reconversion even when the existing output is valid and
    /// current. Default: false.
    pub overwrite: bool,

    /// Plan only — classify, deduplicate, and record intended methods, but
    /// write nothing under the output root. Default: false.
    pub dry_run: bool,

    /// Treat any ultimately-failed file as a run failure (nonzero process
    /// exit from the CLI). Default: false.
    ///
    /// Off by default on purpose: a batch content pipeline should not block
    /// a deployment over a handful of unrenderable legacy documents. The
    /// manifest is the place to inspect failures.
    pub strict: bool,

    /// Quality profile for the PDF optimizer. Default: [`QualityProfile::Standard`].
    pub quality: QualityProfile,

    /// Size floor for structural PDF validation, in bytes. Default: 8,000.
    ///
    /// Below this a "PDF" is almost certainly a failed or partial render.
    pub min_pdf_bytes: u64,

    /// Run the size/quality optimizer on successful conversions. Default: true.
    pub optimize: bool,

    /// Attempt a best-effort install of missing optional tools at startup.
    /// Default: false.
    pub install_missing_tools: bool,

    /// Timeout for a single external conversion (browser render or office
    /// convert), in milliseconds. Default: 120,000.
    ///
    /// LibreOffice cold-starts can take 20–30 s on a loaded CI box; two
    /// minutes covers the worst observed case with headroom while still
    /// guaranteeing a hung tool never hangs the batch.
    pub convert_timeout_ms: u64,

    /// Timeout for a single optimizer pass, in milliseconds. Default: 90,000.
    pub optimize_timeout_ms: u64,

    /// Attempt budget for transient external-process failures. Default: 3.
    pub max_attempts: u32,

    /// Base delay for linear retry backoff, in milliseconds. Default: 2,000.
    ///
    /// The wait before attempt N is `N × base` (2 s → 4 s), long enough for
    /// a briefly overloaded machine to recover without stalling the batch.
    pub retry_base_delay_ms: u64,

    /// Per-file progress events for host UIs (progress bars, CI annotations).
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("content_root", &self.content_root)
            .field("library_root", &self.library_root)
            .field("output_root", &self.output_root)
            .field("recursive", &self.recursive)
            .field("overwrite", &self.overwrite)
            .field("dry_run", &self.dry_run)
            .field("strict", &self.strict)
            .field("quality", &self.quality)
            .field("min_pdf_bytes", &self.min_pdf_bytes)
            .field("optimize", &self.optimize)
            .field("convert_timeout_ms", &self.convert_timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: PipelineConfig {
                content_root: PathBuf::new(),
                library_root: PathBuf::new(),
                output_root: PathBuf::new(),
                recursive: true,
                overwrite: false,
                dry_run: false,
                strict: false,
                quality: QualityProfile::default(),
                min_pdf_bytes: DEFAULT_MIN_PDF_BYTES,
                optimize: true,
                install_missing_tools: false,
                convert_timeout_ms: 120_000,
                optimize_timeout_ms: 90_000,
                max_attempts: 3,
                retry_base_delay_ms: 2_000,
                progress_callback: None,
            },
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn content_root(mut self, p: impl Into<PathBuf>) -> Self {
        self.config.content_root = p.into();
        self
    }

    pub fn library_root(mut self, p: impl Into<PathBuf>) -> Self {
        self.config.library_root = p.into();
        self
    }

    pub fn output_root(mut self, p: impl Into<PathBuf>) -> Self {
        self.config.output_root = p.into();
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.config.overwrite = v;
        self
    }

    pub fn dry_run(mut self, v: bool) -> Self {
        self.config.dry_run = v;
        self
    }

    pub fn strict(mut self, v: bool) -> Self {
        self.config.strict = v;
        self
    }

    pub fn quality(mut self, q: QualityProfile) -> Self {
        self.config.quality = q;
        self
    }

    pub fn min_pdf_bytes(mut self, n: u64) -> Self {
        self.config.min_pdf_bytes = n;
        self
    }

    pub fn optimize(mut self, v: bool) -> Self {
        self.config.optimize = v;
        self
    }

    pub fn install_missing_tools(mut self, v: bool) -> Self {
        self.config.install_missing_tools = v;
        self
    }

    pub fn convert_timeout_ms(mut self, ms: u64) -> Self {
        self.config.convert_timeout_ms = ms.max(1_000);
        self
    }

    pub fn optimize_timeout_ms(mut self, ms: u64) -> Self {
        self.config.optimize_timeout_ms = ms.max(1_000);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_base_delay_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.content_root.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "content_root must be set".into(),
            ));
        }
        if c.library_root.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "library_root must be set".into(),
            ));
        }
        if c.output_root.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "output_root must be set".into(),
            ));
        }
        if c.min_pdf_bytes == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_pdf_bytes must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Quality tier controlling the optimizer's resolution and embedding settings.
///
/// Four tiers exist because compression trades against fidelity. Image
/// resolution and font embedding rise monotonically with the tier; callers
/// pick the lowest tier whose output quality satisfies their distribution
/// channel:
///
/// | Profile | Images | Fonts | Use case |
/// |---------|--------|-------|----------|
/// | draft | 72 dpi, aggressive downsampling | not embedded | previews, proofing |
/// | standard | 150 dpi | subset | web downloads (default) |
/// | premium | 300 dpi | subset | customer-facing documents |
/// | enterprise | 400 dpi, no downsampling | fully embedded | print masters |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityProfile {
    /// 72 dpi images, fonts not embedded, aggressive downsampling.
    Draft,
    /// 150 dpi images, subset fonts. (default)
    #[default]
    Standard,
    /// 300 dpi images, subset fonts.
    Premium,
    /// 400 dpi images, full font embedding, no downsampling.
    Enterprise,
}

impl QualityProfile {
    /// Canonical lowercase name, as accepted by `--quality`.
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityProfile::Draft => "draft",
            QualityProfile::Standard => "standard",
            QualityProfile::Premium => "premium",
            QualityProfile::Enterprise => "enterprise",
        }
    }

    /// Target image resolution for this profile, in dpi.
    pub fn image_dpi(&self) -> u32 {
        match self {
            QualityProfile::Draft => 72,
            QualityProfile::Standard => 150,
            QualityProfile::Premium => 300,
            QualityProfile::Enterprise => 400,
        }
    }
}

impl std::str::FromStr for QualityProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(QualityProfile::Draft),
            "standard" => Ok(QualityProfile::Standard),
            "premium" => Ok(QualityProfile::Premium),
            "enterprise" => Ok(QualityProfile::Enterprise),
            other => Err(format!(
                "unknown quality profile '{other}' (expected draft, standard, premium, or enterprise)"
            )),
        }
    }
}
