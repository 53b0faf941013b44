//! # docpress
//!
//! Batch document-to-PDF conversion and optimization for content sites.
//!
//! ## Why this crate?
//!
//! A content site accumulates the same logical document in several shapes:
//! the `.mdx` page, the hand-authored PDF next to it, the `.xlsx` the
//! finance team exported three years ago. Shipping a consistent `/pdf`
//! download tree out of that mess needs more than a loop over `print()`:
//! overlapping representations must be deduplicated, every output must be
//! structurally validated (hand-placed PDFs are corrupt more often than
//! anyone admits), file sizes want recompression, and an invalid
//! authoritative PDF should be rebuilt from whatever alternate source
//! still renders.
//!
//! ## Pipeline Overview
//!
//! ```text
//! content/ + library/ roots
//!  │
//!  ├─ 1. Discover  walk both lanes, classify by extension
//!  ├─ 2. Plan      dedupe to one canonical source per logical document
//!  ├─ 3. Convert   copy / office-convert / render via headless browser
//!  ├─ 4. Validate  size floor + %PDF header + %%EOF trailer, every file
//!  ├─ 5. Optimize  ghostscript recompression with safe fallbacks
//!  ├─ 6. Rebuild   repair invalid library outputs from content sources
//!  └─ 7. Manifest  one JSON record of everything the run did
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docpress::{run_pipeline, PipelineConfig, QualityProfile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .content_root("content/downloads")
//!         .library_root("lib/pdf")
//!         .output_root("public/pdf")
//!         .quality(QualityProfile::Standard)
//!         .build()?;
//!     let manifest = run_pipeline(&config).await?;
//!     println!("{} ok / {} failed", manifest.summary.ok, manifest.summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! All three collaborators are optional; absence degrades rather than
//! crashes (skipped conversions surface as per-file capability errors in
//! the manifest):
//!
//! | Tool | Used for |
//! |------|----------|
//! | Chromium / Chrome | rendering markdown through the print template |
//! | LibreOffice (`soffice`) | converting `.xls(x)` / `.ppt(x)` |
//! | Ghostscript (`gs`) | size/quality optimization |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docpress` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docpress = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod manifest;
pub mod optimize;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod run;
pub mod tools;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, QualityProfile};
pub use error::{FileError, PipelineError};
pub use manifest::{
    ConversionResult, ConvertMethod, OptimizationResult, OptimizeMethod, Outcome, RebuildAction,
    RebuildRecord, RunManifest, RunSummary, SkippedFile, MANIFEST_FILE_NAME,
};
pub use pipeline::discover::{DocKind, Lane, SourceFile};
pub use progress::BatchProgressCallback;
pub use run::run_pipeline;
pub use validate::{validate, Validity, DEFAULT_MIN_PDF_BYTES};
