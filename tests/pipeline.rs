//! End-to-end integration tests for docpress.
//!
//! These tests exercise the whole batch — discovery, dedup, conversion,
//! validation, rebuild, and the manifest — inside tempfile sandboxes.
//! Fixtures are PDF-shaped byte blobs, so the copy path covers every
//! orchestration branch without requiring Chromium, LibreOffice, or
//! Ghostscript on the test machine (sources stay below the optimizer's
//! size floor, which keeps optimization deterministically skipped).

use docpress::{
    run_pipeline, ConvertMethod, Lane, Outcome, PipelineConfig, RebuildAction, RunManifest,
    MANIFEST_FILE_NAME,
};
use std::fs;
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// A structurally valid PDF-shaped blob of at least `len` bytes.
fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.resize(len.saturating_sub(6).max(bytes.len()), b' ');
    bytes.extend_from_slice(b"\n%%EOF");
    bytes
}

struct Sandbox {
    _dir: tempfile::TempDir,
    content: PathBuf,
    library: PathBuf,
    output: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        let library = dir.path().join("lib");
        let output = dir.path().join("out");
        fs::create_dir_all(&content).unwrap();
        fs::create_dir_all(&library).unwrap();
        Sandbox {
            _dir: dir,
            content,
            library,
            output,
        }
    }

    fn write(&self, root: &Path, rel: &str, bytes: &[u8]) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, bytes).unwrap();
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::builder()
            .content_root(&self.content)
            .library_root(&self.library)
            .output_root(&self.output)
            .build()
            .unwrap()
    }
}

fn result_for<'a>(manifest: &'a RunManifest, rel: &str) -> &'a docpress::ConversionResult {
    manifest
        .results
        .iter()
        .find(|r| r.output_relative_path == rel)
        .unwrap_or_else(|| panic!("no result for {rel}"))
}

// ── Full run ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_run_converts_both_lanes_and_writes_manifest() {
    let sb = Sandbox::new();
    sb.write(&sb.content, "forms/waiver.pdf", &pdf_bytes(9_000));
    sb.write(&sb.library, "pdf/handbook.pdf", &pdf_bytes(12_000));

    let manifest = run_pipeline(&sb.config()).await.unwrap();

    assert_eq!(manifest.summary.total, 2);
    assert_eq!(manifest.summary.ok, 2);
    assert_eq!(manifest.summary.failed, 0);

    let waiver = sb.output.join("content/forms/waiver.pdf");
    let handbook = sb.output.join("library/pdf/handbook.pdf");
    assert!(waiver.exists());
    assert!(handbook.exists());
    assert_eq!(fs::read(&waiver).unwrap(), pdf_bytes(9_000));

    // The manifest is on disk and parses back to the same counts.
    let on_disk: RunManifest = serde_json::from_str(
        &fs::read_to_string(sb.output.join(MANIFEST_FILE_NAME)).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk.summary.ok, 2);

    let r = result_for(&manifest, "content/forms/waiver.pdf");
    assert_eq!(r.method, ConvertMethod::Copy);
    assert_eq!(r.lane, Lane::Content);
    assert_eq!(r.checksum_prefix.as_ref().unwrap().len(), 12);
}

// ── Idempotence ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_run_skips_everything() {
    let sb = Sandbox::new();
    sb.write(&sb.content, "guide.pdf", &pdf_bytes(9_000));
    sb.write(&sb.library, "manual.pdf", &pdf_bytes(9_500));
    let config = sb.config();

    let first = run_pipeline(&config).await.unwrap();
    assert_eq!(first.summary.ok, 2);

    let second = run_pipeline(&config).await.unwrap();
    assert_eq!(second.summary.ok, first.summary.ok);
    assert_eq!(second.summary.failed, first.summary.failed);
    assert!(second
        .results
        .iter()
        .all(|r| r.method == ConvertMethod::SkipExisting));
}

// ── Deduplication ────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_beats_markdown_for_the_same_document() {
    let sb = Sandbox::new();
    sb.write(&sb.content, "forms/waiver.pdf", &pdf_bytes(9_000));
    // Newer markdown twin of the same logical document.
    sb.write(&sb.content, "forms/waiver.mdx", b"---\ntitle: Waiver\n---\n# Waiver\n");

    let manifest = run_pipeline(&sb.config()).await.unwrap();

    // The PDF wins; the mdx never reaches conversion (so no browser needed).
    assert_eq!(manifest.summary.total, 1);
    assert_eq!(
        result_for(&manifest, "content/forms/waiver.pdf").method,
        ConvertMethod::Copy
    );
    assert_eq!(manifest.skipped.len(), 1);
    assert_eq!(manifest.skipped[0].reason, "dedupe");
    assert!(manifest.skipped[0].file.ends_with("waiver.mdx"));
}

// ── Rebuild ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_library_pdf_is_rebuilt_from_content_source() {
    let sb = Sandbox::new();
    sb.write(&sb.library, "pdf/brief.pdf", b"500 bytes of garbage");
    sb.write(&sb.content, "downloads/brief.pdf", &pdf_bytes(9_000));

    let manifest = run_pipeline(&sb.config()).await.unwrap();

    // The library copy failed validation…
    let lib_result = result_for(&manifest, "library/pdf/brief.pdf");
    assert_eq!(lib_result.outcome, Outcome::Failed);

    // …but the rebuild pass repaired it from the content twin.
    assert_eq!(manifest.rebuilds.len(), 1);
    let rebuild = &manifest.rebuilds[0];
    assert_eq!(rebuild.action, RebuildAction::Rebuilt);
    assert!(rebuild.valid);
    assert_eq!(rebuild.target, "library/pdf/brief.pdf");
    assert!(rebuild.source_used.as_ref().unwrap().contains("brief.pdf"));

    let out = sb.output.join("library/pdf/brief.pdf");
    assert_eq!(fs::read(&out).unwrap(), pdf_bytes(9_000));

    // A successfully rebuilt file counts as ok in the final tally.
    assert_eq!(manifest.summary.failed, 0);
}

#[tokio::test]
async fn content_lane_failure_never_triggers_rebuild() {
    let sb = Sandbox::new();
    sb.write(&sb.content, "broken.pdf", b"not a pdf");
    sb.write(&sb.library, "pdf/broken.pdf", &pdf_bytes(9_000));

    let manifest = run_pipeline(&sb.config()).await.unwrap();

    assert_eq!(
        result_for(&manifest, "content/broken.pdf").outcome,
        Outcome::Failed
    );
    assert!(manifest.rebuilds.is_empty());
    assert_eq!(manifest.summary.failed, 1);
}

#[tokio::test]
async fn rebuild_without_alternate_records_reason() {
    let sb = Sandbox::new();
    sb.write(&sb.library, "pdf/orphan.pdf", b"garbage");

    let manifest = run_pipeline(&sb.config()).await.unwrap();

    assert_eq!(manifest.rebuilds.len(), 1);
    assert_eq!(manifest.rebuilds[0].action, RebuildAction::None);
    assert_eq!(
        manifest.rebuilds[0].reason.as_deref(),
        Some("no matching source")
    );
    assert_eq!(manifest.summary.failed, 1);
}

// ── Dry run ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dry_run_plans_but_writes_nothing() {
    let sb = Sandbox::new();
    sb.write(&sb.content, "forms/waiver.pdf", &pdf_bytes(9_000));
    sb.write(&sb.content, "guide.md", b"# Guide\n");

    let config = PipelineConfig::builder()
        .content_root(&sb.content)
        .library_root(&sb.library)
        .output_root(&sb.output)
        .dry_run(true)
        .build()
        .unwrap();
    let manifest = run_pipeline(&config).await.unwrap();

    assert!(!sb.output.exists(), "dry run must not create the output root");
    assert_eq!(manifest.summary.total, 2);
    assert!(manifest
        .results
        .iter()
        .all(|r| r.method == ConvertMethod::SkipDryRun));

    // Intended methods are still recorded.
    assert_eq!(
        result_for(&manifest, "content/forms/waiver.pdf").planned_method,
        Some(ConvertMethod::Copy)
    );
    assert_eq!(
        result_for(&manifest, "content/guide.pdf").planned_method,
        Some(ConvertMethod::Render)
    );
}

// ── Failure isolation ────────────────────────────────────────────────────────

#[tokio::test]
async fn one_bad_document_does_not_abort_the_batch() {
    let sb = Sandbox::new();
    sb.write(&sb.content, "good-one.pdf", &pdf_bytes(9_000));
    sb.write(&sb.content, "bad.pdf", b"junk");
    sb.write(&sb.content, "good-two.pdf", &pdf_bytes(10_000));

    let manifest = run_pipeline(&sb.config()).await.unwrap();

    assert_eq!(manifest.summary.total, 3);
    assert_eq!(manifest.summary.ok, 2);
    assert_eq!(manifest.summary.failed, 1);
    assert!(sb.output.join("content/good-one.pdf").exists());
    assert!(sb.output.join("content/good-two.pdf").exists());
}

// ── Non-recursive mode ───────────────────────────────────────────────────────

#[tokio::test]
async fn non_recursive_ignores_subdirectories() {
    let sb = Sandbox::new();
    sb.write(&sb.content, "top.pdf", &pdf_bytes(9_000));
    sb.write(&sb.content, "nested/deep.pdf", &pdf_bytes(9_000));

    let config = PipelineConfig::builder()
        .content_root(&sb.content)
        .library_root(&sb.library)
        .output_root(&sb.output)
        .recursive(false)
        .build()
        .unwrap();
    let manifest = run_pipeline(&config).await.unwrap();

    assert_eq!(manifest.summary.total, 1);
    assert!(sb.output.join("content/top.pdf").exists());
    assert!(!sb.output.join("content/nested/deep.pdf").exists());
}

// ── Overwrite ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn overwrite_reconverts_current_outputs() {
    let sb = Sandbox::new();
    sb.write(&sb.content, "doc.pdf", &pdf_bytes(9_000));

    let manifest = run_pipeline(&sb.config()).await.unwrap();
    assert_eq!(result_for(&manifest, "content/doc.pdf").method, ConvertMethod::Copy);

    let config = PipelineConfig::builder()
        .content_root(&sb.content)
        .library_root(&sb.library)
        .output_root(&sb.output)
        .overwrite(true)
        .build()
        .unwrap();
    let manifest = run_pipeline(&config).await.unwrap();
    assert_eq!(result_for(&manifest, "content/doc.pdf").method, ConvertMethod::Copy);
}
