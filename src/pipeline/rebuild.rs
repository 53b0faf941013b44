//! Rebuild pass: repair invalid library-lane outputs from alternate
//! content-lane sources.
//!
//! The library lane is authoritative but hand-maintained — a corrupt or
//! truncated PDF can sit there for months. When its conversion (a copy is
//! still a conversion, and still validated) fails, the content lane often
//! holds another representation of the same logical document: the `.mdx`
//! page behind the same download. This pass finds that alternate by
//! basename, re-dispatches it with overwrite onto the *original* library
//! target path, and records the attempt either way.
//!
//! The pass never deletes: with no alternate available the invalid file
//! stays in place — a potentially-still-useful output beats a 404.

use crate::config::PipelineConfig;
use crate::manifest::{ConversionResult, RebuildAction, RebuildRecord};
use crate::pipeline::discover::SourceFile;
use crate::pipeline::dispatch::convert_one;
use crate::pipeline::plan::score;
use crate::tools::ToolSet;
use std::path::Path;
use tracing::{info, warn};

/// Pick the best alternate for `failed` out of the content-lane pool.
///
/// Same-directory candidates are preferred; among the remainder the
/// highest dedup score wins, newer mtime breaking ties.
fn find_alternate<'a>(
    failed: &SourceFile,
    content_pool: &'a [SourceFile],
) -> Option<&'a SourceFile> {
    let base = failed.base_name.to_lowercase();
    let dir = failed.relative_dir().to_lowercase();

    let candidates: Vec<&SourceFile> = content_pool
        .iter()
        .filter(|c| c.base_name.to_lowercase() == base)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    candidates
        .iter()
        .copied()
        .filter(|c| c.relative_dir().to_lowercase() == dir)
        .max_by_key(|c| (score(c), c.modified_at_ms))
        .or_else(|| {
            candidates
                .into_iter()
                .max_by_key(|c| (score(c), c.modified_at_ms))
        })
}

/// Attempt to rebuild every failed library-lane conversion.
///
/// `failures` pairs each failed result with the library source it came
/// from; `content_pool` is the content lane's post-dedup chosen set. The
/// rebuilt output lands at the failed result's original target path. The
/// optimizer is deliberately not re-run on rebuilt files — the freshly
/// rendered output's settings are trusted as-is.
pub async fn rebuild_invalid(
    failures: &[(&SourceFile, &ConversionResult)],
    content_pool: &[SourceFile],
    config: &PipelineConfig,
    tools: &ToolSet,
) -> Vec<RebuildRecord> {
    let mut records = Vec::with_capacity(failures.len());

    for (failed_source, failed_result) in failures {
        let target = failed_result.output_relative_path.clone();

        let Some(alternate) = find_alternate(failed_source, content_pool) else {
            info!("rebuild: no matching source for {}", target);
            records.push(RebuildRecord {
                target,
                action: RebuildAction::None,
                source_used: None,
                method: None,
                valid: false,
                reason: Some("no matching source".to_string()),
            });
            continue;
        };

        info!(
            "rebuild: {} from {}/{}",
            target,
            alternate.lane.as_str(),
            alternate.relative_path.display()
        );

        let result = convert_one(
            alternate,
            Path::new(&failed_result.output_relative_path),
            true,  // overwrite the invalid file
            false, // do not re-optimize a rebuilt output
            config,
            tools,
        )
        .await;

        let valid = !result.is_failed();
        if !valid {
            warn!(
                "rebuild of {} from {} also failed: {}",
                target,
                alternate.relative_path.display(),
                result.error.as_deref().unwrap_or("unknown")
            );
        }

        records.push(RebuildRecord {
            target,
            action: RebuildAction::Rebuilt,
            source_used: Some(format!(
                "{}/{}",
                alternate.lane.as_str(),
                alternate.relative_path.to_string_lossy()
            )),
            method: Some(result.method),
            valid,
            reason: result.error,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ConvertMethod, Outcome};
    use crate::pipeline::discover::{discover, DocKind, Lane};
    use std::fs;
    use std::path::PathBuf;

    fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(len.saturating_sub(6).max(bytes.len()), b' ');
        bytes.extend_from_slice(b"\n%%EOF");
        bytes
    }

    fn failed_result(source: &SourceFile, output_root: &Path) -> ConversionResult {
        let rel = source.output_relative_path();
        ConversionResult {
            outcome: Outcome::Failed,
            method: ConvertMethod::Copy,
            lane: source.lane,
            source_relative_path: source.relative_path.to_string_lossy().into_owned(),
            output_relative_path: rel.to_string_lossy().into_owned(),
            output_absolute_path: output_root.join(&rel),
            size_bytes: 0,
            duration_ms: 0,
            checksum_prefix: None,
            error: Some("Output is not a usable PDF: missing %PDF header signature".into()),
            optimization: None,
            planned_method: None,
        }
    }

    fn mk_source(dir: &Path, lane: Lane, rel: &str, bytes: &[u8]) -> SourceFile {
        let p = dir.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, bytes).unwrap();
        discover(dir, lane, true)
            .unwrap()
            .into_iter()
            .find(|f| f.relative_path == PathBuf::from(rel))
            .unwrap()
    }

    #[tokio::test]
    async fn rebuilds_from_matching_content_source() {
        let dir = tempfile::tempdir().unwrap();
        let content_root = dir.path().join("content");
        let lib_root = dir.path().join("lib");
        fs::create_dir_all(&content_root).unwrap();
        fs::create_dir_all(&lib_root).unwrap();

        let lib_source = mk_source(&lib_root, Lane::Library, "pdf/brief.pdf", b"500 bytes of garbage");
        let alternate = mk_source(&content_root, Lane::Content, "downloads/brief.pdf", &pdf_bytes(9_000));

        let config = PipelineConfig::builder()
            .content_root(&content_root)
            .library_root(&lib_root)
            .output_root(dir.path().join("out"))
            .build()
            .unwrap();

        let failed = failed_result(&lib_source, &config.output_root);
        let records = rebuild_invalid(
            &[(&lib_source, &failed)],
            std::slice::from_ref(&alternate),
            &config,
            &ToolSet::default(),
        )
        .await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, RebuildAction::Rebuilt);
        assert!(records[0].valid);
        assert_eq!(records[0].method, Some(ConvertMethod::Copy));
        // The rebuilt content lands at the library lane's original path.
        let out = config.output_root.join("library/pdf/brief.pdf");
        assert!(out.exists());
        assert_eq!(fs::read(&out).unwrap(), pdf_bytes(9_000));
    }

    #[tokio::test]
    async fn no_alternate_records_reason_and_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let lib_root = dir.path().join("lib");
        fs::create_dir_all(&lib_root).unwrap();
        let lib_source = mk_source(&lib_root, Lane::Library, "pdf/orphan.pdf", b"bad");

        let config = PipelineConfig::builder()
            .content_root(dir.path().join("content"))
            .library_root(&lib_root)
            .output_root(dir.path().join("out"))
            .build()
            .unwrap();

        let failed = failed_result(&lib_source, &config.output_root);
        let records =
            rebuild_invalid(&[(&lib_source, &failed)], &[], &config, &ToolSet::default()).await;

        assert_eq!(records[0].action, RebuildAction::None);
        assert_eq!(records[0].reason.as_deref(), Some("no matching source"));
        assert!(!records[0].valid);
    }

    #[test]
    fn alternate_prefers_directory_match_then_score() {
        let dir = tempfile::tempdir().unwrap();
        let content_root = dir.path().join("content");
        let lib_root = dir.path().join("lib");
        fs::create_dir_all(&content_root).unwrap();
        fs::create_dir_all(&lib_root).unwrap();

        let lib_source = mk_source(&lib_root, Lane::Library, "forms/waiver.pdf", b"bad");
        let md_same_dir = mk_source(&content_root, Lane::Content, "forms/waiver.md", b"# w");
        let pdf_other_dir =
            mk_source(&content_root, Lane::Content, "archive/waiver.pdf", &pdf_bytes(9_000));

        // Directory match wins even against a higher-scoring candidate elsewhere.
        let pool = vec![md_same_dir.clone(), pdf_other_dir.clone()];
        let found = find_alternate(&lib_source, &pool).unwrap();
        assert_eq!(found.kind, DocKind::Markdown);

        // Without a directory match, score decides.
        let pool = vec![pdf_other_dir.clone()];
        let found = find_alternate(&lib_source, &pool).unwrap();
        assert_eq!(found.kind, DocKind::Pdf);
    }
}
