//! Source discovery: walk a lane root and classify every file by kind.
//!
//! Unsupported extensions are skipped silently — a source tree full of
//! images, CSS, and templates is normal, and warning about every one of
//! them would bury the log lines that matter. Anything this stage does not
//! recognise is simply invisible to the pipeline.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Which of the two source roots a file came from.
///
/// Lanes never mix outputs: each lane mirrors its own relative structure
/// under the output root, and only the rebuild pass may write a
/// content-lane rendering over a library-lane path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Authored sources: markdown/mdx and office documents.
    Content,
    /// Hand-placed, authoritative PDFs.
    Library,
}

impl Lane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Content => "content",
            Lane::Library => "library",
        }
    }
}

/// Document kind, classified from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocKind {
    #[serde(rename = "markdown")]
    Markdown,
    #[serde(rename = "markdown-extended")]
    MarkdownExtended,
    #[serde(rename = "spreadsheet-legacy")]
    SpreadsheetLegacy,
    #[serde(rename = "spreadsheet-modern")]
    SpreadsheetModern,
    #[serde(rename = "slides-legacy")]
    SlidesLegacy,
    #[serde(rename = "slides-modern")]
    SlidesModern,
    #[serde(rename = "pdf")]
    Pdf,
}

impl DocKind {
    /// Classify a lowercase extension; `None` means the file is invisible
    /// to the pipeline.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "md" => Some(DocKind::Markdown),
            "mdx" => Some(DocKind::MarkdownExtended),
            "xls" => Some(DocKind::SpreadsheetLegacy),
            "xlsx" => Some(DocKind::SpreadsheetModern),
            "ppt" => Some(DocKind::SlidesLegacy),
            "pptx" => Some(DocKind::SlidesModern),
            "pdf" => Some(DocKind::Pdf),
            _ => None,
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, DocKind::Pdf)
    }

    pub fn is_office(&self) -> bool {
        matches!(
            self,
            DocKind::SpreadsheetLegacy
                | DocKind::SpreadsheetModern
                | DocKind::SlidesLegacy
                | DocKind::SlidesModern
        )
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, DocKind::Markdown | DocKind::MarkdownExtended)
    }
}

/// A discovered input file. Immutable after discovery.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub absolute_path: PathBuf,
    /// Path relative to the lane root.
    pub relative_path: PathBuf,
    pub kind: DocKind,
    /// Filename without extension — the join key for deduplication.
    pub base_name: String,
    pub modified_at_ms: u64,
    pub size_bytes: u64,
    pub lane: Lane,
}

impl SourceFile {
    /// Directory part of the relative path ("" at the root).
    pub fn relative_dir(&self) -> String {
        self.relative_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Output path for this source under `out_root`: the lane name, the
    /// relative directory, and the basename renamed to `.pdf`.
    pub fn output_relative_path(&self) -> PathBuf {
        let mut rel = PathBuf::from(self.lane.as_str());
        if let Some(parent) = self.relative_path.parent() {
            rel.push(parent);
        }
        rel.push(format!("{}.pdf", self.base_name));
        rel
    }
}

/// Walk `root` depth-first and return every classifiable file.
///
/// `recursive = false` limits the walk to the root's immediate children.
/// Files are returned in walk order, which is the order the batch will
/// convert them in.
pub fn discover(root: &Path, lane: Lane, recursive: bool) -> Result<Vec<SourceFile>, PipelineError> {
    if !root.is_dir() {
        return Err(PipelineError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut walker = WalkDir::new(root);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut found = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| PipelineError::WalkFailed {
            path: root.to_path_buf(),
            detail: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let Some(kind) = DocKind::from_extension(&ext) else {
            continue;
        };

        let meta = entry.metadata().map_err(|e| PipelineError::WalkFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let modified_at_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let relative_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        let base_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(
            "[{}] found {} ({:?}, {} bytes)",
            lane.as_str(),
            relative_path.display(),
            kind,
            meta.len()
        );

        found.push(SourceFile {
            absolute_path: path.to_path_buf(),
            relative_path,
            kind,
            base_name,
            modified_at_ms,
            size_bytes: meta.len(),
            lane,
        });
    }

    info!(
        "[{}] discovered {} source files under {}",
        lane.as_str(),
        found.len(),
        root.display()
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, rel: &str) {
        let p = dir.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, b"x").unwrap();
    }

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(DocKind::from_extension("md"), Some(DocKind::Markdown));
        assert_eq!(DocKind::from_extension("mdx"), Some(DocKind::MarkdownExtended));
        assert_eq!(DocKind::from_extension("xlsx"), Some(DocKind::SpreadsheetModern));
        assert_eq!(DocKind::from_extension("ppt"), Some(DocKind::SlidesLegacy));
        assert_eq!(DocKind::from_extension("pdf"), Some(DocKind::Pdf));
        assert_eq!(DocKind::from_extension("png"), None);
        assert_eq!(DocKind::from_extension(""), None);
    }

    #[test]
    fn walks_recursively_and_skips_unknown() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "guide.md");
        touch(dir.path(), "forms/waiver.pdf");
        touch(dir.path(), "forms/deep/budget.xlsx");
        touch(dir.path(), "logo.png");
        touch(dir.path(), "notes.txt");

        let files = discover(dir.path(), Lane::Content, true).unwrap();
        let mut names: Vec<String> = files.iter().map(|f| f.base_name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["budget", "guide", "waiver"]);
    }

    #[test]
    fn non_recursive_stays_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "guide.md");
        touch(dir.path(), "forms/waiver.pdf");

        let files = discover(dir.path(), Lane::Library, false).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].base_name, "guide");
        assert_eq!(files[0].lane, Lane::Library);
    }

    #[test]
    fn missing_root_is_fatal() {
        let err = discover(Path::new("/nonexistent-root-x9"), Lane::Content, true);
        assert!(matches!(err, Err(PipelineError::RootNotFound { .. })));
    }

    #[test]
    fn output_relative_path_renames_to_pdf() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "downloads/brief.mdx");
        let files = discover(dir.path(), Lane::Content, true).unwrap();
        assert_eq!(
            files[0].output_relative_path(),
            PathBuf::from("content/downloads/brief.pdf")
        );
    }

    #[test]
    fn extension_classification_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "REPORT.PDF");
        let files = discover(dir.path(), Lane::Library, true).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].kind, DocKind::Pdf);
        assert_eq!(files[0].base_name, "REPORT");
    }
}
