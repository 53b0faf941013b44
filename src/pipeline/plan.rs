//! Deduplication: pick exactly one canonical source per logical document.
//!
//! The same logical document often exists in several representations —
//! `waiver.mdx` for the web page and a hand-authored `waiver.pdf` next to
//! it. Converting both would race on the same output path, so within each
//! `(lane, directory, basename)` key the highest-scoring candidate wins and
//! every other candidate is recorded as skipped.
//!
//! ## Scoring rationale
//!
//! A hand-authored PDF (especially a fillable form) is assumed to be
//! authoritative over a generated-from-markup rendering of the same
//! document; if no PDF exists, the richer office format beats plain markup.
//! "Fillable" is a filename heuristic, not an AcroForm inspection — the
//! naming convention is the contract content authors actually follow.

use crate::manifest::SkippedFile;
use crate::pipeline::discover::SourceFile;
use std::collections::HashMap;
use tracing::{debug, info};

/// Case-insensitive identity of a logical document within one lane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocKey {
    lane: &'static str,
    relative_dir: String,
    base_name: String,
}

impl DocKey {
    pub fn of(file: &SourceFile) -> Self {
        DocKey {
            lane: file.lane.as_str(),
            relative_dir: file.relative_dir().to_lowercase(),
            base_name: file.base_name.to_lowercase(),
        }
    }
}

/// The dedup outcome for one lane.
#[derive(Debug, Default)]
pub struct Plan {
    /// Exactly one canonical source per logical key, in discovery order.
    pub chosen: Vec<SourceFile>,
    /// Everything that lost its group, with reason `"dedupe"`.
    pub skipped: Vec<SkippedFile>,
}

/// Priority score for a candidate. Higher wins; ties go to the newer file.
pub fn score(file: &SourceFile) -> u32 {
    if file.kind.is_pdf() {
        if file.base_name.to_lowercase().contains("fillable") {
            400
        } else {
            300
        }
    } else if file.kind.is_office() {
        200
    } else {
        100
    }
}

/// Whether `a` beats `b` for the canonical slot.
fn beats(a: &SourceFile, b: &SourceFile) -> bool {
    let (sa, sb) = (score(a), score(b));
    sa > sb || (sa == sb && a.modified_at_ms > b.modified_at_ms)
}

/// Group `files` by logical key and select one winner per group.
///
/// Winners keep their discovery order (the order the batch converts in);
/// the invariant is that for a key with N ≥ 2 candidates, exactly one is
/// chosen and N−1 land in `skipped`.
pub fn build_plan(files: Vec<SourceFile>) -> Plan {
    // Index of the current winner per key, into `files`.
    let mut winner_by_key: HashMap<DocKey, usize> = HashMap::new();

    for (idx, file) in files.iter().enumerate() {
        let key = DocKey::of(file);
        match winner_by_key.get(&key) {
            Some(&current) => {
                if beats(file, &files[current]) {
                    debug!(
                        "dedupe: {} supersedes {}",
                        file.relative_path.display(),
                        files[current].relative_path.display()
                    );
                    winner_by_key.insert(key, idx);
                }
            }
            None => {
                winner_by_key.insert(key, idx);
            }
        }
    }

    let winner_set: std::collections::HashSet<usize> = winner_by_key.into_values().collect();
    let mut plan = Plan::default();
    for (idx, file) in files.into_iter().enumerate() {
        if winner_set.contains(&idx) {
            plan.chosen.push(file);
        } else {
            plan.skipped.push(SkippedFile {
                lane: file.lane,
                file: file.relative_path.to_string_lossy().into_owned(),
                reason: "dedupe".to_string(),
            });
        }
    }

    info!(
        "dedupe: {} chosen, {} skipped",
        plan.chosen.len(),
        plan.skipped.len()
    );
    plan
}
