//! Error types for the docpress library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the batch cannot proceed at all
//!   (missing source root, output directory cannot be created, the manifest
//!   cannot be written). Returned as `Err(PipelineError)` from
//!   [`crate::run::run_pipeline`].
//!
//! * [`FileError`] — **Non-fatal**: a single document failed (converter
//!   timed out, produced garbage, tool not installed) but every other
//!   document is fine. Stored inside [`crate::manifest::ConversionResult`]
//!   so callers can inspect partial success rather than losing the whole
//!   batch to one bad file.
//!
//! The separation encodes the propagation policy: one unrenderable legacy
//! document never aborts the run, and the only run-wide fatal conditions
//! are the ones that mean the environment itself is unusable.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docpress library.
///
/// File-level failures use [`FileError`] and are stored in
/// [`crate::manifest::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A configured source root does not exist or is not a directory.
    #[error("Source root not found: '{path}'\nCheck the path exists and is a directory.")]
    RootNotFound { path: PathBuf },

    /// The output directory tree could not be created.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking a source root failed partway through.
    #[error("Failed to walk '{path}': {detail}")]
    WalkFailed { path: PathBuf, detail: String },

    /// The run manifest could not be written.
    #[error("Failed to write manifest '{path}': {source}")]
    ManifestWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal error for a single document.
///
/// Stored (stringified) alongside [`crate::manifest::ConversionResult`]
/// when a file fails. The batch continues with the next file.
#[derive(Debug, Clone, Error)]
pub enum FileError {
    /// A required external tool is not installed.
    ///
    /// Not retried — retrying will not make the tool appear.
    #[error("Required tool '{tool}' is not available.\n{hint}")]
    CapabilityMissing { tool: String, hint: String },

    /// An external process exceeded its timeout and was killed.
    #[error("'{name}' timed out after {timeout_ms}ms and was killed")]
    ProcessTimeout { name: String, timeout_ms: u64 },

    /// An external process exited non-zero.
    #[error("'{name}' exited with {code:?}: {stderr_tail}")]
    ProcessFailed {
        name: String,
        code: Option<i32>,
        stderr_tail: String,
    },

    /// A produced file failed structural PDF validation.
    ///
    /// Not retried by the process runner (the tool ran to completion and
    /// produced garbage) — eligible for the rebuild path instead.
    #[error("Output '{path}' is not a usable PDF: {reason}")]
    InvalidOutput { path: PathBuf, reason: String },

    /// The rebuild pass found no alternate source for a failed output.
    #[error("No alternate source found for '{base_name}'")]
    NoAlternateSource { base_name: String },

    /// Plain I/O failure reading a source or writing an output.
    #[error("I/O error on '{path}': {detail}")]
    Io { path: PathBuf, detail: String },
}

impl FileError {
    /// Whether retrying this failure could possibly change the outcome.
    ///
    /// Capability errors and invalid deterministic output are permanent;
    /// timeouts and non-zero exits may be transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FileError::ProcessTimeout { .. } | FileError::ProcessFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_missing_is_permanent() {
        let e = FileError::CapabilityMissing {
            tool: "soffice".into(),
            hint: "install libreoffice".into(),
        };
        assert!(!e.is_transient());
    }

    #[test]
    fn timeout_is_transient() {
        let e = FileError::ProcessTimeout {
            name: "gs".into(),
            timeout_ms: 1000,
        };
        assert!(e.is_transient());
    }

    #[test]
    fn invalid_output_display() {
        let e = FileError::InvalidOutput {
            path: PathBuf::from("out/brief.pdf"),
            reason: "missing %%EOF marker".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("brief.pdf"), "got: {msg}");
        assert!(msg.contains("%%EOF"), "got: {msg}");
    }

    #[test]
    fn process_failed_display() {
        let e = FileError::ProcessFailed {
            name: "soffice".into(),
            code: Some(77),
            stderr_tail: "no such filter".into(),
        };
        assert!(e.to_string().contains("soffice"));
        assert!(e.to_string().contains("no such filter"));
    }
}
