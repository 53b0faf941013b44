//! Structural PDF validation: the cheap sniff-test run on every output.
//!
//! ## Why a sniff and not a parse?
//!
//! Every produced file is validated, every run. Full PDF parsing would cost
//! tens of milliseconds per file and drag in a parser dependency for a
//! question three byte checks can answer: a file that is large enough,
//! starts with `%PDF`, and ends with `%%EOF` survived its producer; a file
//! missing any of those was truncated, garbled, or is not a PDF at all.
//! Renderers that die mid-write reliably fail the size floor or the
//! trailer check, which is exactly the failure class this pipeline has to
//! catch.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Default size floor in bytes. Below this, a "PDF" is almost certainly a
/// failed or partial render.
pub const DEFAULT_MIN_PDF_BYTES: u64 = 8_000;

/// PDF file signature — the first four bytes of every well-formed PDF.
const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// End-of-file marker expected within the final bytes of the file.
const PDF_EOF: &[u8] = b"%%EOF";

/// Verdict of a structural validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validity {
    pub ok: bool,
    /// Human-readable reason, present iff `ok` is false.
    pub reason: Option<String>,
}

impl Validity {
    fn pass() -> Self {
        Validity {
            ok: true,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Validity {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Check that `path` is plausibly a well-formed PDF.
///
/// Rules, in order (short-circuit on first failure):
/// 1. File exists and is at least `min_bytes` long.
/// 2. The first 4 bytes equal `%PDF`.
/// 3. The last 6 bytes contain `%%EOF`.
pub fn validate(path: &Path, min_bytes: u64) -> Validity {
    let meta = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return Validity::fail("file does not exist"),
    };

    if meta.len() < min_bytes {
        return Validity::fail(format!(
            "file is {} bytes, below the {} byte floor",
            meta.len(),
            min_bytes
        ));
    }

    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => return Validity::fail(format!("cannot open: {e}")),
    };

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != PDF_MAGIC {
        return Validity::fail("missing %PDF header signature");
    }

    let mut tail = [0u8; 6];
    if file.seek(SeekFrom::End(-6)).is_err() || file.read_exact(&mut tail).is_err() {
        return Validity::fail("cannot read file trailer");
    }
    if !tail.windows(PDF_EOF.len()).any(|w| w == PDF_EOF) {
        return Validity::fail("missing %%EOF marker");
    }

    Validity::pass()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Build a structurally valid PDF-shaped byte blob of at least `len` bytes.
    pub fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(len.saturating_sub(6).max(bytes.len()), b' ');
        bytes.extend_from_slice(b"\n%%EOF");
        bytes
    }

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn missing_file_rejected() {
        let v = validate(Path::new("/nonexistent/doc.pdf"), DEFAULT_MIN_PDF_BYTES);
        assert!(!v.ok);
        assert!(v.reason.unwrap().contains("does not exist"));
    }

    #[test]
    fn tiny_file_rejected() {
        let f = write_temp(&[0u8; 100]);
        let v = validate(f.path(), DEFAULT_MIN_PDF_BYTES);
        assert!(!v.ok);
        assert!(v.reason.unwrap().contains("floor"));
    }

    #[test]
    fn valid_pdf_accepted() {
        let f = write_temp(&pdf_bytes(8_000));
        let v = validate(f.path(), DEFAULT_MIN_PDF_BYTES);
        assert!(v.ok, "reason: {:?}", v.reason);
    }

    #[test]
    fn missing_header_rejected() {
        let mut bytes = pdf_bytes(8_000);
        bytes[0] = b'X';
        let f = write_temp(&bytes);
        let v = validate(f.path(), DEFAULT_MIN_PDF_BYTES);
        assert!(!v.ok);
        assert!(v.reason.unwrap().contains("%PDF"));
    }

    #[test]
    fn missing_eof_marker_rejected() {
        let mut bytes = pdf_bytes(8_000);
        let n = bytes.len();
        bytes[n - 6..].copy_from_slice(b"      ");
        let f = write_temp(&bytes);
        let v = validate(f.path(), DEFAULT_MIN_PDF_BYTES);
        assert!(!v.ok);
        assert!(v.reason.unwrap().contains("%%EOF"));
    }

    #[test]
    fn custom_floor_respected() {
        let f = write_temp(&pdf_bytes(500));
        assert!(validate(f.path(), 100).ok);
        assert!(!validate(f.path(), 10_000).ok);
    }
}
