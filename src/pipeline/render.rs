//! Markdown rendering: front-matter stripping, HTML templating, and
//! rasterisation to PDF via a headless browser.
//!
//! ## Why a browser and not a PDF library?
//!
//! The print template uses running headers/footers, a diagonal watermark,
//! and ordinary CSS typography. A browser's print engine handles all of
//! that (plus tables, code blocks, and long-line wrapping) with one flag;
//! a PDF layout library would mean reimplementing line breaking for every
//! construct markdown can produce. The browser is already a deployment
//! dependency of the surrounding site's toolchain, so the pipeline borrows
//! it instead of growing its own layout engine.
//!
//! The template is deliberately fixed: serif body type, restrained color,
//! a running header/footer, and a very low-opacity diagonal watermark.
//! Rendering is deterministic — the same source produces the same layout —
//! which is why a failed render is never retried (see the dispatcher) but
//! is eligible for rebuild from an alternate source.

use crate::config::PipelineConfig;
use crate::error::FileError;
use crate::process::{run_with_retry, RunOptions};
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Leading YAML front-matter block (`--- … ---`) at the very start of a file.
static RE_FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\r?\n.*?\r?\n---\r?\n").unwrap());

/// Remove a leading YAML front-matter block, if present.
///
/// Front-matter is site metadata (slugs, tags, publish dates) — none of it
/// belongs in the printed document.
pub fn strip_front_matter(input: &str) -> &str {
    match RE_FRONT_MATTER.find(input) {
        Some(m) => &input[m.end()..],
        None => input,
    }
}

/// Convert the markdown body to an HTML fragment.
///
/// GFM tables, footnotes, strikethrough, and task lists are enabled — the
/// content authors use all four.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Derive a human-readable document title from a file basename.
///
/// `client-intake-form` → `Client Intake Form`.
pub fn document_title(base_name: &str) -> String {
    base_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wrap an HTML body fragment in the fixed print template.
///
/// `-webkit-print-color-adjust: exact` keeps the restrained background
/// tints and the watermark in the printed output.
pub fn build_print_html(title: &str, body_html: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  @page {{
    size: A4;
    margin: 22mm 18mm 24mm 18mm;
  }}
  * {{ -webkit-print-color-adjust: exact; print-color-adjust: exact; }}
  html {{ font-size: 11pt; }}
  body {{
    font-family: Georgia, 'Times New Roman', serif;
    color: #1a1a1a;
    line-height: 1.55;
    margin: 0;
  }}
  h1, h2, h3, h4 {{
    font-family: Georgia, serif;
    color: #12314d;
    line-height: 1.25;
    page-break-after: avoid;
  }}
  h1 {{ font-size: 1.9rem; border-bottom: 2px solid #12314d; padding-bottom: 0.3rem; }}
  h2 {{ font-size: 1.4rem; margin-top: 2rem; }}
  a {{ color: #1a5276; text-decoration: none; }}
  code {{
    font-family: 'Courier New', monospace;
    font-size: 0.9em;
    background: #f4f4f2;
    padding: 0.1em 0.3em;
  }}
  pre {{
    background: #f4f4f2;
    padding: 0.8em;
    overflow-x: hidden;
    white-space: pre-wrap;
    page-break-inside: avoid;
  }}
  table {{
    border-collapse: collapse;
    width: 100%;
    margin: 1em 0;
    page-break-inside: avoid;
  }}
  th, td {{ border: 1px solid #c9c9c4; padding: 0.4em 0.6em; text-align: left; }}
  th {{ background: #eef1f4; }}
  blockquote {{
    border-left: 3px solid #c9c9c4;
    margin-left: 0;
    padding-left: 1em;
    color: #444;
  }}
  img {{ max-width: 100%; }}
  .doc-header {{
    position: fixed;
    top: -14mm;
    left: 0;
    right: 0;
    font-size: 8pt;
    color: #8a8a85;
    border-bottom: 0.5pt solid #d5d5d0;
    padding-bottom: 1mm;
  }}
  .doc-footer {{
    position: fixed;
    bottom: -16mm;
    left: 0;
    right: 0;
    font-size: 8pt;
    color: #8a8a85;
    border-top: 0.5pt solid #d5d5d0;
    padding-top: 1mm;
    text-align: center;
  }}
  .doc-watermark {{
    position: fixed;
    top: 40%;
    left: 8%;
    transform: rotate(-35deg);
    font-size: 64pt;
    color: #12314d;
    opacity: 0.04;
    pointer-events: none;
    white-space: nowrap;
  }}
</style>
</head>
<body>
  <div class="doc-header">{title}</div>
  <div class="doc-footer">{title}</div>
  <div class="doc-watermark">{title}</div>
  <main>
{body_html}
  </main>
</body>
</html>
"#
    )
}

/// Render a markdown/mdx source file to a PDF at `dest`.
///
/// Writes the templated HTML to a temp file and drives the headless
/// browser's print engine over it. The browser binary path comes from tool
/// detection; absence is reported by the caller as a capability error
/// before this function is reached.
pub async fn render_markdown_to_pdf(
    source: &Path,
    base_name: &str,
    dest: &Path,
    browser: &Path,
    config: &PipelineConfig,
) -> Result<(), FileError> {
    let raw = std::fs::read_to_string(source).map_err(|e| FileError::Io {
        path: source.to_path_buf(),
        detail: e.to_string(),
    })?;

    let body = markdown_to_html(strip_front_matter(&raw));
    let title = document_title(base_name);
    let page = build_print_html(&title, &body);

    let mut html_file = tempfile::Builder::new()
        .prefix("docpress-")
        .suffix(".html")
        .tempfile()
        .map_err(|e| FileError::Io {
            path: source.to_path_buf(),
            detail: format!("temp html: {e}"),
        })?;
    html_file.write_all(page.as_bytes()).map_err(|e| FileError::Io {
        path: html_file.path().to_path_buf(),
        detail: e.to_string(),
    })?;
    html_file.flush().ok();

    debug!(
        "rendering {} via {} → {}",
        source.display(),
        browser.display(),
        dest.display()
    );

    let args = vec![
        "--headless".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--no-pdf-header-footer".to_string(),
        format!("--print-to-pdf={}", dest.display()),
        format!("file://{}", html_file.path().display()),
    ];

    run_with_retry(
        "browser",
        &browser.to_string_lossy(),
        &args,
        &RunOptions::with_timeout(config.convert_timeout_ms),
        config.max_attempts,
        config.retry_base_delay_ms,
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_front_matter_block() {
        let input = "---\ntitle: Waiver\ntags: [forms]\n---\n# Waiver\n\nBody.\n";
        assert_eq!(strip_front_matter(input), "# Waiver\n\nBody.\n");
    }

    #[test]
    fn leaves_files_without_front_matter_alone() {
        let input = "# Plain\n\nNo metadata here.\n";
        assert_eq!(strip_front_matter(input), input);
    }

    #[test]
    fn mid_document_rules_are_not_front_matter() {
        let input = "# Title\n\n---\nnot: metadata\n---\n";
        assert_eq!(strip_front_matter(input), input);
    }

    #[test]
    fn markdown_renders_tables() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"), "got: {html}");
    }

    #[test]
    fn title_from_basename() {
        assert_eq!(document_title("client-intake-form"), "Client Intake Form");
        assert_eq!(document_title("waiver"), "Waiver");
        assert_eq!(document_title("annual_report_2025"), "Annual Report 2025");
    }

    #[test]
    fn template_carries_header_footer_and_watermark() {
        let page = build_print_html("Waiver", "<p>hi</p>");
        assert!(page.contains("doc-header"));
        assert!(page.contains("doc-footer"));
        assert!(page.contains("doc-watermark"));
        assert!(page.contains("size: A4"));
        assert!(page.contains("<p>hi</p>"));
    }
}
