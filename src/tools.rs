//! External tool detection.
//!
//! All three collaborators — the headless browser, the office converter,
//! and the PDF optimizer — are optional at startup. Absence degrades
//! functionality (skipped conversions, skipped optimization) rather than
//! crashing the run; per-file capability errors surface in the manifest
//! when an absent tool is actually needed.

use crate::process::{run, RunOptions};
use std::path::PathBuf;
use tracing::{info, warn};

/// Candidate binary names per tool, tried in order.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];
const OFFICE_CANDIDATES: &[&str] = &["soffice", "libreoffice"];
const OPTIMIZER_CANDIDATES: &[&str] = &["gs"];

/// Resolved external tools for one run.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    /// Headless browser for markdown rendering.
    pub browser: Option<PathBuf>,
    /// Office-document converter.
    pub office: Option<PathBuf>,
    /// PDF optimizer (Ghostscript).
    pub optimizer: Option<PathBuf>,
}

fn find_first(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|name| which::which(name).ok())
}

/// Probe PATH for each tool and report what this run can do.
pub fn detect() -> ToolSet {
    let tools = ToolSet {
        browser: find_first(BROWSER_CANDIDATES),
        office: find_first(OFFICE_CANDIDATES),
        optimizer: find_first(OPTIMIZER_CANDIDATES),
    };

    match &tools.browser {
        Some(p) => info!("browser: {}", p.display()),
        None => warn!("browser not found — markdown sources will fail to convert"),
    }
    match &tools.office {
        Some(p) => info!("office converter: {}", p.display()),
        None => warn!("office converter not found — spreadsheet/slides sources will fail"),
    }
    match &tools.optimizer {
        Some(p) => info!("optimizer: {}", p.display()),
        None => warn!("ghostscript not found — optimization will be skipped"),
    }

    tools
}

/// Best-effort install of missing tools, then re-probe.
///
/// Failures are logged and swallowed: the run proceeds with whatever is
/// available, and per-file capability errors tell the rest of the story.
pub async fn detect_with_install(install_missing: bool) -> ToolSet {
    let tools = detect();
    if !install_missing {
        return tools;
    }
    if tools.browser.is_some() && tools.office.is_some() && tools.optimizer.is_some() {
        return tools;
    }

    let mut wanted: Vec<&str> = Vec::new();
    if tools.browser.is_none() {
        wanted.push("chromium");
    }
    if tools.office.is_none() {
        wanted.push("libreoffice");
    }
    if tools.optimizer.is_none() {
        wanted.push("ghostscript");
    }

    for package in wanted {
        info!("attempting best-effort install of {package}");
        let args = vec![
            "install".to_string(),
            "-y".to_string(),
            package.to_string(),
        ];
        if let Err(e) = run(
            "apt-get",
            "apt-get",
            &args,
            &RunOptions::with_timeout(300_000),
        )
        .await
        {
            warn!("install of {package} failed ({e}); continuing without it");
        }
    }

    detect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_first_handles_missing_candidates() {
        assert!(find_first(&["definitely-not-a-real-binary-a7f3"]).is_none());
    }

    #[test]
    fn find_first_locates_common_binary() {
        // `sh` exists on every platform these tests run on.
        assert!(find_first(&["sh"]).is_some());
    }
}
