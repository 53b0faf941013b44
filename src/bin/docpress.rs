//! CLI binary for docpress.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use docpress::{
    run_pipeline, BatchProgressCallback, PipelineConfig, QualityProfile, RunManifest,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-file log
/// lines using [indicatif].
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_run_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Discovering sources…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_files: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_files as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_files} documents…"))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, relative_path: &str) {
        self.bar.set_message(relative_path.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, relative_path: &str, method: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            relative_path,
            dim(&format!("[{method}]")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, relative_path: &str, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            relative_path,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, ok: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} documents converted successfully",
                green("✔"),
                bold(&ok.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents converted  ({} failed)",
                if ok == 0 { red("✘") } else { cyan("⚠") },
                bold(&ok.to_string()),
                ok + failed,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert both lanes into public/pdf
  docpress content/downloads lib/pdf -o public/pdf

  # Premium quality, forced reconversion
  docpress content/downloads lib/pdf -o public/pdf --quality premium --overwrite

  # Plan only — see what would happen, write nothing
  docpress content/downloads lib/pdf -o public/pdf --dry-run --json

  # CI gate: fail the job when any document ultimately fails
  docpress content/downloads lib/pdf -o public/pdf --strict

  # Top-level files only, no optimizer pass
  docpress content/downloads lib/pdf -o public/pdf --no-recursive --no-optimize

EXTERNAL TOOLS (all optional; absence degrades, never crashes):
  Tool                      Used for                      Absent means
  ────────────────────────  ────────────────────────────  ─────────────────────────
  chromium / google-chrome  markdown → PDF rendering      markdown sources fail
  soffice (LibreOffice)     xls(x)/ppt(x) → PDF           office sources fail
  gs (Ghostscript)          PDF size/quality optimization optimization skipped

OUTPUT:
  <output>/content/…        converted content-lane documents
  <output>/library/…        converted library-lane documents
  <output>/conversion-manifest.json
                            config snapshot, per-file results, dedup skip
                            list, rebuild list, and summary counts

ENVIRONMENT VARIABLES:
  DOCPRESS_OUTPUT           Default for -o/--output
  DOCPRESS_QUALITY          Default for --quality
  DOCPRESS_MIN_BYTES        Default for --min-bytes
  DOCPRESS_CONVERT_TIMEOUT  Default for --convert-timeout (seconds)
  RUST_LOG                  Overrides log filtering (tracing EnvFilter syntax)
"#;

/// Convert and optimize a content site's documents into a PDF download tree.
#[derive(Parser, Debug)]
#[command(
    name = "docpress",
    version,
    about = "Batch-convert markdown, office, and PDF sources into a validated, optimized PDF tree",
    long_about = "Discover documents across a content root and a library root, deduplicate \
overlapping representations, convert each to PDF (copy, headless-browser render, or office \
conversion), validate every output structurally, optimize sizes via Ghostscript, and rebuild \
invalid library PDFs from alternate content sources.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Content lane root (markdown/mdx and office sources).
    content_root: PathBuf,

    /// Library lane root (hand-placed, authoritative PDFs).
    library_root: PathBuf,

    /// Output root for the converted PDF tree and the manifest.
    #[arg(short, long, env = "DOCPRESS_OUTPUT")]
    output: PathBuf,

    /// Force reconversion even when the existing output is valid and current.
    #[arg(long)]
    overwrite: bool,

    /// Plan only: record intended methods, write nothing.
    #[arg(long)]
    dry_run: bool,

    /// Exit nonzero if any file ultimately failed (after the rebuild pass).
    #[arg(long)]
    strict: bool,

    /// Only look at the top level of each source root.
    #[arg(long)]
    no_recursive: bool,

    /// Optimizer quality profile.
    #[arg(long, env = "DOCPRESS_QUALITY", value_enum, default_value = "standard")]
    quality: QualityArg,

    /// Minimum byte size for a file to count as a valid PDF.
    #[arg(long, env = "DOCPRESS_MIN_BYTES", default_value_t = 8_000)]
    min_bytes: u64,

    /// Skip the optimizer pass entirely.
    #[arg(long)]
    no_optimize: bool,

    /// Best-effort install of missing external tools before the run.
    #[arg(long)]
    install_tools: bool,

    /// Print the run manifest as JSON to stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "DOCPRESS_NO_PROGRESS")]
    no_progress: bool,

    /// Timeout per external conversion, in seconds.
    #[arg(long, env = "DOCPRESS_CONVERT_TIMEOUT", default_value_t = 120)]
    convert_timeout: u64,

    /// Timeout per optimizer pass, in seconds.
    #[arg(long, default_value_t = 90)]
    optimize_timeout: u64,

    /// Attempt budget for transient external-process failures.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Base delay for linear retry backoff, in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    retry_delay: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QualityArg {
    Draft,
    Standard,
    Premium,
    Enterprise,
}

impl From<QualityArg> for QualityProfile {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Draft => QualityProfile::Draft,
            QualityArg::Standard => QualityProfile::Standard,
            QualityArg::Premium => QualityProfile::Premium,
            QualityArg::Enterprise => QualityProfile::Enterprise,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = PipelineConfig::builder()
        .content_root(&cli.content_root)
        .library_root(&cli.library_root)
        .output_root(&cli.output)
        .recursive(!cli.no_recursive)
        .overwrite(cli.overwrite)
        .dry_run(cli.dry_run)
        .strict(cli.strict)
        .quality(cli.quality.into())
        .min_pdf_bytes(cli.min_bytes)
        .optimize(!cli.no_optimize)
        .install_missing_tools(cli.install_tools)
        .convert_timeout_ms(cli.convert_timeout.saturating_mul(1_000))
        .optimize_timeout_ms(cli.optimize_timeout.saturating_mul(1_000))
        .max_attempts(cli.max_attempts)
        .retry_base_delay_ms(cli.retry_delay);

    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new());
    }

    let config = builder.build().context("Invalid configuration")?;

    // ── Run the batch ────────────────────────────────────────────────────
    let manifest = run_pipeline(&config).await.context("Batch run failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&manifest).context("Failed to serialise manifest")?
        );
    } else if !cli.quiet {
        print_summary(&manifest, cli.dry_run);
    }

    // Non-strict runs always exit 0 and defer to the manifest; strict runs
    // gate on the post-rebuild failure count.
    if cli.strict && manifest.summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Human summary printed after the run (the callback already printed the
/// per-file log lines).
fn print_summary(manifest: &RunManifest, dry_run: bool) {
    let s = &manifest.summary;
    let tick = if s.failed == 0 { green("✔") } else { cyan("⚠") };
    let verb = if dry_run { "planned" } else { "converted" };
    eprintln!(
        "{tick}  {}/{} {verb}  {}ms",
        s.ok, s.total, s.elapsed_ms
    );
    if !manifest.skipped.is_empty() {
        eprintln!(
            "   {}",
            dim(&format!("{} duplicates skipped", manifest.skipped.len()))
        );
    }
    for rebuild in &manifest.rebuilds {
        match (&rebuild.source_used, rebuild.valid) {
            (Some(src), true) => eprintln!(
                "   {} rebuilt {} from {}",
                green("↻"),
                rebuild.target,
                src
            ),
            (Some(src), false) => eprintln!(
                "   {} rebuild of {} from {} failed",
                red("↻"),
                rebuild.target,
                src
            ),
            (None, _) => eprintln!(
                "   {} {} left invalid ({})",
                red("↻"),
                rebuild.target,
                rebuild.reason.as_deref().unwrap_or("no matching source")
            ),
        }
    }
    if s.failed > 0 {
        eprintln!("   {} documents failed — see the manifest", red(&s.failed.to_string()));
    }
}
