//! CLI binary for pdf-table-skeleton.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_table_skeleton::{
    extract, ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, PageState,
    ProgressCallback, SkeletonBackend, TableMeta, TargetPages,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the page currently in flight; pages run one at a time.
    page_started: Mutex<Option<Instant>>,
    failed_tables: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` supplies the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            failed_tables: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
    }

    fn elapsed(&self) -> String {
        let secs = self
            .page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Analysing {total_pages} target pages…"))
        ));
    }

    fn on_page_start(&self, page: u32, _total: usize) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_cached(&self, page: u32, _total: usize) {
        self.bar.set_message(format!("page {page} (cached)"));
    }

    fn on_table_analyzed(&self, page: u32, table_index: u32, success: bool) {
        if !success {
            self.failed_tables.fetch_add(1, Ordering::SeqCst);
        }
        self.bar
            .set_message(format!("page {page}: table {table_index}"));
    }

    fn on_page_complete(&self, page: u32, _total: usize, table_count: usize) {
        self.bar.println(format!(
            "  {} Page {:>4}  {:<10}  {}",
            green("✓"),
            page,
            dim(&format!("{table_count:>2} tables")),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page: u32, _total: usize, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>4}  {}  {}",
            red("✗"),
            page,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _total_pages: usize, table_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.failed_tables.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} tables extracted", green("✔"), bold(&table_count.to_string()));
        } else {
            eprintln!(
                "{} {} tables extracted  ({} failed)",
                cyan("⚠"),
                bold(&table_count.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Tables on pages 1 and 3, default logs under json_extracted/
  table-skeleton --pages 1,3 raws_split/report_part02.pdf

  # A range, with the model-free skeleton reader
  table-skeleton --pages 5-8 --skeleton-engine markdown report.pdf

  # Separate logs per document, JSON summary on stdout
  table-skeleton --pages 2,4 --text-log out/p2_text.jsonl \
      --table-log out/p2_tables.jsonl --json report.pdf > run.json

CACHING:
  Pages recorded as successful in the text log are never sent to the OCR or
  structuring model again. Delete their lines to force re-extraction.
  Failed pages are retried on every run. The table log is rewritten from
  scratch on every run.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  PDFIUM_LIB_PATH         Directory containing libpdfium
"#;

/// Extract table skeletons from financial-report PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "table-skeleton",
    version,
    about = "Extract table skeletons (captions, headers, counts) from PDF pages",
    long_about = "Render selected PDF pages, transcribe them with a vision model, segment the \
text into typed sections and extract the structure of every table: caption, column headers, \
row headers, row and column counts. Cell values are never extracted.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF file to analyse.
    input: PathBuf,

    /// Target pages: 5, 1,3,5 or 3-8 (1-based).
    #[arg(long, env = "TABLE_SKELETON_PAGES")]
    pages: String,

    /// Append-only page cache.
    #[arg(long, env = "TABLE_SKELETON_TEXT_LOG",
          default_value = pdf_table_skeleton::config::DEFAULT_TEXT_LOG)]
    text_log: PathBuf,

    /// Table log, rewritten on every run.
    #[arg(long, env = "TABLE_SKELETON_TABLE_LOG",
          default_value = pdf_table_skeleton::config::DEFAULT_TABLE_LOG)]
    table_log: PathBuf,

    /// Rendering DPI (72–400).
    #[arg(long, env = "TABLE_SKELETON_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "TABLE_SKELETON_PROVIDER",
        long_help = "LLM provider for all model stages. Auto-detected from API key env vars if not set."
    )]
    provider: Option<String>,

    /// Vision model for raw OCR.
    #[arg(long, env = "TABLE_SKELETON_OCR_MODEL", default_value = "gpt-4o")]
    ocr_model: String,

    /// Tool-calling model for page structuring.
    #[arg(long, env = "TABLE_SKELETON_STRUCTURE_MODEL", default_value = "o3")]
    structure_model: String,

    /// Tool-calling model for table skeletons.
    #[arg(long, env = "TABLE_SKELETON_SKELETON_MODEL", default_value = "o3")]
    skeleton_model: String,

    /// Skeleton engine: llm or markdown.
    #[arg(long, env = "TABLE_SKELETON_SKELETON_ENGINE", value_enum, default_value = "llm")]
    skeleton_engine: EngineArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "TABLE_SKELETON_PASSWORD")]
    password: Option<String>,

    /// Directory containing the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the full run output as JSON on stdout.
    #[arg(long, env = "TABLE_SKELETON_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TABLE_SKELETON_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TABLE_SKELETON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TABLE_SKELETON_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum EngineArg {
    Llm,
    Markdown,
}

impl From<EngineArg> for SkeletonBackend {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Llm => SkeletonBackend::Llm,
            EngineArg::Markdown => SkeletonBackend::Markdown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let output = extract(&config).await.context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, &config);
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let pages: TargetPages = cli
        .pages
        .parse()
        .with_context(|| format!("Invalid --pages value '{}'", cli.pages))?;

    let mut builder = ExtractionConfig::builder()
        .pdf_path(&cli.input)
        .pages(pages)
        .text_log(&cli.text_log)
        .table_log(&cli.table_log)
        .dpi(cli.dpi)
        .ocr_model(&cli.ocr_model)
        .structure_model(&cli.structure_model)
        .skeleton_model(&cli.skeleton_model)
        .skeleton_backend(cli.skeleton_engine.clone().into());

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref dir) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(output: &ExtractionOutput, config: &ExtractionConfig) {
    for table in &output.tables {
        match &table.meta {
            TableMeta::Skeleton(s) => {
                let merged = s
                    .merged_from
                    .map(|[a, b]| dim(&format!("  (merged {a}+{b})")))
                    .unwrap_or_default();
                println!(
                    "#{:<3} page {:<4} {} cols × {} rows  {}{}",
                    table.table_index,
                    table.page,
                    s.column_count,
                    s.row_count,
                    s.caption.as_deref().unwrap_or("(no caption)"),
                    merged,
                );
            }
            TableMeta::Error(e) => println!(
                "#{:<3} page {:<4} {}: {}",
                table.table_index,
                table.page,
                red(&e.error),
                dim(&e.details)
            ),
        }
    }

    let stats = &output.stats;
    let skipped: Vec<u32> = output
        .pages
        .iter()
        .filter(|p| p.state == PageState::Skipped)
        .map(|p| p.page)
        .collect();
    eprintln!(
        "{}  {} pages ({} cached, {} processed, {} failed)  {} tables  {}ms  →  {}",
        if stats.failed_pages == 0 && stats.tables_failed == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        stats.target_pages,
        stats.cached_pages,
        stats.processed_pages,
        stats.failed_pages,
        output.tables.len(),
        stats.total_duration_ms,
        bold(&config.table_log.display().to_string()),
    );
    if !skipped.is_empty() {
        eprintln!(
            "   {} pages outside the {}-page document: {:?}",
            skipped.len(),
            stats.total_pages,
            skipped
        );
    }
}
