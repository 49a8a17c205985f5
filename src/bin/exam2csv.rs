//! CLI binary for edgequake-exam2csv.
//!
//! A thin shim over the library crate that maps CLI flags to `ExamConfig`,
//! drives one `Pipeline` run, and prints or exports the records.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_exam2csv::{
    filter_records, inspect_with, load_document, write_csv, ExamConfig, ExamError, ExamRecord,
    Pipeline,
    PipelineObserver, ProcessingStatus,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
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

// ── Spinner observer using indicatif ─────────────────────────────────────────

/// Shows the pipeline status label on a spinner and logs stage milestones
/// above it.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineObserver for SpinnerObserver {
    fn on_status_change(&self, _from: ProcessingStatus, to: ProcessingStatus) {
        if to.is_terminal() {
            self.bar.finish_and_clear();
        } else {
            self.bar.set_message(to.label());
        }
    }

    fn on_pages_rendered(&self, page_count: usize) {
        self.bar.println(format!(
            "  {} {} page(s) rendered",
            green("✓"),
            bold(&page_count.to_string())
        ));
    }

    fn on_records_extracted(&self, record_count: usize) {
        self.bar.println(format!(
            "  {} {} record(s) extracted",
            green("✓"),
            bold(&record_count.to_string())
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract and print the table
  exam2csv schedule.pdf

  # Export every record to CSV
  exam2csv schedule.pdf -o schedule.csv

  # Show only rows mentioning a subject code (export is never filtered)
  exam2csv schedule.pdf --search CS101 -o schedule.csv

  # Records as JSON
  exam2csv --json schedule.pdf > records.json

  # Download the PDF first
  exam2csv https://example.edu/exams/may-2024.pdf -o may.csv

  # Use another vision provider through edgequake-llm
  exam2csv --provider openai --model gpt-4.1 schedule.pdf

  # Page count and metadata (no API key needed)
  exam2csv --inspect-only schedule.pdf

POLICY:
  Only the first 10 pages are processed (--max-pages). Pages are rendered at
  2x (--scale) and sent as JPEG (--jpeg-quality) in a single request.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  API_KEY                 Fallback for GEMINI_API_KEY
  OPENAI_API_KEY          OpenAI API key (--provider openai)
  ANTHROPIC_API_KEY       Anthropic API key (--provider anthropic)
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override log filter (e.g. edgequake_exam2csv=debug)
"#;

/// Extract exam-schedule records from PDFs using a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "exam2csv",
    version,
    about = "Extract exam-schedule tables from PDF files into CSV using a vision model",
    long_about = "Render the first pages of an exam-schedule PDF (local file or URL), send them \
to a vision model in one request, and print the extracted records or export them as CSV. \
Uses Google Gemini with a response schema by default; OpenAI, Anthropic, Ollama and other \
edgequake-llm providers are also supported.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write all records to this CSV file.
    #[arg(short, long, env = "EXAM2CSV_OUTPUT")]
    output: Option<PathBuf>,

    /// Print records as JSON instead of a table.
    #[arg(long, env = "EXAM2CSV_JSON")]
    json: bool,

    /// Only display records containing this text (case-insensitive).
    #[arg(short, long, env = "EXAM2CSV_SEARCH")]
    search: Option<String>,

    /// Extraction provider: gemini (default), openai, anthropic, ollama, …
    #[arg(long, env = "EXAM2CSV_PROVIDER")]
    provider: Option<String>,

    /// Model ID. Default: gemini-3-flash-preview (gemini), gpt-4.1-nano (others).
    #[arg(long, env = "EXAM2CSV_MODEL")]
    model: Option<String>,

    /// Gemini API key. Falls back to the API_KEY environment variable.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini REST base URL (for proxies).
    #[arg(long, env = "EXAM2CSV_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Maximum number of pages processed, from page 1.
    #[arg(long, env = "EXAM2CSV_MAX_PAGES", default_value_t = 10)]
    max_pages: usize,

    /// Render scale relative to native page size (0.5–8.0).
    #[arg(long, env = "EXAM2CSV_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// JPEG quality for page images (1–100).
    #[arg(long, env = "EXAM2CSV_JPEG_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "EXAM2CSV_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "EXAM2CSV_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max model output tokens for the whole document.
    #[arg(long, env = "EXAM2CSV_MAX_TOKENS", default_value_t = 16384)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "EXAM2CSV_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Path to libpdfium (file or directory).
    #[arg(long = "pdfium-lib", env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Disable the spinner.
    #[arg(long, env = "EXAM2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EXAM2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, env = "EXAM2CSV_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "EXAM2CSV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Extraction request timeout in seconds.
    #[arg(long, env = "EXAM2CSV_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports every stage; INFO logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    let spinner = show_progress.then(SpinnerObserver::new);
    let config = build_config(&cli, spinner.clone()).await?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let meta = inspect_with(&cli.input, &config)
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("Processed:    {} (cap {})", meta.pages_processed, config.max_pages);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
        }
        return Ok(());
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let start = Instant::now();
    let document = load_document(&cli.input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to open '{}'", cli.input))?;
    let pipeline = Pipeline::from_config(&config).context("Invalid configuration")?;

    let records = match pipeline.process(document).await {
        Ok(records) => records,
        Err(e) => {
            if let Some(s) = &spinner {
                s.bar.finish_and_clear();
            }
            print_failure_panel(&e);
            std::process::exit(1);
        }
    };

    // ── Export (always the full set) ─────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        write_csv(output_path, &records)
            .await
            .context("Failed to write CSV")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} record(s)  {}ms  →  {}",
                green("✔"),
                records.len(),
                start.elapsed().as_millis(),
                bold(&output_path.display().to_string()),
            );
        }
    }

    // ── Display (filtered) ───────────────────────────────────────────────
    let query = cli.search.as_deref().unwrap_or("");
    let shown = filter_records(&records, query);

    if cli.json {
        let json = serde_json::to_string_pretty(&shown).context("Failed to serialise records")?;
        println!("{json}");
    } else if cli.output.is_none() || cli.search.is_some() {
        print!("{}", render_table(&shown, !query.is_empty()));
    }

    if !cli.quiet && cli.output.is_none() && !cli.json {
        eprintln!(
            "{} extracted in {}",
            cyan("◆"),
            dim(&format!("{:.1}s", start.elapsed().as_secs_f64()))
        );
    }

    Ok(())
}

/// Map CLI args to `ExamConfig`.
async fn build_config(
    cli: &Cli,
    observer: Option<Arc<SpinnerObserver>>,
) -> Result<ExamConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var("API_KEY").ok())
        .filter(|k| !k.trim().is_empty());

    let mut builder = ExamConfig::builder()
        .max_pages(cli.max_pages)
        .render_scale(cli.scale)
        .jpeg_quality(cli.jpeg_quality)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref url) = cli.api_base_url {
        builder = builder.api_base_url(url);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref path) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(path);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs as Arc<dyn PipelineObserver>);
    }

    builder.build().context("Invalid configuration")
}

/// Panel body for a failed run. Retryable failures always end with a
/// "try again" line.
fn failure_lines(error: &ExamError) -> Vec<String> {
    let message = error.to_string();
    let mut lines: Vec<String> = message.lines().map(str::to_string).collect();
    if error.is_retryable() && !message.to_lowercase().contains("try again") {
        lines.push("Please try again; this failure may be temporary.".to_string());
    }
    lines
}

fn print_failure_panel(error: &ExamError) {
    eprintln!();
    eprintln!("{} {}", red("✘"), bold(&red("Extraction failed")));
    for line in failure_lines(error) {
        eprintln!("  {} {}", red("│"), line);
    }
    eprintln!();
}

const MAX_CELL_WIDTH: usize = 28;

/// Plain-text table with a "Total Records" footer counting the shown rows.
fn render_table(records: &[&ExamRecord], filtered: bool) -> String {
    if records.is_empty() {
        return if filtered {
            "No matching records found.\n".to_string()
        } else {
            "No records extracted.\n".to_string()
        };
    }

    let headers = edgequake_exam2csv::record::COLUMN_HEADERS;
    let rows: Vec<[String; 7]> = records
        .iter()
        .map(|r| r.fields().map(|v| truncate(v, MAX_CELL_WIDTH)))
        .collect();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[&str]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let mut out = String::new();
    out.push_str(&line(&headers));
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    out.push_str(&format!("{}\n", rule.join("  ")));
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&line(&cells));
    }
    out.push_str(&format!("\nTotal Records: {}\n", records.len()));
    out
}

fn truncate(value: &str, max: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max - 1).collect();
        format!("{cut}…")
    }
}
