//! CLI binary for easyread.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ProcessingConfig`, picks a simplifier and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use easyread::{
    process_input, process_to_file, BatchOutput, BatchProgress, BatchProgressListener,
    ClientContext, HttpSimplifier, ImageSetSelection, LlmSimplifier, LlmSimplifierConfig,
    OutputFormat, ProcessingConfig, ProgressCallback, Simplifier,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
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

/// Bar positions per page, so fractional progress (0.25, 0.5, 0.75) renders.
const TICKS_PER_PAGE: u64 = 100;

// ── CLI progress listener using indicatif ────────────────────────────────────

/// Terminal progress listener: a live bar driven by fractional page
/// progress, plus one log line per finished page.
struct CliProgressListener {
    bar: ProgressBar,
    /// When the page in flight started.
    page_started: Mutex<Instant>,
}

impl CliProgressListener {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(Instant::now()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {msg}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64 * TICKS_PER_PAGE);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix("Simplifying");
    }

    /// Seconds since the previous page finished, restarting the clock.
    fn lap(&self) -> f64 {
        match self.page_started.lock() {
            Ok(mut started) => {
                let secs = started.elapsed().as_secs_f64();
                *started = Instant::now();
                secs
            }
            Err(_) => 0.0,
        }
    }
}

impl BatchProgressListener for CliProgressListener {
    fn on_batch_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.lap();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Simplifying {total_pages} pages…"))
        ));
    }

    fn on_progress(&self, progress: &BatchProgress) {
        self.bar
            .set_position((progress.pages_completed * TICKS_PER_PAGE as f64).round() as u64);
        self.bar.set_message(progress.step_label.clone());
    }

    fn on_page_complete(&self, page_num: usize, total: usize, sentence_count: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{sentence_count:>3} sentences")),
            dim(&format!("{:.1}s", self.lap())),
        ));
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.lap())),
        ));
    }

    fn on_batch_complete(&self, total_pages: usize, failed_pages: usize) {
        self.bar.finish_and_clear();
        let ok = total_pages.saturating_sub(failed_pages);
        if failed_pages == 0 {
            eprintln!("{} {} pages simplified", green("✔"), bold(&ok.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages simplified  ({} replaced by a placeholder)",
                if failed_pages == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&ok.to_string()),
                total_pages,
                red(&failed_pages.to_string()),
            );
        }
    }

    fn on_batch_aborted(&self, reason: &str) {
        self.bar.abandon_with_message(red(reason));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Simplify a markdown file through a running backend
  easyread --backend-url http://localhost:8000/api notes.md

  # Simplify a PDF with an LLM directly, write Markdown to a file
  easyread --provider openai --model gpt-4.1-mini leaflet.pdf -o leaflet.md

  # Only draw images from two sets, and remember that choice
  easyread --sets health,transport --save-selection letter.md

  # List the image sets the backend knows about
  easyread --list-sets

  # Read from stdin, JSON output
  cat letter.md | easyread --json -

PAGES:
  Separate pages with a line containing ---PAGE_BREAK---. PDF input is split
  at its page boundaries automatically. Pages are processed one at a time;
  a page that fails becomes "Error processing content on this page." and
  the rest of the document still completes (exit code 0 unless --strict).

ENVIRONMENT VARIABLES:
  EASYREAD_BACKEND_URL    Base URL of the EasyRead REST backend
  EASYREAD_API_TOKEN      Bearer token for the backend
  EASYREAD_CONTEXT        Path of the saved client context
  EASYREAD_LLM_PROVIDER   LLM provider when no backend is configured
  EASYREAD_MODEL          LLM model ID
  OPENAI_API_KEY          OpenAI API key (LLM mode)
  ANTHROPIC_API_KEY       Anthropic API key (LLM mode)
  PDFIUM_LIB_PATH         Path to libpdfium, for PDF input
"#;

/// Turn documents into Easy Read sentences with image tags.
#[derive(Parser, Debug)]
#[command(
    name = "easyread",
    version,
    about = "Turn documents into Easy Read sentences with image tags",
    long_about = "Split a document (markdown, text, PDF or URL) into pages and simplify each \
page into short Easy Read sentences, each paired with an image-retrieval tag. Uses an EasyRead \
REST backend when --backend-url is set, otherwise an LLM provider via edgequake-llm.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown/text file, PDF, HTTP/HTTPS URL, or `-` for stdin.
    #[arg(required_unless_present = "list_sets")]
    input: Option<String>,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "EASYREAD_OUTPUT")]
    output: Option<PathBuf>,

    /// Output structured JSON (BatchOutput) instead of Markdown.
    #[arg(long, env = "EASYREAD_JSON")]
    json: bool,

    /// Image sets to draw from, comma separated. Default: saved selection, else all.
    #[arg(long, env = "EASYREAD_SETS", value_delimiter = ',')]
    sets: Vec<String>,

    /// List the backend's image sets and exit.
    #[arg(long)]
    list_sets: bool,

    /// Save the selection from --sets to the client context.
    #[arg(long)]
    save_selection: bool,

    /// Client context file. Default: $EASYREAD_CONTEXT or ~/.config/easyread/context.json.
    #[arg(long)]
    context: Option<PathBuf>,

    /// EasyRead backend base URL, e.g. http://localhost:8000/api.
    #[arg(long, env = "EASYREAD_BACKEND_URL")]
    backend_url: Option<String>,

    /// Bearer token for the backend.
    #[arg(long, env = "EASYREAD_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// LLM provider when no backend is set: openai, anthropic, gemini, ollama.
    #[arg(long, env = "EASYREAD_LLM_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID.
    #[arg(long, env = "EASYREAD_MODEL")]
    model: Option<String>,

    /// Path to a text file containing a custom conversion prompt (LLM mode).
    #[arg(long, env = "EASYREAD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "EASYREAD_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "EASYREAD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Skip the validate/revise steps (LLM mode).
    #[arg(long)]
    no_validate: bool,

    /// Ask the backend to avoid repeating an image within the document.
    #[arg(long, env = "EASYREAD_PREVENT_DUPLICATES")]
    prevent_duplicates: bool,

    /// Per-page timeout in seconds. A page that times out becomes a placeholder.
    #[arg(long, env = "EASYREAD_PAGE_TIMEOUT")]
    page_timeout: Option<u64>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "EASYREAD_PDF_PASSWORD", hide_env_values = true)]
    pdf_password: Option<String>,

    /// HTTP download timeout in seconds for URL input.
    #[arg(long, env = "EASYREAD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Exit with an error if any page fell back to a placeholder.
    #[arg(long)]
    strict: bool,

    /// Disable progress bar.
    #[arg(long, env = "EASYREAD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "EASYREAD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "EASYREAD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is set.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_sets;
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

    // ── Client context ───────────────────────────────────────────────────
    let context_path = cli.context.clone().or_else(ClientContext::default_path);
    let mut ctx = match context_path {
        Some(ref path) => ClientContext::load_or_default(path)
            .await
            .context("Failed to load client context")?,
        None => ClientContext::default(),
    };
    if cli.backend_url.is_some() {
        ctx.backend_url = cli.backend_url.clone();
    }
    if cli.api_token.is_some() {
        ctx.api_token = cli.api_token.clone();
    }
    let mut ctx = ctx.with_env_defaults();
    if cli.prevent_duplicates {
        ctx.prevent_duplicate_images = true;
    }

    let simplifier = build_simplifier(&cli, &ctx).await?;

    // ── Image sets ───────────────────────────────────────────────────────
    let sets = simplifier
        .list_image_sets()
        .await
        .context("Failed to list image sets")?;

    if cli.list_sets {
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&sets).context("Failed to serialise image sets")?
            );
        } else if sets.is_empty() {
            eprintln!("No image sets available from {}", simplifier.name());
        } else {
            for set in &sets {
                let mark = if ctx.selected_sets.is_empty() || ctx.selected_sets.contains(&set.name)
                {
                    green("●")
                } else {
                    dim("○")
                };
                println!("{} {:<24} {}", mark, set.name, dim(&format!("{} images", set.item_count)));
            }
        }
        return Ok(());
    }

    let selection = if !cli.sets.is_empty() {
        let mut selection = ImageSetSelection::from_summaries(&sets);
        selection.select_none();
        for name in &cli.sets {
            selection.insert(name.trim().to_string());
        }
        selection
    } else {
        ctx.selection_for(sets.iter().map(|s| s.name.clone()))
    };

    if cli.save_selection {
        ctx.remember_selection(&selection);
        match context_path {
            Some(ref path) => {
                ctx.save(path).await.context("Failed to save client context")?;
                if !cli.quiet {
                    eprintln!("{} selection saved to {}", green("✔"), dim(&path.display().to_string()));
                }
            }
            None => anyhow::bail!("No context path: pass --context or set EASYREAD_CONTEXT"),
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressListener::new() as Arc<dyn BatchProgressListener>)
    } else {
        None
    };
    let config = build_config(&cli, &ctx, progress_cb)?;

    let input = cli
        .input
        .as_deref()
        .context("An input document is required")?;

    // ── Run batch ────────────────────────────────────────────────────────
    let output = if let Some(ref output_path) = cli.output {
        let format = if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Markdown
        };
        let output = process_to_file(simplifier, input, output_path, format, &selection, &config)
            .await
            .context("Processing failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} sentences  {}ms  →  {}",
                if output.had_page_error {
                    cyan("⚠")
                } else {
                    green("✔")
                },
                output.stats.total_sentences,
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
        output
    } else {
        let output = process_input(simplifier, input, &selection, &config)
            .await
            .context("Processing failed")?;
        write_stdout(&output, cli.json)?;
        if !cli.quiet && !show_progress {
            eprintln!(
                "Simplified {}/{} pages in {}ms",
                output.stats.processed_pages, output.stats.total_pages, output.stats.total_duration_ms
            );
            if output.stats.failed_pages > 0 {
                eprintln!("  {} pages failed", output.stats.failed_pages);
            }
        }
        output
    };

    if cli.strict {
        output.into_result().context("Some pages could not be simplified")?;
    }

    Ok(())
}

/// Backend if one is configured, otherwise an LLM provider.
async fn build_simplifier(cli: &Cli, ctx: &ClientContext) -> Result<Arc<dyn Simplifier>> {
    if ctx.backend_url.is_some() {
        let http = HttpSimplifier::from_context(ctx, cli.page_timeout)
            .context("Failed to configure backend client")?;
        return Ok(Arc::new(http));
    }

    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let llm = LlmSimplifier::from_config(LlmSimplifierConfig {
        model: cli.model.clone(),
        provider_name: cli.provider.clone(),
        temperature: cli.temperature,
        max_tokens: cli.max_tokens,
        system_prompt,
        validate: !cli.no_validate,
        ..Default::default()
    })
    .context("Failed to configure LLM provider")?;
    Ok(Arc::new(llm))
}

/// Map CLI args to `ProcessingConfig`.
fn build_config(
    cli: &Cli,
    ctx: &ClientContext,
    progress: Option<ProgressCallback>,
) -> Result<ProcessingConfig> {
    let mut builder = ProcessingConfig::builder()
        .prevent_duplicate_images(ctx.prevent_duplicate_images)
        .download_timeout_secs(cli.download_timeout);

    if let Some(secs) = cli.page_timeout {
        builder = builder.page_timeout_secs(secs);
    }
    if let Some(ref pwd) = cli.pdf_password {
        builder = builder.pdf_password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn write_stdout(output: &BatchOutput, json: bool) -> Result<()> {
    if json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }
    let markdown = output.to_markdown();
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(markdown.as_bytes())
        .context("Failed to write to stdout")?;
    Ok(())
}
