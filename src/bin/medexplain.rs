//! CLI binary for medexplain.
//!
//! A thin shim over the library crate: maps CLI flags to `ExtractionConfig`
//! and `CompletionConfig`, loads one document into a `Session`, then answers
//! questions from `-q` flags or an interactive prompt.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use medexplain::session::{DISCLAIMER, GREETING};
use medexplain::{
    resolve_document, CompletionConfig, ExtractionConfig, ExtractionError, ExtractionObserver,
    ExtractionPipeline, LlmCompletionClient, ObserverHandle, Reply, Session, Stage,
};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── Extraction observer using indicatif ──────────────────────────────────────

/// Shows the extraction stage on the spinner and prints warnings above it.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl ExtractionObserver for SpinnerObserver {
    fn on_stage(&self, stage: Stage) {
        if stage != Stage::Done {
            self.bar.set_message(format!("Analyzing document... {}", dim(&stage.to_string())));
        }
    }

    fn on_ocr_page(&self, page_num: usize, total_pages: usize) {
        self.bar
            .set_message(format!("Analyzing document... {}", dim(&format!("OCR page {page_num}/{total_pages}"))));
    }

    fn on_warning(&self, warning: &ExtractionError) {
        self.bar.println(format!("  {} {}", yellow("⚠"), warning));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask one question about a lab report
  medexplain blood-test.pdf -q "Is my hemoglobin normal?"

  # Several questions, structured JSON output
  medexplain mri-report.docx -q "What was found?" -q "What should I do next?" --json

  # Scanned report from a URL, interactive
  medexplain https://example.org/scan.jpg

  # Only show the extracted text (no API key needed)
  medexplain report.pdf --show-text

  # Use a specific provider and model
  medexplain report.pdf --provider openai --model gpt-4.1-mini

SUPPORTED DOCUMENTS:
  PDF          text layer + tables, OCR fallback for scanned pages
  PNG / JPEG   OCR
  DOCX         body paragraphs (no tables)
  Maximum size: 200 MB

ENVIRONMENT VARIABLES:
  TOGETHER_API_KEY      Together API key (DeepSeek-R1 distillation)
  OPENAI_API_KEY        OpenAI API key
  ANTHROPIC_API_KEY     Anthropic API key
  MEDEXPLAIN_PROVIDER   Override provider (openai, anthropic, gemini, ollama, ...)
  MEDEXPLAIN_MODEL      Override model ID
  PDFIUM_LIB_PATH       Path to libpdfium (file or directory)
  RUST_LOG              Log filter, e.g. medexplain=debug

RUNTIME REQUIREMENTS:
  pdfium shared library   for PDF text and rasterisation
  tesseract               for OCR (apt install tesseract-ocr)
"#;

/// Explain medical reports in plain language using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "medexplain",
    version,
    about = "Explain medical reports (PDF, image, DOCX) in plain language using an LLM",
    long_about = "Extract the text of a medical report (lab results, scan findings, medication \
lists, doctor's notes) and answer questions about it with a summary, key findings and \
recommended actions. Supports OpenAI, Anthropic, Google Gemini, Ollama and any \
OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local report file path or HTTP/HTTPS URL.
    input: String,

    /// Question to ask; repeat for several. Omit for an interactive prompt.
    #[arg(short = 'q', long = "question")]
    questions: Vec<String>,

    /// Declared media type, overriding the file extension / Content-Type.
    #[arg(long, env = "MEDEXPLAIN_MEDIA_TYPE")]
    media_type: Option<String>,

    /// LLM provider: together, openai, anthropic, gemini, openrouter, ollama.
    #[arg(long, env = "MEDEXPLAIN_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID.
    #[arg(
        long,
        env = "MEDEXPLAIN_MODEL",
        long_help = "LLM model to use. Default depends on the provider: \
deepseek-ai/DeepSeek-R1-Distill-Llama-70B-free on Together, gpt-4.1-nano on OpenAI."
    )]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MEDEXPLAIN_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "MEDEXPLAIN_MAX_TOKENS", default_value_t = 2050)]
    max_tokens: usize,

    /// Completion request timeout in seconds (also used for downloads).
    #[arg(long, env = "MEDEXPLAIN_TIMEOUT", default_value_t = 45)]
    timeout: u64,

    /// Characters of extracted text sent with each question (1–6000).
    #[arg(long, env = "MEDEXPLAIN_EXCERPT_CHARS", default_value_t = 6000,
          value_parser = clap::value_parser!(u64).range(1..=6000))]
    excerpt_chars: u64,

    /// Rendering DPI for OCR of PDF pages (72–400).
    #[arg(long, env = "MEDEXPLAIN_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Tesseract executable.
    #[arg(long, env = "MEDEXPLAIN_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// Tesseract language pack(s), e.g. eng or eng+deu.
    #[arg(long, env = "MEDEXPLAIN_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Do not detect and flatten PDF tables.
    #[arg(long)]
    no_tables: bool,

    /// Print the extracted text and exit.
    #[arg(long)]
    show_text: bool,

    /// Print answers as JSON.
    #[arg(long, env = "MEDEXPLAIN_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEDEXPLAIN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except answers and errors.
    #[arg(long, env = "MEDEXPLAIN_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinners carry progress; library INFO logs only in verbose mode.
    let show_progress = !cli.quiet && !cli.json;
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

    // ── Load document ────────────────────────────────────────────────────
    let doc = resolve_document(&cli.input, cli.media_type.as_deref(), cli.timeout)
        .await
        .with_context(|| format!("Failed to read '{}'", cli.input))?;

    let bar = show_progress.then(|| spinner("Analyzing document..."));
    let observer: Option<ObserverHandle> = bar
        .as_ref()
        .map(|b| Arc::new(SpinnerObserver { bar: b.clone() }) as ObserverHandle);

    let completion_config = build_completion_config(&cli)?;
    let pipeline = ExtractionPipeline::new(build_extraction_config(&cli, observer)?);
    let mut session = Session::with_config(&completion_config);
    let loaded = session.load_document_async(&pipeline, &doc).await;
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    let extraction = loaded.context("Failed to process document")?;

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}  {}",
            bold("◆"),
            bold(&doc.name),
            dim(&format!(
                "{} · {} chars{}",
                extraction.kind,
                extraction.text.char_count(),
                match extraction.method {
                    Some(medexplain::ExtractionMethod::Ocr) => " · OCR",
                    _ => "",
                }
            ))
        );
    }

    if cli.show_text {
        println!("{}", extraction.text);
        return Ok(());
    }

    // ── Answer questions ─────────────────────────────────────────────────
    let client = LlmCompletionClient::from_config(&completion_config)
        .context("No LLM provider available")?;

    let mut replies = Vec::new();
    if cli.questions.is_empty() {
        interactive(&cli, &mut session, &client, &mut replies).await?;
    } else {
        for question in &cli.questions {
            let reply = answer(&cli, &mut session, &client, question).await?;
            replies.push(reply);
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&replies).context("Failed to serialise answers")?;
        println!("{json}");
    }

    Ok(())
}

/// Prompt on stdin until EOF or `exit`.
async fn interactive(
    cli: &Cli,
    session: &mut Session,
    client: &LlmCompletionClient,
    replies: &mut Vec<Reply>,
) -> Result<()> {
    if !cli.quiet {
        eprintln!("\n{GREETING}\n");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !cli.quiet {
            eprint!("{} ", bold("Ask about your report..."));
            io::stderr().flush().ok();
        }

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = answer(cli, session, client, question).await?;
        replies.push(reply);
    }
    Ok(())
}

async fn answer(
    cli: &Cli,
    session: &mut Session,
    client: &LlmCompletionClient,
    question: &str,
) -> Result<Reply> {
    let bar = (!cli.quiet && !cli.json).then(|| spinner("Generating response..."));
    let reply = session.ask_detailed(client, question).await;
    if let Some(b) = bar {
        b.finish_and_clear();
    }
    let reply = reply.context("Failed to answer question")?;

    if !cli.json {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "\n{}\n", reply.rendered).context("Failed to write to stdout")?;
        if let Some(ref err) = reply.error {
            eprintln!("{} {}", red("✗"), dim(err));
        }
        if !cli.quiet {
            eprintln!("{}\n", dim(DISCLAIMER));
        }
    }
    Ok(reply)
}

/// Map CLI args to `ExtractionConfig`.
fn build_extraction_config(cli: &Cli, observer: Option<ObserverHandle>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .tesseract_cmd(cli.tesseract.clone())
        .ocr_language(cli.ocr_lang.clone())
        .detect_tables(!cli.no_tables);

    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to `CompletionConfig`.
fn build_completion_config(cli: &Cli) -> Result<CompletionConfig> {
    let mut builder = CompletionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .request_timeout_secs(cli.timeout)
        .excerpt_chars(cli.excerpt_chars as usize);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }

    builder.build().context("Invalid configuration")
}
