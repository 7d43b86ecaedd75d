//! CLI binary for invoice-extract.
//!
//! A thin shim over the library crate: maps CLI flags to `ExtractionConfig`,
//! reads the PDF, and prints the extracted fields as JSON on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_extract::{
    rasterize, EdgequakeProvider, ExtractionClient, ExtractionConfig, ExtractionResult,
    OpenAiProvider, PageFormat, PageImage, ProviderConfig, VisionProvider,
};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract with OpenAI (default)
  invoice-extract invoice.pdf

  # Another vendor through edgequake-llm
  invoice-extract --provider anthropic --model claude-sonnet-4-20250514 po.pdf

  # Black-and-white pages, keep the rendered PNGs for inspection
  invoice-extract --monochrome --dump-pages ./pages scan.pdf

OUTPUT:
  {"receiver_name": "...", "supplier_name": "...", "invoice_total": 0.0, "invoice_date": "YYYY/MM/DD"}

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY                OpenAI API key (required for --provider openai)
  OPENAI_BASE_URL               OpenAI-compatible API root
  ANTHROPIC_API_KEY             Anthropic API key
  GEMINI_API_KEY                Google Gemini API key
  INVOICE_EXTRACT_TIMEOUT_SECS  HTTP timeout for the model call
  PDFIUM_LIB_PATH               Path to an existing libpdfium

  A .env file in the working directory is read when OPENAI_API_KEY is unset.
"#;

/// Extract buyer, seller, total and date from a PDF invoice or purchase order.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-extract",
    version,
    about = "Extract invoice fields from a PDF using a Vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF invoice or purchase order.
    input: PathBuf,

    /// Model provider: openai, or any edgequake-llm provider (anthropic, gemini, ollama, …).
    #[arg(long, env = "INVOICE_EXTRACT_PROVIDER", default_value = "openai")]
    provider: String,

    /// Vision-capable model ID. Default depends on the provider
    /// (gpt-4o for openai, claude-sonnet-4-20250514 for anthropic, …).
    #[arg(long, env = "INVOICE_EXTRACT_MODEL")]
    model: Option<String>,

    /// Max response tokens.
    #[arg(long, env = "INVOICE_EXTRACT_MAX_TOKENS", default_value_t = invoice_extract::config::DEFAULT_MAX_TOKENS)]
    max_tokens: usize,

    /// Rendering DPI (72–400).
    #[arg(long, env = "INVOICE_EXTRACT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Cap on the longest edge of a rendered page, in pixels.
    #[arg(long, default_value_t = 2000)]
    max_pixels: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "INVOICE_EXTRACT_PASSWORD")]
    password: Option<String>,

    /// Page image encoding.
    #[arg(long, value_enum, default_value = "png")]
    format: FormatArg,

    /// Convert pages to 1-bit black and white before sending.
    #[arg(long)]
    monochrome: bool,

    /// HTTP timeout for the model call, in seconds (openai provider).
    #[arg(long)]
    timeout: Option<u64>,

    /// Write each rendered page as page-NNN.png into this directory.
    #[arg(long, value_name = "DIR")]
    dump_pages: Option<PathBuf>,

    /// Print single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,

    /// Disable the spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except the result and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpeg,
}

impl From<FormatArg> for PageFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Png => PageFormat::Png,
            FormatArg::Jpeg => PageFormat::Jpeg,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if std::env::var_os(invoice_extract::config::API_KEY_VAR).is_none() {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
    }

    let model = resolve_model(&cli)?;
    let config = ExtractionConfig::builder()
        .model(&model)
        .max_tokens(cli.max_tokens)
        .image_format(cli.format.into())
        .monochrome(cli.monochrome)
        .dpi(cli.dpi)
        .max_rendered_pixels(cli.max_pixels);
    let config = match &cli.password {
        Some(pwd) => config.password(pwd),
        None => config,
    }
    .build()?;

    // Credentials are checked before the document is even read.
    let result = if cli.provider.eq_ignore_ascii_case("openai") {
        let mut provider_config = ProviderConfig::from_env()?;
        if let Some(secs) = cli.timeout {
            provider_config = provider_config.timeout_secs(secs);
        }
        let provider = OpenAiProvider::new(&provider_config)?;
        run(ExtractionClient::new(config, provider), &cli).await?
    } else {
        let provider = EdgequakeProvider::from_name(&cli.provider, &model)?;
        run(ExtractionClient::new(config, provider), &cli).await?
    };

    let json = if cli.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{json}");
    Ok(())
}

async fn run<P: VisionProvider>(client: ExtractionClient<P>, cli: &Cli) -> Result<ExtractionResult> {
    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read '{}'", cli.input.display()))?;

    let mut pages = rasterize(&bytes, &client.config().render).await?;
    if client.config().monochrome {
        pages = pages.iter().map(PageImage::to_monochrome).collect();
    }

    if let Some(dir) = &cli.dump_pages {
        let written = write_pages(dir, &pages)?;
        if !cli.quiet {
            eprintln!(
                "{} wrote {} page image(s) to {}",
                green("✔"),
                written.len(),
                dir.display()
            );
        }
    }

    let spinner = (!cli.quiet && !cli.no_progress).then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_message(format!(
            "Asking {} ({}) about {} page(s)…",
            client.provider().name(),
            client.config().model,
            pages.len()
        ));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let outcome = client.extract(&pages).await;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
        if outcome.is_ok() {
            eprintln!("{} {}", green("✔"), dim(&format!("{} page(s) extracted", pages.len())));
        }
    }

    Ok(outcome?)
}

/// `--model` if given, otherwise the provider's default vision model.
fn resolve_model(cli: &Cli) -> Result<String> {
    match &cli.model {
        Some(model) => Ok(model.clone()),
        None => invoice_extract::config::default_model_for(&cli.provider)
            .map(str::to_string)
            .with_context(|| {
                format!(
                    "No default model for provider '{}'; pass --model",
                    cli.provider
                )
            }),
    }
}

/// Save pages as `page-001.png`, `page-002.png`, … under `dir`.
fn write_pages(dir: &Path, pages: &[PageImage]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create '{}'", dir.display()))?;

    pages
        .iter()
        .map(|page| {
            let path = dir.join(format!("page-{:03}.png", page.index() + 1));
            page.image()
                .save_with_format(&path, image::ImageFormat::Png)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            Ok(path)
        })
        .collect()
}
