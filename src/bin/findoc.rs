//! CLI binary for findoc-analyzer.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalyzerConfig` and either serves the HTTP API or runs a single
//! document from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use findoc_analyzer::analyze::extract_document;
use findoc_analyzer::pipeline::input::PDF_CONTENT_TYPE;
use findoc_analyzer::{
    serve, Analyzer, AnalyzerConfig, PdfiumExtractor, Persona, TextExtractor, Upload,
};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP API on 127.0.0.1:8000
  findoc serve

  # Analyse one document and print the JSON response
  findoc analyze annual-report.pdf --query "What are the main risks?"

  # Inspect extracted text and keyword signals (no API key needed)
  findoc extract annual-report.pdf

  # Another provider and model
  findoc --provider openai --model gpt-4.1-mini serve

HTTP API:
  GET  /          health check
  POST /analyze   multipart form: file=<pdf>, query=<text, optional>

  curl -F file=@report.pdf -F query="Is this a buy?" http://127.0.0.1:8000/analyze

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (required for the default provider)
  EDGEQUAKE_LLM_PROVIDER  Provider when --provider is not given (with EDGEQUAKE_MODEL)
  EDGEQUAKE_MODEL         Model when --provider is not given (with EDGEQUAKE_LLM_PROVIDER)
  PDFIUM_DYNAMIC_LIB_PATH Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides -v / -q

  A .env file in the working directory is loaded at startup.
"#;

/// Analyse financial PDF documents with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "findoc",
    version,
    about = "Analyse financial PDF documents with an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory where uploads are staged during a request.
    #[arg(long, global = true, env = "FINDOC_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Directory receiving analysis_<id>.json and debug_<id>.json.
    #[arg(long, global = true, env = "FINDOC_OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Largest accepted upload in MiB.
    #[arg(long, global = true, env = "FINDOC_MAX_UPLOAD_MB", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..=1024))]
    max_upload_mb: u64,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, global = true, env = "FINDOC_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.0-flash).
    #[arg(long, global = true, env = "FINDOC_MODEL")]
    model: Option<String>,

    /// LLM temperature, 0.0 to 2.0.
    #[arg(long, global = true, env = "FINDOC_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, global = true, env = "FINDOC_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Extra attempts after a failed LLM call.
    #[arg(long, global = true, env = "FINDOC_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// LLM call timeout in seconds.
    #[arg(long, global = true, env = "FINDOC_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Document characters sent to the model at most.
    #[arg(long, global = true, env = "FINDOC_MAX_DOCUMENT_CHARS", default_value_t = 120_000)]
    max_document_chars: usize,

    /// Analyst persona: analyst, verifier, advisor, risk.
    #[arg(long, global = true, env = "FINDOC_PERSONA", default_value = "analyst")]
    persona: Persona,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, global = true, env = "FINDOC_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Do not add keyword-scan signals to the prompt.
    #[arg(long, global = true, env = "FINDOC_NO_SIGNALS")]
    no_signals: bool,

    /// Path to the pdfium shared library (file or directory).
    #[arg(long, global = true, env = "FINDOC_PDFIUM_LIB")]
    pdfium_lib: Option<PathBuf>,

    /// Also write logs (without colours) to this file.
    #[arg(long, global = true, env = "FINDOC_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FINDOC_VERBOSE")]
    verbose: bool,

    /// Suppress all logs except errors.
    #[arg(short, long, global = true, env = "FINDOC_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Address to bind.
        #[arg(long, env = "FINDOC_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },
    /// Analyse one PDF and print the JSON response.
    Analyze {
        /// Local PDF file.
        pdf: PathBuf,

        /// Question to answer. Defaults to a general investment analysis.
        #[arg(short = 'Q', long)]
        query: Option<String>,
    },
    /// Extract text and keyword signals from one PDF (no LLM call).
    Extract {
        /// Local PDF file.
        pdf: PathBuf,

        /// Print only the extracted text instead of the JSON report.
        #[arg(long)]
        text: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Keep the guard alive so the file writer flushes on exit.
    let _log_guard = init_tracing(&cli)?;

    match cli.command {
        Command::Serve { bind } => {
            let config = build_config(&cli, Some(bind)).await?;
            let analyzer = Analyzer::from_config(config).context("Failed to initialise analyzer")?;
            info!("{:?}", analyzer);
            serve(Arc::new(analyzer), shutdown_signal())
                .await
                .context("Server failed")?;
        }
        Command::Analyze { ref pdf, ref query } => {
            let config = build_config(&cli, None).await?;
            let analyzer = Analyzer::from_config(config).context("Failed to initialise analyzer")?;
            let mut upload = read_upload(pdf).await?;
            if let Some(q) = query {
                upload = upload.with_query(q.clone());
            }
            let response = analyzer.analyze(upload).await.context("Analysis failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&response).context("Failed to serialise response")?
            );
        }
        Command::Extract { ref pdf, text } => {
            let config = build_config(&cli, None).await?;
            let extractor: Arc<dyn TextExtractor> =
                Arc::new(PdfiumExtractor::new(config.pdfium_lib_path.clone()));
            let bytes = tokio::fs::read(pdf)
                .await
                .with_context(|| format!("Failed to read {}", pdf.display()))?;
            let report = extract_document(&config, extractor, &bytes)
                .await
                .context("Extraction failed")?;
            if text {
                println!("{}", report.document.full_text);
            } else {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            }
        }
    }

    Ok(())
}

/// stderr layer plus an optional non-ANSI file layer.
fn init_tracing(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let (file_layer, guard) = match cli.log_file {
        Some(ref path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("--log-file must name a file: {}", path.display()))?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Map CLI args to `AnalyzerConfig`.
async fn build_config(cli: &Cli, bind: Option<SocketAddr>) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder()
        .data_dir(&cli.data_dir)
        .output_dir(&cli.output_dir)
        .max_upload_bytes((cli.max_upload_mb as usize) * 1024 * 1024)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .max_document_chars(cli.max_document_chars)
        .persona(cli.persona)
        .include_signals(!cli.no_signals);

    if let Some(addr) = bind {
        builder = builder.bind_addr(addr);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

/// Read a local file as an upload, typed by its extension.
async fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    let content_type = if is_pdf {
        PDF_CONTENT_TYPE
    } else {
        "application/octet-stream"
    };
    Ok(Upload::new(filename, bytes).with_content_type(content_type))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
