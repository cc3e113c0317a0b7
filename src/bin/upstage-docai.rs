//! CLI binary for upstage-docai.
//!
//! A thin shim over the library crate: maps flags to `DocAiConfig`, runs one
//! tool call and prints its reply. Replies go to stdout, logs and progress to
//! stderr. `serve` instead speaks MCP on stdin/stdout until stdin closes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use upstage_docai::{
    extract_information_tool, parse_document_tool, DocAiConfig, McpServer, Pipeline,
    PipelineProgressCallback, Stage,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders the run's stage checkpoints as a 0–100 bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage, percent: u8) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_position(u64::from(percent));
    }

    fn on_info(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_warning(&self, message: &str) {
        self.bar.println(format!("  {} {}", yellow("⚠"), message));
    }

    fn on_run_failed(&self, stage: Stage, error: &str) {
        self.bar.abandon();
        eprintln!("{} failed while {}: {}", red("✘"), stage, error);
    }

    fn on_run_complete(&self, file: &Path) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", green("✔"), dim(&file.display().to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Parse layout and content
  upstage-docai parse report.pdf

  # Extract with a generated schema
  upstage-docai extract invoice.pdf

  # Extract with your own schema
  upstage-docai extract invoice.pdf --schema invoice_schema.json

  # Run as an MCP tool server on stdio
  upstage-docai serve

ENVIRONMENT:
  UPSTAGE_API_KEY      API key (required)
  UPSTAGE_API_BASE     API root (default https://api.upstage.ai/v1)
  UPSTAGE_OUTPUT_DIR   Artifact root (default ./outputs)
  RUST_LOG             Overrides the log filter

A .env file in the working directory is loaded when present."#;

#[derive(Parser, Debug)]
#[command(
    name = "upstage-docai",
    version,
    about = "Parse documents and extract structured information with Upstage Document AI",
    after_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Upstage API key.
    #[arg(long, env = "UPSTAGE_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API root URL.
    #[arg(long, env = "UPSTAGE_API_BASE", global = true)]
    api_base: Option<String>,

    /// Root directory for saved artifacts.
    #[arg(long, env = "UPSTAGE_OUTPUT_DIR", global = true)]
    output_dir: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except the reply and errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a document's layout and content.
    Parse {
        /// Document to parse.
        file: String,
    },
    /// Extract structured information from a document.
    Extract {
        /// Document to extract from.
        file: String,

        /// JSON schema file to extract with.
        #[arg(long, short)]
        schema: Option<String>,

        /// Fail instead of generating a schema when none is given.
        #[arg(long)]
        no_auto_schema: bool,
    },
    /// Serve both tools over MCP (JSON-RPC on stdin/stdout).
    Serve,
}

fn build_config(cli: &Cli, show_progress: bool) -> Result<DocAiConfig> {
    let mut builder = DocAiConfig::builder();
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref base) = cli.api_base {
        builder = builder.base_url(base);
    }
    if let Some(ref dir) = cli.output_dir {
        builder = builder.output_root(dir);
    }
    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new());
    }
    builder.build().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    // stdout carries protocol messages in serve mode.
    let serving = matches!(cli.command, Command::Serve);
    let show_progress = !cli.quiet && !cli.no_progress && !serving;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress || serving {
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

    let config = build_config(&cli, show_progress)?;
    let pipeline = Pipeline::new(config)
        .await
        .context("Failed to initialise pipeline")?;

    let reply = match cli.command {
        Command::Serve => {
            McpServer::new(pipeline)
                .serve_stdio()
                .await
                .context("MCP server failed")?;
            return Ok(ExitCode::SUCCESS);
        }
        Command::Parse { ref file } => parse_document_tool(&pipeline, file).await,
        Command::Extract {
            ref file,
            ref schema,
            no_auto_schema,
        } => extract_information_tool(&pipeline, file, schema.as_deref(), !no_auto_schema).await,
    };

    let failed = reply.is_error();
    println!("{}", reply.into_text());
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
