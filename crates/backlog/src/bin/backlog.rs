//! Backlog service binary.
//!
//! `serve` runs the HTTP service; `generate` runs the pipeline once from the
//! command line and optionally writes an export next to it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use backlog::domain::encoding::normalize_bytes;
use backlog::domain::export;
use backlog::domain::extract::{extract_text, ExtractionInput};
use backlog::server::{self, AppState};
use backlog::{BacklogGenerator, Config, ExportFormat, GenerationRequest};

/// Backlog - agile backlog generation from project specifications.
#[derive(Parser)]
#[command(name = "backlog")]
#[command(about = "Generate agile backlogs from project specifications", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service.
    Serve {
        /// Bind host (or set `BACKLOG_HOST`).
        #[arg(long, env = "BACKLOG_HOST")]
        host: Option<String>,

        /// Bind port (or set `BACKLOG_PORT`).
        #[arg(long, env = "BACKLOG_PORT")]
        port: Option<u16>,
    },

    /// Generate a backlog once and print it.
    Generate {
        /// Specification file (PDF or text).
        #[arg(long)]
        cdc: PathBuf,

        /// Technologies (comma-separated or repeated).
        #[arg(long, value_delimiter = ',', required = true)]
        tech: Vec<String>,

        /// Developer skill level (Débutant, Intermédiaire, Expert).
        #[arg(long, default_value = "Intermédiaire")]
        level: String,

        /// Also export the result (pdf or excel).
        #[arg(long)]
        export: Option<String>,

        /// Export destination; defaults to the timestamped name in the current directory.
        #[arg(long, requires = "export")]
        output: Option<PathBuf>,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("backlog=info"))
        .context("Invalid log filter")?;

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config).await
        }
        Commands::Generate {
            cdc,
            tech,
            level,
            export,
            output,
        } => generate(&config, &cdc, tech, &level, export.as_deref(), output).await,
    }
}

async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config).context("Failed to build application state")?;
    for (position, slot) in state.generator.gateway().chain().iter().enumerate() {
        info!(
            position,
            provider = slot.provider_name(),
            model = slot.model(),
            "Provider configured"
        );
    }
    info!(cache_capacity = config.cache_capacity, "Starting backlog service");
    server::run_server(state, &config.bind_address())
        .await
        .context("HTTP server failed")
}

async fn generate(
    config: &Config,
    cdc: &Path,
    tech: Vec<String>,
    level: &str,
    export_format: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    // Validate the format before spending any provider calls.
    let format = export_format
        .map(str::parse::<ExportFormat>)
        .transpose()?;

    let bytes = tokio::fs::read(cdc)
        .await
        .with_context(|| format!("Failed to read {}", cdc.display()))?;
    let is_pdf = cdc
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    let input = if is_pdf {
        ExtractionInput::from_document(bytes)
    } else {
        ExtractionInput::from_text(normalize_bytes(&bytes))
    };
    let specification = extract_text(&input)?;

    let request = GenerationRequest::new(specification, tech, level)?;
    let generator = BacklogGenerator::from_config(config)?;
    let outcome = generator.generate(&request).await?;

    println!("{}\n\n{}", outcome.analysis, outcome.backlog_text);

    let summary = outcome.summary();
    info!(
        seed = %outcome.seed,
        degraded = outcome.degraded,
        epics = summary.epics,
        features = summary.features,
        stories = summary.stories,
        rejected_lines = summary.rejected_lines,
        "Generation finished"
    );

    if let Some(format) = format {
        if outcome.degraded {
            bail!("Generation degraded, nothing to export");
        }
        let analysis = outcome.analysis.clone();
        let backlog_text = outcome.backlog_text.clone();
        let document =
            tokio::task::spawn_blocking(move || export::render(format, &analysis, &backlog_text))
                .await
                .context("Export task panicked")??;
        let path = output.unwrap_or_else(|| PathBuf::from(&document.filename));
        tokio::fs::write(&path, &document.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), format = %format, "Export written");
    }

    Ok(())
}
