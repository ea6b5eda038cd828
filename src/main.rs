//! esum CLI - chapter-by-chapter EPUB summarisation
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments, wiring the model and handling top-level errors.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use esum::{Config, EpubBook, GeminiTextModel, Pipeline, RetryPolicy, RetryingModel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "esum")]
#[command(author, version, about = "Summarise an EPUB book chapter by chapter", long_about = None)]
struct Cli {
    /// Path to a config file (defaults to esum.toml or ~/.config/esum/esum.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise every chapter of an EPUB file
    Summarise {
        /// Path to epub file
        epub: PathBuf,
        /// Path to output file. If not provided, output will be printed to stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Words limit of each chapter
        #[arg(short, long)]
        limit: Option<u32>,
        /// Number of chapters summarised at the same time
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Show the chapters the model finds, without summarising them
    Chapters {
        /// Path to epub file
        epub: PathBuf,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Summarise {
            epub,
            output,
            limit,
            jobs,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(limit) = limit {
                config.summary.word_limit = limit;
            }
            if let Some(jobs) = jobs {
                config.agent.concurrency = jobs;
            }

            let pipeline = Pipeline::from_config(build_model(&config)?, &config);
            let book = open_book(&epub)?;
            let report = pipeline
                .run(&book)
                .await
                .with_context(|| format!("Failed to summarise {}", epub.display()))?;

            report
                .write_to(output.as_deref(), &mut std::io::stdout().lock())
                .context("Failed to write summary")?;

            if let Some(path) = output {
                eprintln!(
                    "{} {} chapters to {}",
                    "Summarised".green().bold(),
                    report.chapters.len(),
                    path.display()
                );
            }
        }
        Commands::Chapters { epub } => {
            let config = load_config(cli.config.as_deref())?;
            let pipeline = Pipeline::from_config(build_model(&config)?, &config);
            let book = open_book(&epub)?;
            let chapters = pipeline
                .chapters(&book)
                .await
                .with_context(|| format!("Failed to extract chapters of {}", epub.display()))?;

            println!("{}", serde_json::to_string_pretty(&chapters)?);
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "esum", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Log to stderr so stdout only carries the report. `RUST_LOG` overrides the default level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("esum=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load().context("Failed to load config")?,
    };
    Ok(config)
}

fn build_model(config: &Config) -> anyhow::Result<Arc<RetryingModel<GeminiTextModel>>> {
    let model = GeminiTextModel::from_config(config).context("Failed to set up LLM client")?;
    Ok(Arc::new(RetryingModel::new(
        model,
        RetryPolicy::from_config(config),
    )))
}

fn open_book(path: &Path) -> anyhow::Result<EpubBook> {
    EpubBook::open(path)
        .map_err(esum::Error::from)
        .with_context(|| format!("Failed to open {}", path.display()))
}
