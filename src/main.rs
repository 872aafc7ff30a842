//! # Local RAG CLI (`lrag`)
//!
//! ## Usage
//!
//! ```bash
//! lrag [--config ./config/rag.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lrag health` | Check vector store and LLM reachability |
//! | `lrag version` | Print the version |
//! | `lrag ingest <dir>...` | Index text and images under the directories |
//! | `lrag query "<question>"` | Answer one question with sources |
//! | `lrag chat` | Interactive question loop |
//! | `lrag stats` | Collection dimensions and entry counts |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use local_rag::config::{self, Config};
use local_rag::progress::ProgressMode;
use local_rag::{answer, health, ingest, stats};

/// Local RAG CLI: question answering over your own documents and images,
/// with local embeddings and a locally hosted language model.
#[derive(Parser)]
#[command(
    name = "lrag",
    about = "Local multimodal retrieval-augmented generation over your own files",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rag.toml`; a missing default file is fine and
    /// built-in defaults plus environment variables are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the vector store and the language model are reachable.
    ///
    /// Exits with status 1 if either is unavailable.
    Health,

    /// Print the version.
    Version,

    /// Ingest documents and images from one or more directories.
    ///
    /// Re-ingesting an unchanged file replaces its entries instead of
    /// duplicating them.
    Ingest {
        /// Directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Progress on stderr: `human`, `json`, or `off`.
        /// Defaults to human when stderr is a terminal.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Ask one question.
    Query {
        /// The question.
        question: String,

        /// Results per collection (overrides `retrieval.top_k`).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        top_k: Option<u64>,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat; each turn is answered independently.
    Chat,

    /// Show collections, dimensions and entry counts.
    Stats,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // No config needed
    if let Commands::Version = cli.command {
        println!("lrag (local-rag) version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    dotenvy::dotenv().ok();
    let (path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(config::DEFAULT_CONFIG_PATH), false),
    };
    let cfg = config::load_config(&path, explicit)?;
    init_tracing(&cfg);

    match cli.command {
        Commands::Version => {}
        Commands::Health => {
            if !health::run_health(&cfg).await? {
                std::process::exit(1);
            }
        }
        Commands::Ingest { paths, progress } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_ingest(&cfg, &paths, mode).await?;
        }
        Commands::Query {
            question,
            top_k,
            json,
        } => {
            answer::run_query(&cfg, &question, top_k.map(|k| k as usize), json).await?;
        }
        Commands::Chat => {
            answer::run_chat(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
