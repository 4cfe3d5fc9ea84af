//! # docchat CLI
//!
//! The `docchat` binary serves the HTTP API and offers one-shot document
//! commands for scripting and smoke testing.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Start the HTTP API |
//! | `docchat summarize <file.pdf>` | Print the document summary |
//! | `docchat ask <file.pdf> "<question>"` | Bind the document and ask one question |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docchat::config::load_config;
use docchat::corpus::Document;
use docchat::extract::extract_pdf_text;
use docchat::registry::SessionRegistry;
use docchat::server::{run_server, AppState};

/// docchat — conversational question answering over uploaded documents.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "Ask questions about a document, answered from its own text",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Summarize a PDF and print the summary.
    Summarize {
        /// Path to the PDF file.
        file: PathBuf,
    },

    /// Bind a PDF and ask a single question about it.
    Ask {
        /// Path to the PDF file.
        file: PathBuf,

        /// The question to ask.
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let engine = docchat::build_engine(&config)?;
            let state = AppState {
                engine: Arc::new(engine),
                registry: Arc::new(SessionRegistry::new()),
            };
            run_server(&config, state).await?;
        }

        Commands::Summarize { file } => {
            let engine = docchat::build_engine(&config)?;
            let text = read_pdf(&file)?;
            let summary = engine.summarizer.summarize(&text).await?;
            println!("{}", summary);
        }

        Commands::Ask { file, question } => {
            let engine = docchat::build_engine(&config)?;
            let text = read_pdf(&file)?;
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document.pdf".to_string());

            let mut session = engine.new_session();
            session.bind(&engine, Document::new(filename, text)).await?;
            let replies = session.ask(&engine, &question).await?;
            for reply in replies {
                println!("{}", reply.content);
            }
        }
    }

    Ok(())
}

fn read_pdf(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    extract_pdf_text(&bytes).with_context(|| format!("Failed to extract {}", path.display()))
}
