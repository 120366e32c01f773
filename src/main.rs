//! # Helpdesk Insight CLI (`hdi`)
//!
//! ## Usage
//!
//! ```bash
//! hdi --config ./config/hdi.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `hdi train <upload>` | Train on an upload and print the cycle summary |
//! | `hdi search <upload> "<query>"` | Rank similar past tickets |
//! | `hdi report <upload>` | Root causes, keywords, heatmap, accuracy |
//! | `hdi sla <upload>` | Tickets most at risk of breaching their SLA |
//! | `hdi suggest <upload> "<description>"` | Suggested solution |
//! | `hdi serve` | Start the HTTP API |
//!
//! Uploads are JSON arrays of row objects keyed by column header. The engine
//! keeps nothing between runs, so each command trains on its upload first.
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `info`).

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use helpdesk_insight::config::{self, Config};
use helpdesk_insight::engine::Engine;
use helpdesk_insight::ingest::parse_timestamp;
use helpdesk_insight::{report, server};

/// Helpdesk Insight CLI: ticket similarity search, root-cause reporting and
/// SLA risk ranking.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/hdi.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "hdi",
    about = "Helpdesk Insight: ticket similarity search, classification and SLA risk",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/hdi.toml`. When the default file does not exist
    /// built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_CONFIG: &str = "./config/hdi.toml";

#[derive(Subcommand)]
enum Commands {
    /// Ingest an upload and run a training cycle.
    Train {
        /// JSON upload file.
        upload: PathBuf,
    },

    /// Rank past tickets by similarity to a query.
    Search {
        upload: PathBuf,

        /// Free-text problem description.
        query: String,

        /// Maximum number of results (default: `[engine].search_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print root causes, keywords, the heatmap and the accuracy report.
    Report { upload: PathBuf },

    /// List open tickets most at risk of breaching their due date.
    Sla {
        upload: PathBuf,

        /// Reference time (RFC 3339 or `YYYY-MM-DD HH:MM`). Defaults to now.
        #[arg(long)]
        now: Option<String>,
    },

    /// Suggest a solution for a new problem.
    Suggest {
        upload: PathBuf,

        description: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Screenshot to send with the request (png, jpg, gif, webp).
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve {
        /// Train on this upload before accepting requests.
        #[arg(long)]
        upload: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::minimal());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = resolve_config(&cli.config)?;
    let engine = Engine::from_config(cfg)?;

    match cli.command {
        Commands::Train { upload } => {
            report::run_train(&engine, &upload).await?;
        }
        Commands::Search {
            upload,
            query,
            limit,
        } => {
            let limit = limit.unwrap_or(engine.config().engine.search_limit);
            report::run_search(&engine, &upload, &query, limit).await?;
        }
        Commands::Report { upload } => {
            report::run_report(&engine, &upload).await?;
        }
        Commands::Sla { upload, now } => {
            let now = match now {
                Some(s) => Some(
                    parse_timestamp(&s)
                        .ok_or_else(|| anyhow::anyhow!("Invalid --now timestamp: {}", s))?,
                ),
                None => None,
            };
            report::run_sla(&engine, &upload, now).await?;
        }
        Commands::Suggest {
            upload,
            description,
            category,
            priority,
            image,
        } => {
            report::run_suggest(
                &engine,
                &upload,
                &description,
                category.as_deref(),
                priority.as_deref(),
                image.as_deref(),
            )
            .await?;
        }
        Commands::Serve { upload } => {
            if let Some(upload) = &upload {
                report::train_from_file(&engine, upload).await?;
            }
            server::run_server(Arc::new(engine)).await?;
        }
    }

    Ok(())
}
