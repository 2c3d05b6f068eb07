//! # Pagesmith CLI (`pagesmith`)
//!
//! ## Usage
//!
//! ```bash
//! pagesmith --config ./config/pagesmith.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pagesmith init` | Create the SQLite database and run schema migrations |
//! | `pagesmith search "<query>"` | Find or generate the page for a query |
//! | `pagesmith get <id>` | Print a stored page and its search results |
//! | `pagesmith serve` | Start the HTTP server |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `pagesmith=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pagesmith::{config, get, migrate, search, server};

/// Pagesmith: answer search queries with stored or freshly generated topic pages.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pagesmith.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pagesmith",
    about = "Search endpoint that reuses or generates AI-written topic pages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pagesmith.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the pages, search_results,
    /// similar_pages and user_activity tables. Safe to run repeatedly.
    Init,

    /// Start the HTTP server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,

    /// Run one search query.
    ///
    /// Prints the status code and JSON body the HTTP endpoint would return.
    Search {
        /// The search query string.
        query: String,
    },

    /// Print a page by its numeric id.
    Get {
        /// Page id.
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagesmith=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search { query } => {
            search::run_search(&cfg, &query).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
    }

    Ok(())
}
