//! # Rulebook QA CLI (`rbqa`)
//!
//! Starts the web app, plus a few operator commands for the shared vector
//! index.
//!
//! ## Usage
//!
//! ```bash
//! rbqa --config ./config/rbqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rbqa serve` | Start the web app (default when no command is given) |
//! | `rbqa games` | List indexed games and their vector counts |
//! | `rbqa delete-game <ID>` | Delete every vector of the game with catalog ID `<ID>` |
//!
//! The Pinecone API key is read from the environment variable named by
//! `vector_store.api_key_env` (default `PINECONE_API_KEY`). Users supply
//! their own OpenAI key in the page.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rulebook_qa::catalog::BggCatalog;
use rulebook_qa::config;
use rulebook_qa::games::{delete_game, game_from_namespace, game_stats};
use rulebook_qa::index::create_index;
use rulebook_qa::server;

/// Rulebook QA: ask questions about board-game rules.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rbqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rbqa",
    about = "Rulebook QA: upload board-game rulebooks and ask questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rbqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web app.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,

    /// List indexed games and their vector counts.
    Games,

    /// Delete every vector of a game.
    ///
    /// The catalog ID is resolved to the game's title, which names its
    /// namespace. Uploading the rulebook again rebuilds it.
    DeleteGame {
        /// BoardGameGeek ID of the game.
        catalog_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Games => {
            let index = create_index(&cfg.vector_store)?;
            let prefix = &cfg.vector_store.namespace_prefix;
            let stats = game_stats(index.as_ref(), prefix).await?;
            if stats.is_empty() {
                println!("No games indexed under '{}'.", prefix);
            }
            for ns in stats {
                let game = game_from_namespace(prefix, &ns.name).unwrap_or(&ns.name);
                println!("{:<40} {:>8} vectors", game, ns.vector_count);
            }
        }
        Commands::DeleteGame { catalog_id } => {
            let catalog = BggCatalog::new(&cfg.catalog)?;
            let index = create_index(&cfg.vector_store)?;
            let title = delete_game(
                &catalog,
                index.as_ref(),
                &cfg.vector_store.namespace_prefix,
                &catalog_id,
            )
            .await?;
            println!("Deleted all vectors of '{}'.", title);
        }
    }

    Ok(())
}
