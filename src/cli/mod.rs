//! CLI interface for Fathom.

pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::init::AppContext;
use crate::upstream::types::SearchQuery;
use output::OutputMode;

/// Fathom — bridge an upstream search service into MCP tools
#[derive(Parser)]
#[command(name = "fathom", version, about, long_about = None)]
pub struct Cli {
    /// Override config file path (default: ./fathom.toml, ~/.fathom/config.toml)
    #[arg(long, env = "FATHOM_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start MCP server (stdio transport)
    Mcp,

    /// List index schemas
    Indexes,

    /// Search one index
    Search {
        /// Index name
        index: String,
        /// Query text
        query: String,
        /// Maximum hits to show
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Upstream filter expression
        #[arg(long)]
        filter: Option<String>,
    },

    /// Document and storage counters for one index
    Stats {
        /// Index name
        name: String,
    },
}

/// Execute a non-MCP command against the upstream.
pub async fn execute(command: &Commands, ctx: &AppContext, mode: OutputMode) -> anyhow::Result<()> {
    match command {
        Commands::Mcp => unreachable!("handled in main"),
        Commands::Indexes => {
            let indexes = ctx.api.list_indexes().await?;
            output::print_indexes(&indexes, mode);
        }
        Commands::Search {
            index,
            query,
            limit,
            filter,
        } => {
            let results = ctx
                .api
                .search(
                    index,
                    &SearchQuery {
                        text: query.clone(),
                        filter: filter.clone(),
                        top: Some(*limit),
                    },
                )
                .await?;
            output::print_hits(&results, mode);
        }
        Commands::Stats { name } => {
            let stats = ctx.api.index_stats(name).await?;
            output::print_stats(name, &stats, mode);
        }
    }
    Ok(())
}
