//! Fathom - MCP bridge to an upstream search/indexing service
//!
//! Usage:
//!   fathom mcp                    Start MCP server on stdio
//!   fathom indexes                List index schemas
//!   fathom search <index> <q>     Search one index
//!   fathom stats <index>          Index counters
//!   fathom --help                 Show all commands

use anyhow::Result;
use clap::Parser;

use fathom::cli::output::OutputMode;
use fathom::cli::{Cli, Commands};
use fathom::init::AppContext;
use fathom::mcp::server::run_mcp_server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr (safe for MCP stdio transport)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("fathom=info".parse()?),
        )
        .init();

    let mode = OutputMode::from_json_flag(cli.json);
    let ctx = AppContext::new(cli.config.as_deref())?;

    match &cli.command {
        Commands::Mcp => run_mcp_server(ctx).await?,
        cmd => fathom::cli::execute(cmd, &ctx, mode).await?,
    }

    Ok(())
}
