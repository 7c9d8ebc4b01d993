//! MedHarvest CLI — drug-label acquisition and LLM enrichment tool.
//!
//! Builds a deduplicated drug-label dataset from a paginated source and
//! enriches it with structured fields from a generative model.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
