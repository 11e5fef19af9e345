//! Starbrief CLI: daily multi-source horoscope digests.
//!
//! Fetches each sign's daily text from several sources, summarizes every
//! fetch and writes one consolidated JSON artifact per sign.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
