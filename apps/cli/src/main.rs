//! contentmcp CLI: aggregate content documents and stream them to listeners.
//!
//! Serves the tool and event-stream endpoints over HTTP, or runs a single
//! scrape / document aggregation from the command line.

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
