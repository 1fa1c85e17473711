//! procbook CLI: assemble a proceedings book from contribution directories.
//!
//! Renders every `contrib-*` directory to a standalone PDF with pandoc and
//! merges the results into one book where each contribution starts on an
//! odd page.

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
