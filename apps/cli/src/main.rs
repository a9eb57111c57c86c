//! buildpipe CLI — build orchestrator for TypeScript/JavaScript packages.
//!
//! Type-checks, compiles, processes stylesheets and copies static assets from
//! a source tree into an output tree using the project's installed tools.

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
