#![recursion_limit = "256"]

mod cli;
mod application;
mod domain;
mod data;
mod ml;
mod infra;

use anyhow::Result;
use cli::Cli;
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Dropping the guard flushes the file sink, so it lives until main returns.
    let _log_guard = infra::logging::init_logging(&cli.logs_dir)?;

    cli.run()
}
