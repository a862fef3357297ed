//! # wsforge CLI
//!
//! Binary entry point: parses the command line with `clap` and hands the
//! parsed command to [`cli::Cli::execute`]. All engine logic lives in the
//! `wsforge` library crate.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
