//! # Update Command Implementation
//!
//! `wsforge update` pulls every repository checked out under the `src/`
//! directory of an existing workspace. The workspace is given with
//! `--workspace` or chosen among the `*_ws` directories of the home
//! directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use wsforge::fetcher::RepositoryFetcher;
use wsforge::output::Status;

use super::Context;

/// Pull every repository of an existing workspace
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Workspace directory; prompted for when omitted
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Additional attempts when the pull fails
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,
}

/// Execute the `update` command.
pub fn execute(args: UpdateArgs, context: &Context) -> Result<()> {
    let workspace = context.existing_workspace(args.workspace.as_deref())?;
    context
        .logger
        .info(&format!("Updating workspace {}", workspace.root().display()));

    context.fetcher(args.retries).pull(&workspace)?;

    println!(
        "{}",
        context.output.line(
            Status::Done,
            &format!("Workspace {} is up to date", workspace.root().display())
        )
    );
    Ok(())
}
