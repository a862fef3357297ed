//! # Underlays Command Implementation
//!
//! `wsforge underlays` lists the underlays found in the immediate
//! subdirectories of the search roots (`/opt/ros` and the home directory by
//! default). With `--workspace`, the underlay that workspace was last built
//! against is marked, and listed even when it lives outside the roots.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use wsforge::output::Status;
use wsforge::underlay::{find_underlays, infer_default_underlay};
use wsforge::workspace::{CreateMode, Workspace};

use super::Context;

/// List the underlays available on this machine
#[derive(Args, Debug)]
pub struct UnderlaysArgs {
    /// Directory to search instead of the configured roots (repeatable)
    #[arg(long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Mark the underlay this workspace was last built against
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
}

/// Execute the `underlays` command.
pub fn execute(args: UnderlaysArgs, context: &Context) -> Result<()> {
    let roots: Vec<PathBuf> = if args.roots.is_empty() {
        context.settings.underlay_search_roots.clone()
    } else {
        args.roots.iter().map(|root| context.expand_home(root)).collect()
    };

    let last_used = match &args.workspace {
        Some(path) => {
            let workspace = Workspace::open(context.expand_home(path), CreateMode::MustExist)?;
            infer_default_underlay(&workspace, context.logger.as_ref())?
        }
        None => None,
    };

    let found = find_underlays(&roots, &context.shell.name(), context.logger.as_ref())?;
    let mut listed: Vec<PathBuf> = found.iter().map(|underlay| underlay.root.clone()).collect();
    if let Some(last) = &last_used {
        if !listed.contains(last) {
            listed.push(last.clone());
        }
    }

    if listed.is_empty() {
        let searched: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
        println!(
            "{}",
            context.output.line(
                Status::Warning,
                &format!("No underlays found in {}", searched.join(", "))
            )
        );
        return Ok(());
    }

    for underlay in &listed {
        let line = if Some(underlay) == last_used.as_ref() {
            format!("{} (last used underlay)", underlay.display())
        } else {
            underlay.display().to_string()
        };
        println!("{}", context.output.line(Status::Item, &line));
    }
    Ok(())
}
