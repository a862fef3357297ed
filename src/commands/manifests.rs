//! # Manifests Command Implementation
//!
//! `wsforge manifests` lists the dependency manifests present under the
//! `src/` directory of a workspace, i.e. the manifests the next `setup`
//! pass would consider. Paths are printed relative to the workspace root.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use wsforge::output::Status;
use wsforge::resolver::discover_manifests;

use super::Context;

/// List the dependency manifests found in a workspace
#[derive(Args, Debug)]
pub struct ManifestsArgs {
    /// Workspace directory; prompted for when omitted
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// File-name pattern identifying manifests (repeatable)
    #[arg(long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Search whole repositories, not just their top level
    #[arg(long)]
    pub recursive: bool,
}

/// Execute the `manifests` command.
pub fn execute(args: ManifestsArgs, context: &Context) -> Result<()> {
    let workspace = context.existing_workspace(args.workspace.as_deref())?;
    let patterns = if args.patterns.is_empty() {
        context.settings.manifest_patterns.clone()
    } else {
        args.patterns
    };
    let recursive = args.recursive || context.settings.recursive_search;

    let manifests = discover_manifests(&workspace.src_dir(), &patterns, recursive)?;
    if manifests.is_empty() {
        println!(
            "{}",
            context.output.line(
                Status::Warning,
                &format!(
                    "No manifests matching {} in {}",
                    patterns.join(", "),
                    workspace.src_dir().display()
                )
            )
        );
        return Ok(());
    }

    for manifest in &manifests {
        let shown = manifest.strip_prefix(workspace.root()).unwrap_or(manifest);
        println!("{}", context.output.line(Status::Item, &shown.display().to_string()));
    }
    Ok(())
}
