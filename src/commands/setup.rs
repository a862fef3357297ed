//! # Setup Command Implementation
//!
//! `wsforge setup <MANIFEST>` bootstraps a workspace:
//!
//! 1. The manifest is located and validated before anything else happens.
//!    A path that is not a file is looked up by name in the configured
//!    `manifest_dirs`, with `.yaml` or `.repos` appended when needed. If
//!    that fails too, the manifests found there are offered in a menu.
//! 2. The workspace path is taken from `--workspace`, or proposed from the
//!    manifest name (`cohort.yaml` → `~/cohort_ws`) and confirmed through a
//!    prompt.
//! 3. The workspace root and its `src/` directory are created (write access
//!    is checked first).
//! 4. The manifest and every nested dependency manifest are cloned until no
//!    new manifest appears.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use walkdir::WalkDir;

use wsforge::manifest::DependencyManifest;
use wsforge::output::Status;
use wsforge::resolver::DependencyResolver;
use wsforge::suggestions;
use wsforge::workspace::{default_workspace_path, CreateMode, Workspace};

use super::Context;

/// Create a workspace and clone a manifest with all nested dependencies
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Dependency manifest to import (a vcstool `.repos` file)
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Workspace directory; created when missing
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// File-name pattern identifying nested manifests (repeatable)
    #[arg(long = "pattern", value_name = "GLOB")]
    pub patterns: Vec<String>,

    /// Search whole repositories for nested manifests, not just their top level
    #[arg(long)]
    pub recursive: bool,

    /// Additional attempts for each failed clone
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,
}

/// Extensions tried after a manifest name, in order.
const MANIFEST_EXTENSIONS: [&str; 2] = ["yaml", "repos"];

/// Execute the `setup` command.
pub fn execute(args: SetupArgs, context: &Context) -> Result<()> {
    let manifest_path = locate_manifest(&args.manifest, context)?.canonicalize()?;
    let manifest = DependencyManifest::load(&manifest_path)?;
    context.logger.debug(&format!(
        "Manifest {} declares: {}",
        manifest_path.display(),
        manifest.repository_names().join(", ")
    ));

    let workspace_path = match args.workspace {
        Some(path) => context.expand_home(&path),
        None => {
            let proposed = default_workspace_path(&manifest_path, &context.home)
                .to_string_lossy()
                .into_owned();
            let answer = context
                .prompter
                .input("Workspace path", Some(proposed.as_str()), &[])?;
            context.expand_home(answer.trim().as_ref())
        }
    };

    let workspace = Workspace::open(&workspace_path, CreateMode::Create)?;
    context
        .logger
        .info(&format!("Setting up workspace {}", workspace.root().display()));

    let patterns = if args.patterns.is_empty() {
        context.settings.manifest_patterns.clone()
    } else {
        args.patterns
    };
    let resolver = DependencyResolver::new(
        Arc::new(context.fetcher(args.retries)),
        context.logger.clone(),
    )
    .with_patterns(patterns)
    .with_recursive(args.recursive || context.settings.recursive_search);

    let resolution = resolver.resolve(&workspace, &manifest_path)?;

    println!(
        "{}",
        context.output.line(
            Status::Done,
            &format!(
                "Workspace ready at {} ({} manifest(s) in {} pass(es))",
                workspace.root().display(),
                resolution.fetched.len(),
                resolution.passes
            )
        )
    );
    println!(
        "{}",
        context.output.line(
            Status::Hint,
            &format!(
                "Run `wsforge build --workspace {}` to build it",
                workspace.root().display()
            )
        )
    );
    Ok(())
}

/// Resolve the `MANIFEST` argument to an existing file.
fn locate_manifest(argument: &Path, context: &Context) -> Result<PathBuf> {
    let direct = context.expand_home(argument);
    if direct.is_file() {
        return Ok(direct);
    }

    let dirs: Vec<PathBuf> = context
        .settings
        .manifest_dirs
        .iter()
        .map(|dir| context.expand_home(dir))
        .collect();
    if let Some(found) = find_named_manifest(argument, &dirs) {
        context
            .logger
            .debug(&format!("Resolved manifest {} to {}", argument.display(), found.display()));
        return Ok(found);
    }

    let mut available = available_manifests(&dirs);
    if available.is_empty() || context.prompter.assume_defaults() {
        return Err(suggestions::manifest_not_found(&direct));
    }
    context
        .logger
        .warn(&format!("Dependency manifest not found: {}", argument.display()));
    let options: Vec<String> = available
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    let index = context
        .prompter
        .select("Select a manifest", &options, Some(0))?;
    Ok(available.remove(index))
}

/// First of `<dir>/<name>`, `<dir>/<name>.yaml`, `<dir>/<name>.repos` that
/// is a file, trying each directory in order. Absolute names are not looked
/// up.
fn find_named_manifest(name: &Path, dirs: &[PathBuf]) -> Option<PathBuf> {
    if name.is_absolute() || name.as_os_str().is_empty() {
        return None;
    }
    dirs.iter().find_map(|dir| {
        let base = dir.join(name);
        std::iter::once(base.clone())
            .chain(MANIFEST_EXTENSIONS.iter().map(|extension| {
                let mut file_name = OsString::from(base.as_os_str());
                file_name.push(".");
                file_name.push(extension);
                PathBuf::from(file_name)
            }))
            .find(|candidate| candidate.is_file())
    })
}

/// Manifest files directly inside `dirs`, sorted by path.
fn available_manifests(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = dirs
        .iter()
        .flat_map(|dir| {
            WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(|entry| entry.ok())
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| MANIFEST_EXTENSIONS.contains(&extension))
        })
        .collect();
    found.sort();
    found.dedup();
    found
}
