//! # Build Command Implementation
//!
//! `wsforge build` builds an existing workspace on top of an underlay.
//!
//! - `--underlay <DIR>` uses that underlay; it must contain an activation
//!   file. `--no-underlay` skips sourcing altogether.
//! - Without either flag the underlay the workspace was last built against
//!   is proposed together with every underlay found under the search roots.
//! - `--script <FILE>` replaces the default `colcon build` step with a YAML
//!   step script. `--var KEY=VALUE` adds placeholders for it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use wsforge::error::Error;
use wsforge::orchestrator::{BuildOrchestrator, BuildRequest, UnderlayChoice};
use wsforge::output::Status;
use wsforge::steps::STANDARD_KEYS;
use wsforge::suggestions;
use wsforge::underlay::find_underlays;

use super::Context;

/// Build a workspace on top of an underlay
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Workspace directory; prompted for when omitted
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Underlay to source before building
    #[arg(short, long, value_name = "DIR", conflicts_with = "no_underlay")]
    pub underlay: Option<PathBuf>,

    /// Build without sourcing an underlay
    #[arg(long)]
    pub no_underlay: bool,

    /// YAML step script to run instead of the default build
    #[arg(short, long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Placeholder made available to the step script (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,

    /// Time budget in seconds for each command a step runs
    #[arg(long, value_name = "SECS")]
    pub step_timeout: Option<u64>,
}

/// Execute the `build` command.
pub fn execute(args: BuildArgs, context: &Context) -> Result<()> {
    let workspace = context.existing_workspace(args.workspace.as_deref())?;

    let underlay = if args.no_underlay {
        UnderlayChoice::None
    } else {
        match args.underlay {
            Some(path) => UnderlayChoice::Explicit(context.expand_home(&path)),
            None => UnderlayChoice::Select,
        }
    };
    let step_timeout = args
        .step_timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| context.settings.step_timeout());

    let orchestrator = BuildOrchestrator::new(
        context.runner.clone(),
        context.logger.clone(),
        context.prompter.clone(),
        context.shell.clone(),
    )
    .with_search_roots(context.settings.underlay_search_roots.clone())
    .with_build_tool(&context.settings.build_tool)
    .with_step_timeout(step_timeout)
    .with_home(&context.home);

    let request = BuildRequest {
        underlay,
        script: args.script.map(|path| context.expand_home(&path)),
        variables: args.variables,
        ..BuildRequest::new(workspace)
    };

    let report = match orchestrator.build(&request) {
        Ok(report) => report,
        Err(Error::UnderlayNotFound { path }) => {
            return Err(suggestions::underlay_not_found(&path, &discovered(context)));
        }
        Err(e) => return Err(e.into()),
    };

    let underlay = report
        .underlay
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "no underlay".to_string());
    println!(
        "{}",
        context.output.line(
            Status::Done,
            &format!(
                "Built {} on {} ({} step(s) run, {} skipped)",
                request.workspace.root().display(),
                underlay,
                report.steps_run,
                report.steps_skipped
            )
        )
    );
    Ok(())
}

/// Underlays found under the configured roots, for suggestions.
fn discovered(context: &Context) -> Vec<PathBuf> {
    find_underlays(
        &context.settings.underlay_search_roots,
        &context.shell.name(),
        context.logger.as_ref(),
    )
    .map(|found| found.into_iter().map(|underlay| underlay.root).collect())
    .unwrap_or_default()
}

/// Parse a `KEY=VALUE` pair given to `--var`.
fn parse_variable(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    if STANDARD_KEYS.contains(&key) {
        return Err(format!("'{key}' is a built-in variable and cannot be overridden"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            parse_variable("jobs=4").unwrap(),
            ("jobs".to_string(), "4".to_string())
        );
        assert_eq!(
            parse_variable("args=--symlink-install --merge").unwrap(),
            ("args".to_string(), "--symlink-install --merge".to_string())
        );
        assert_eq!(
            parse_variable("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
    }

    #[test]
    fn test_parse_variable_rejects_malformed() {
        assert!(parse_variable("jobs").unwrap_err().contains("KEY=VALUE"));
        assert!(parse_variable("=4").unwrap_err().contains("missing variable name"));
        assert!(parse_variable("workspace=/tmp/other_ws")
            .unwrap_err()
            .contains("built-in variable"));
    }
}
