//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use wsforge::config::Settings;
use wsforge::output::OutputConfig;
use wsforge::suggestions;

use crate::commands;

/// wsforge - Bootstrap, update and build multi-repository ROS workspaces
#[derive(Parser, Debug)]
#[command(name = "wsforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Answer every prompt with its default (unattended mode)
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Settings file to load instead of the default location
    #[arg(long, global = true, value_name = "FILE", env = "WSFORGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a workspace and clone a manifest with all nested dependencies
    Setup(commands::setup::SetupArgs),

    /// Pull every repository of an existing workspace
    Update(commands::update::UpdateArgs),

    /// Build a workspace on top of an underlay
    Build(commands::build::BuildArgs),

    /// List the underlays available on this machine
    Underlays(commands::underlays::UnderlaysArgs),

    /// List the dependency manifests found in a workspace
    Manifests(commands::manifests::ManifestsArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        if let Commands::Completions(args) = self.command {
            return commands::completions::execute(args);
        }

        let settings =
            Settings::load(self.config.as_deref()).map_err(|e| suggestions::settings_invalid(&e))?;
        let context = commands::Context::new(
            settings,
            OutputConfig::from_env_and_flag(&self.color),
            self.yes,
        );

        match self.command {
            Commands::Setup(args) => commands::setup::execute(args, &context),
            Commands::Update(args) => commands::update::execute(args, &context),
            Commands::Build(args) => commands::build::execute(args, &context),
            Commands::Underlays(args) => commands::underlays::execute(args, &context),
            Commands::Manifests(args) => commands::manifests::execute(args, &context),
            Commands::Completions(_) => Ok(()),
        }
    }
}

/// Install the `env_logger` backend. `RUST_LOG` takes precedence over
/// `--log-level`.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second initialisation (tests) keeps the first logger.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "wsforge",
            "build",
            "--workspace",
            "/tmp/demo_ws",
            "--yes",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert!(cli.yes);
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Build(_)));
    }

    #[test]
    fn test_setup_requires_manifest() {
        assert!(Cli::try_parse_from(["wsforge", "setup"]).is_err());
    }
}
