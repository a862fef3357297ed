//! # CLI Command Implementations
//!
//! Each subcommand lives in its own file with:
//! - an `Args` struct derived with `clap`;
//! - an `execute` function taking the parsed arguments and the shared
//!   [`Context`], calling into the `wsforge` library.
//!
//! [`Context`] is built once per invocation and owns the collaborators the
//! engine needs: settings, logger, command runner, prompter and shell.

pub mod build;
pub mod completions;
pub mod manifests;
pub mod setup;
pub mod underlays;
pub mod update;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use wsforge::config::Settings;
use wsforge::fetcher::VcsFetcher;
use wsforge::logger::{LogFacade, Logger};
use wsforge::output::OutputConfig;
use wsforge::prompter::{DialoguerPrompter, Prompter};
use wsforge::runner::{CommandRunner, ProcessRunner};
use wsforge::shell::{Shell, SystemShell};
use wsforge::suggestions;
use wsforge::workspace::{find_workspaces, CreateMode, Workspace};

/// Collaborators shared by every command.
pub struct Context {
    pub settings: Settings,
    pub output: OutputConfig,
    pub logger: Arc<dyn Logger>,
    pub runner: Arc<dyn CommandRunner>,
    pub prompter: Arc<dyn Prompter>,
    pub shell: Arc<dyn Shell>,
    pub home: PathBuf,
}

impl Context {
    pub fn new(settings: Settings, output: OutputConfig, assume_yes: bool) -> Self {
        let logger = LogFacade::shared();
        Self {
            settings,
            output,
            runner: Arc::new(ProcessRunner::new(logger.clone())),
            logger,
            prompter: Arc::new(DialoguerPrompter::new(assume_yes)),
            shell: Arc::new(SystemShell),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
        }
    }

    /// A `vcs` fetcher configured from the settings, with an optional
    /// retry override.
    pub fn fetcher(&self, retries: Option<u32>) -> VcsFetcher {
        VcsFetcher::new(self.runner.clone(), self.logger.clone())
            .with_program(&self.settings.vcs_program)
            .with_retries(retries.unwrap_or(self.settings.retries))
            .with_timeout(self.settings.fetch_timeout())
    }

    /// Open an existing workspace: the explicit path, or one chosen among
    /// the `*_ws` directories of the home directory.
    pub fn existing_workspace(&self, explicit: Option<&Path>) -> Result<Workspace> {
        let path = match explicit {
            Some(path) => self.expand_home(path),
            None => self.choose_workspace()?,
        };
        if !path.is_dir() {
            return Err(suggestions::workspace_not_found(&path));
        }
        Ok(Workspace::open(path, CreateMode::MustExist)?)
    }

    fn choose_workspace(&self) -> Result<PathBuf> {
        let mut available = find_workspaces(&self.home)?;
        match available.len() {
            0 => Err(suggestions::no_workspace_selected(&self.home)),
            1 => {
                let only = available.remove(0);
                self.logger
                    .info(&format!("Using workspace: {}", only.display()));
                Ok(only)
            }
            _ => {
                let options: Vec<String> = available
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect();
                let index = self
                    .prompter
                    .select("Select a workspace", &options, Some(0))?;
                Ok(available.remove(index))
            }
        }
    }

    /// Replace a leading `~` with the home directory.
    pub fn expand_home(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("~") {
            Ok(rest) => self.home.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}
