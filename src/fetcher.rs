//! # Repository Fetching
//!
//! This module wraps the external VCS-sync tool (`vcs`, from vcstool) that
//! clones and updates the repositories of a workspace.
//!
//! ## Design
//!
//! Repository access sits behind the [`RepositoryFetcher`] trait, so the
//! dependency resolver can be exercised against a fake that "clones" by
//! writing files, without a network or a `vcs` install. The production
//! implementation, [`VcsFetcher`], builds the `vcs` command line and hands
//! it to a [`CommandRunner`], which provides streaming, timeout and retry.
//!
//! Both operations are fail-fast: once the runner's retry budget is
//! exhausted the error is returned and nothing further is attempted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::defaults::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_RETRIES, DEFAULT_VCS_PROGRAM};
use crate::error::Result;
use crate::logger::Logger;
use crate::manifest::DependencyManifest;
use crate::runner::{CommandRunner, CommandSpec};
use crate::workspace::Workspace;

/// Trait for repository sync operations - allows faking in tests
pub trait RepositoryFetcher: Send + Sync {
    /// Import every repository listed in `manifest` into the workspace's
    /// `src/` directory.
    ///
    /// Repositories already present at the requested version are left
    /// untouched.
    fn fetch(&self, workspace: &Workspace, manifest: &Path) -> Result<()>;

    /// Update every repository already present under `src/`.
    fn pull(&self, workspace: &Workspace) -> Result<()>;
}

/// Fetcher backed by the `vcs` command.
pub struct VcsFetcher {
    runner: Arc<dyn CommandRunner>,
    logger: Arc<dyn Logger>,
    program: String,
    retries: u32,
    timeout: Duration,
}

impl VcsFetcher {
    /// Creates a fetcher with the default program, retry budget and timeout.
    pub fn new(runner: Arc<dyn CommandRunner>, logger: Arc<dyn Logger>) -> Self {
        Self {
            runner,
            logger,
            program: DEFAULT_VCS_PROGRAM.to_string(),
            retries: DEFAULT_RETRIES,
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, workspace: &Workspace) -> CommandSpec {
        CommandSpec::new(&self.program)
            .cwd(workspace.root())
            .timeout(self.timeout)
            .retries(self.retries)
    }
}

impl RepositoryFetcher for VcsFetcher {
    fn fetch(&self, workspace: &Workspace, manifest: &Path) -> Result<()> {
        // Rejects a malformed manifest before anything is cloned.
        let parsed = DependencyManifest::load(manifest)?;
        self.logger.info(&format!(
            "Importing {} repositor{} from {}",
            parsed.repositories.len(),
            if parsed.repositories.len() == 1 { "y" } else { "ies" },
            manifest.display()
        ));

        let spec = self
            .command(workspace)
            .arg("import")
            .arg("--input")
            .arg(manifest.to_string_lossy())
            .arg("src");
        self.runner.run(&spec)?;
        Ok(())
    }

    fn pull(&self, workspace: &Workspace) -> Result<()> {
        self.logger.info(&format!(
            "Pulling repositories in {}",
            workspace.src_dir().display()
        ));
        let spec = self.command(workspace).arg("pull").arg("src");
        self.runner.run(&spec)?;
        Ok(())
    }
}
