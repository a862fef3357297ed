//! # Settings
//!
//! This module defines [`Settings`], the tunables of `wsforge`, and the
//! layering that produces them. Later layers override earlier ones:
//!
//! 1. **Built-in defaults** from [`crate::defaults`].
//! 2. **Settings file** (YAML): the `--config` path, else `$WSFORGE_CONFIG`,
//!    else `<config dir>/wsforge/config.yaml` when it exists.
//! 3. **Environment**: `WSFORGE_RETRIES`, `WSFORGE_VCS`.
//! 4. **Command-line flags**, applied by the individual commands.
//!
//! Every key of the settings file is optional:
//!
//! ```yaml
//! retries: 3
//! fetch_timeout_secs: 900
//! manifest_patterns: ["dependencies.repos", "*.repos"]
//! recursive_search: true
//! underlay_search_roots: [/opt/ros, /home/me/workspaces]
//! manifest_dirs: [/home/me/cohorts]
//! ```
//!
//! Unknown keys are rejected so that a typo does not silently fall back to
//! a default.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::defaults::{
    default_config_path, default_manifest_patterns, default_underlay_search_roots,
    CONFIG_ENV_VAR, DEFAULT_BUILD_TOOL, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_RETRIES,
    DEFAULT_STEP_TIMEOUT_SECS, DEFAULT_VCS_PROGRAM,
};
use crate::error::{Error, Result};

/// Environment variable overriding [`Settings::retries`].
pub const RETRIES_ENV_VAR: &str = "WSFORGE_RETRIES";
/// Environment variable overriding [`Settings::vcs_program`].
pub const VCS_ENV_VAR: &str = "WSFORGE_VCS";

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Additional attempts for a failed fetch or pull.
    pub retries: u32,
    pub fetch_timeout_secs: u64,
    /// Budget of each command run by a build step.
    pub step_timeout_secs: u64,
    /// File-name globs identifying nested dependency manifests.
    pub manifest_patterns: Vec<String>,
    /// Search whole repository trees for manifests, not only their top level.
    pub recursive_search: bool,
    pub underlay_search_roots: Vec<PathBuf>,
    /// Directories searched for a manifest given to `setup` by name.
    pub manifest_dirs: Vec<PathBuf>,
    pub vcs_program: String,
    pub build_tool: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            manifest_patterns: default_manifest_patterns(),
            recursive_search: false,
            underlay_search_roots: default_underlay_search_roots(),
            manifest_dirs: Vec::new(),
            vcs_program: DEFAULT_VCS_PROGRAM.to_string(),
            build_tool: DEFAULT_BUILD_TOOL.to_string(),
        }
    }
}

impl Settings {
    /// Defaults, overlaid with the settings file and the environment.
    ///
    /// An `explicit` path must exist; the implicit default location is
    /// skipped when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match locate(explicit)? {
            Some(path) => {
                log::debug!("Loading settings from {}", path.display());
                from_file(&path)?
            }
            None => Settings::default(),
        };
        settings.apply_env()?;
        Ok(settings)
    }

    /// Apply `WSFORGE_RETRIES` and `WSFORGE_VCS`.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = env::var(RETRIES_ENV_VAR) {
            self.retries = value.trim().parse().map_err(|_| Error::ConfigParse {
                message: format!("{} must be a non-negative integer, got '{}'", RETRIES_ENV_VAR, value),
                hint: None,
            })?;
        }
        if let Ok(value) = env::var(VCS_ENV_VAR) {
            if !value.trim().is_empty() {
                self.vcs_program = value.trim().to_string();
            }
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    fn validate(self) -> Result<Self> {
        if self.manifest_patterns.is_empty() {
            return Err(Error::ConfigParse {
                message: "manifest_patterns must not be empty".to_string(),
                hint: Some("Remove the key to use the default 'dependencies.repos'".to_string()),
            });
        }
        if let Some(pattern) = self
            .manifest_patterns
            .iter()
            .find(|pattern| glob::Pattern::new(pattern).is_err())
        {
            return Err(Error::ConfigParse {
                message: format!("invalid manifest pattern '{}'", pattern),
                hint: None,
            });
        }
        if self.vcs_program.trim().is_empty() || self.build_tool.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: "vcs_program and build_tool must not be empty".to_string(),
                hint: None,
            });
        }
        Ok(self)
    }
}

/// Find the settings file to read, if any.
fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let chosen = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

    match chosen {
        Some(path) if path.is_file() => Ok(Some(path)),
        Some(path) => Err(Error::ConfigParse {
            message: format!("settings file not found: {}", path.display()),
            hint: Some(format!(
                "Check the --config flag or the {} environment variable",
                CONFIG_ENV_VAR
            )),
        }),
        None => {
            let default = default_config_path();
            Ok(default.is_file().then_some(default))
        }
    }
}

/// Parse settings from YAML; an empty document yields the defaults.
pub fn parse(yaml_content: &str) -> Result<Settings> {
    if yaml_content.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings = serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: Some(
            "Known keys: retries, fetch_timeout_secs, step_timeout_secs, manifest_patterns, \
             recursive_search, underlay_search_roots, manifest_dirs, vcs_program, build_tool"
                .to_string(),
        ),
    })?;
    settings.validate()
}

/// Parse settings from a YAML file path
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let content = fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
