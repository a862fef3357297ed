//! Default values for wsforge configuration.
//!
//! This module provides centralized default values used across the engine
//! and the CLI commands, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// File name of the dependency manifest searched for inside cloned packages.
pub const DEFAULT_MANIFEST_PATTERN: &str = "dependencies.repos";

/// Additional attempts made after a failed external command.
pub const DEFAULT_RETRIES: u32 = 2;

/// Time budget of a single `vcs import`/`vcs pull` attempt.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30 * 60;

/// Time budget of a single build step attempt.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Name of the VCS-sync tool.
pub const DEFAULT_VCS_PROGRAM: &str = "vcs";

/// Name of the build tool invoked by the built-in step script.
pub const DEFAULT_BUILD_TOOL: &str = "colcon";

/// Shell used when `$SHELL` is unset.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Environment variable pointing at an alternative settings file.
pub const CONFIG_ENV_VAR: &str = "WSFORGE_CONFIG";

/// Returns the default list of manifest file-name patterns.
pub fn default_manifest_patterns() -> Vec<String> {
    vec![DEFAULT_MANIFEST_PATTERN.to_string()]
}

/// Returns the directories scanned for underlays.
///
/// System installs live under `/opt/ros`; user workspaces are looked for in
/// the home directory.
pub fn default_underlay_search_roots() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from("/opt/ros")];
    if let Some(home) = dirs::home_dir() {
        roots.push(home);
    }
    roots
}

/// Returns the default settings file location.
///
/// - Linux: `~/.config/wsforge/config.yaml` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/wsforge/config.yaml`
///
/// Falls back to `.wsforge.yaml` in the current directory if the platform
/// config directory cannot be determined.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("wsforge").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from(".wsforge.yaml"))
}
