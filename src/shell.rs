//! Access to the user's login shell.

use std::env;
use std::path::{Path, PathBuf};

use crate::defaults::DEFAULT_SHELL;

/// Shell abstraction used to pick activation files and script interpreters.
pub trait Shell: Send + Sync {
    /// Absolute path of the user's shell.
    fn user_shell(&self) -> PathBuf;

    /// Base name of the user's shell (`bash`, `zsh`, ...), lowercased.
    fn name(&self) -> String {
        shell_name(&self.user_shell())
    }
}

/// Reads `$SHELL`, falling back to `/bin/bash`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl Shell for SystemShell {
    fn user_shell(&self) -> PathBuf {
        env::var_os("SHELL")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL))
    }
}

/// A shell fixed at construction time.
#[derive(Debug, Clone)]
pub struct FixedShell(pub PathBuf);

impl FixedShell {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }
}

impl Shell for FixedShell {
    fn user_shell(&self) -> PathBuf {
        self.0.clone()
    }
}

/// Lowercased file name of a shell path.
pub fn shell_name(shell: &Path) -> String {
    shell
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Activation file generated for `shell_name` by colcon/catkin.
///
/// Unrecognized shells use `setup.bash`.
pub fn activation_file_name(shell_name: &str) -> &'static str {
    match shell_name {
        "zsh" => "setup.zsh",
        "sh" => "setup.sh",
        _ => "setup.bash",
    }
}

/// Command that sources `file` in the given shell.
///
/// POSIX `sh` and `dash` have no `source` builtin and use `.` instead.
pub fn source_command(shell_name: &str, file: &Path) -> String {
    let quoted = quote(&file.to_string_lossy());
    match shell_name {
        "sh" | "dash" => format!(". {} && env", quoted),
        _ => format!("source {} && env", quoted),
    }
}

/// Single-quote `value` for a POSIX shell.
pub fn quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:,@%=".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r#"'\''"#))
}
