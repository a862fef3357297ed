//! # Error Handling
//!
//! This module defines the centralized error type for `wsforge`. It uses the
//! `thiserror` library to build a single `Error` enum covering every failure
//! the engine can surface, each variant carrying enough context (paths,
//! commands, exit codes, captured stderr) to produce a useful message.
//!
//! Two groups of errors matter to callers:
//!
//! - **Precondition errors** (`InvalidManifest`, `WorkspacePermission`,
//!   `Workspace`, `UnderlayNotFound`, `StepScript`, `ConfigParse`) are
//!   detected before any external process is spawned and abort immediately.
//! - **Process errors** (`CommandFailed`, `CommandTimedOut`) are produced by
//!   the command runner only after its retry budget is exhausted.
//!
//! Expected, non-fatal outcomes such as "no underlay could be inferred" are
//! modelled as `Option` by the callers and never appear here.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|h| format!("\n  hint: {}", h))
        .unwrap_or_default()
}

/// Main error type for wsforge operations
#[derive(Error, Debug)]
pub enum Error {
    /// A dependency manifest is malformed: unreadable YAML, no
    /// `repositories` mapping, or an entry missing `type`/`url`/`version`.
    #[error("Invalid manifest {}: {message}{}", path.display(), hint_suffix(hint))]
    InvalidManifest {
        path: PathBuf,
        message: String,
        /// Optional hint for how to fix the manifest
        hint: Option<String>,
    },

    /// The workspace path is not writable or could not be created.
    #[error("Workspace permission error for {}: {message}", path.display())]
    WorkspacePermission { path: PathBuf, message: String },

    /// The workspace layout is invalid (missing root, `src` is a file, ...).
    #[error("Invalid workspace {}: {message}", path.display())]
    Workspace { path: PathBuf, message: String },

    /// An external command exited non-zero on every allowed attempt.
    #[error("Command `{command}` failed with exit code {exit_code} after {attempts} attempt(s){}", stderr_suffix(stderr))]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
        attempts: u32,
    },

    /// An external command exceeded its time budget on the final attempt.
    #[error("Command `{command}` timed out after {timeout:?} ({attempts} attempt(s))")]
    CommandTimedOut {
        command: String,
        timeout: Duration,
        attempts: u32,
    },

    /// An external command could not be started at all.
    #[error("Failed to start `{command}`: {message}")]
    CommandSpawn { command: String, message: String },

    /// A user-supplied underlay has no recognized activation file.
    #[error("No activation file found in underlay {}", path.display())]
    UnderlayNotFound { path: PathBuf },

    /// A build step script could not be loaded.
    #[error("Step script error in {}: {message}", path.display())]
    StepScript { path: PathBuf, message: String },

    /// The wsforge settings file is malformed.
    #[error("Configuration parsing error: {message}{}", hint_suffix(hint))]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An interactive prompt could not be displayed or read.
    #[error("Prompt error: {message}")]
    Prompt { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A directory traversal error, wrapped from `walkdir::Error`.
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl Error {
    /// Returns true for errors produced by an external process after its
    /// retry budget ran out.
    pub fn is_command_error(&self) -> bool {
        matches!(
            self,
            Error::CommandFailed { .. } | Error::CommandTimedOut { .. } | Error::CommandSpawn { .. }
        )
    }

    /// Number of attempts recorded by a command error, if any.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Error::CommandFailed { attempts, .. } | Error::CommandTimedOut { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
