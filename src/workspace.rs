//! # Workspace Layout
//!
//! A workspace is a directory holding a `src/` tree of cloned repositories
//! and the `install/` tree the build tool produces. [`Workspace`] validates
//! that layout before anything touches it:
//!
//! - the root must be writable (or creatable, when allowed);
//! - `src/` must be a directory, never a regular file.
//!
//! Both checks happen before any external process is spawned, so a bad path
//! fails with `WorkspacePermission`/`Workspace` instead of a confusing `vcs`
//! error.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::shell::activation_file_name;

/// Whether validation may create missing directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// Create the root and `src/` when missing (setup).
    Create,
    /// Require both to exist already (update, build).
    MustExist,
}

/// A validated workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Validate `root` and its `src/` directory.
    ///
    /// A relative `root` is made absolute against the current directory.
    pub fn open(root: impl Into<PathBuf>, mode: CreateMode) -> Result<Self> {
        let root = std::path::absolute(root.into())?;
        validate_root(&root, mode)?;
        let workspace = Self { root };
        workspace.validate_src(mode)?;
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn install_dir(&self) -> PathBuf {
        self.root.join("install")
    }

    /// The colcon-generated bash activation file.
    ///
    /// Build metadata is always read from the bash variant because its
    /// prefix chain is what `COLCON_CURRENT_PREFIX` lines are parsed from.
    pub fn activation_file(&self) -> PathBuf {
        self.install_dir().join("setup.bash")
    }

    fn validate_src(&self, mode: CreateMode) -> Result<PathBuf> {
        let src = self.src_dir();
        if src.is_dir() {
            return Ok(src);
        }
        if src.exists() {
            return Err(Error::Workspace {
                path: self.root.clone(),
                message: format!("'{}' exists but is not a directory", src.display()),
            });
        }
        match mode {
            CreateMode::Create => {
                fs::create_dir_all(&src).map_err(|e| Error::WorkspacePermission {
                    path: self.root.clone(),
                    message: format!("cannot create '{}': {}", src.display(), e),
                })?;
                Ok(src)
            }
            CreateMode::MustExist => Err(Error::Workspace {
                path: self.root.clone(),
                message: format!("'{}' does not exist", src.display()),
            }),
        }
    }
}

fn validate_root(root: &Path, mode: CreateMode) -> Result<()> {
    if root.exists() {
        if !root.is_dir() {
            return Err(Error::Workspace {
                path: root.to_path_buf(),
                message: "workspace path is not a directory".to_string(),
            });
        }
        return check_writable(root);
    }
    match mode {
        CreateMode::Create => fs::create_dir_all(root).map_err(|e| Error::WorkspacePermission {
            path: root.to_path_buf(),
            message: format!("cannot create workspace directory: {}", e),
        }),
        CreateMode::MustExist => Err(Error::Workspace {
            path: root.to_path_buf(),
            message: "workspace path does not exist".to_string(),
        }),
    }
}

/// Check write access by creating (and dropping) a temporary file.
fn check_writable(dir: &Path) -> Result<()> {
    tempfile::tempfile_in(dir)
        .map(|_| ())
        .map_err(|e| Error::WorkspacePermission {
            path: dir.to_path_buf(),
            message: format!("no write permission: {}", e),
        })
}

/// Suggest a workspace path for a manifest: `~/cohort.yaml` → `~/cohort_ws`.
pub fn default_workspace_path(manifest: &Path, home: &Path) -> PathBuf {
    let stem = manifest
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "wsforge".to_string());
    home.join(format!("{}_ws", stem))
}

/// Find existing workspaces (`*_ws` directories) directly under `home`.
///
/// A directory qualifies if it has a `src/` directory or an activation file
/// in `install/` or `devel/`. Results are sorted.
pub fn find_workspaces(home: &Path) -> Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::escape(&home.to_string_lossy()) + "/*_ws";
    let mut found = Vec::new();

    for entry in glob::glob(&pattern)?.flatten() {
        if entry.is_dir() && looks_like_workspace(&entry) {
            found.push(entry);
        }
    }
    found.sort();
    Ok(found)
}

fn looks_like_workspace(dir: &Path) -> bool {
    if dir.join("src").is_dir() {
        return true;
    }
    ["install", "devel"].iter().any(|output| {
        ["bash", "zsh", "sh"]
            .iter()
            .any(|shell| dir.join(output).join(activation_file_name(shell)).is_file())
    })
}
