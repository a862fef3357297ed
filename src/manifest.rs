//! # Dependency Manifests
//!
//! A dependency manifest is the YAML file consumed by `vcs import`:
//!
//! ```yaml
//! repositories:
//!   demo_nodes:
//!     type: git
//!     url: https://github.com/ros2/demos.git
//!     version: humble
//! ```
//!
//! `wsforge` never interprets the repositories itself (the file path is
//! handed to `vcs` unchanged) but it validates the shape first, so that a
//! malformed manifest is rejected before any clone is attempted.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::{Error, Result};

/// Set of manifest files discovered in one scan of a workspace.
pub type ManifestSet = BTreeSet<PathBuf>;

/// One entry of the `repositories` mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySpec {
    /// VCS type (`git`, `hg`, ...).
    pub r#type: String,
    pub url: String,
    /// Branch, tag or commit.
    pub version: String,
}

/// A validated dependency manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyManifest {
    pub path: PathBuf,
    /// Repositories keyed by their checkout directory relative to `src/`.
    pub repositories: BTreeMap<String, RepositorySpec>,
}

impl DependencyManifest {
    /// Read and validate the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::InvalidManifest {
            path: path.to_path_buf(),
            message: format!("cannot read file: {}", e),
            hint: None,
        })?;
        Self::parse(path, &content)
    }

    /// Validate manifest `content`; `path` is only used for error messages.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let invalid = |message: String, hint: Option<&str>| Error::InvalidManifest {
            path: path.to_path_buf(),
            message,
            hint: hint.map(str::to_string),
        };

        let document: Value = serde_yaml::from_str(content)
            .map_err(|e| invalid(format!("malformed YAML: {}", e), None))?;

        let root = document.as_mapping().ok_or_else(|| {
            invalid(
                "expected a mapping at the top level".to_string(),
                Some("A manifest starts with a 'repositories:' key"),
            )
        })?;

        let repositories = root
            .get("repositories")
            .ok_or_else(|| {
                invalid(
                    "no 'repositories' specified".to_string(),
                    Some("A manifest starts with a 'repositories:' key"),
                )
            })?
            .as_mapping()
            .ok_or_else(|| {
                invalid(
                    "'repositories' should be a mapping of repository configurations".to_string(),
                    None,
                )
            })?;

        let mut parsed = BTreeMap::new();
        for (name, entry) in repositories {
            let name = scalar_to_string(name)
                .ok_or_else(|| invalid("repository names must be strings".to_string(), None))?;

            let fields = entry.as_mapping().ok_or_else(|| {
                invalid(
                    format!("repository '{}' should be a mapping", name),
                    Some("Each repository needs 'type', 'url' and 'version' fields"),
                )
            })?;

            let field = |field: &str| {
                fields.get(field).and_then(scalar_to_string).ok_or_else(|| {
                    invalid(
                        format!("repository '{}' has no '{}' field", name, field),
                        Some("Each repository needs 'type', 'url' and 'version' fields"),
                    )
                })
            };
            let spec = RepositorySpec {
                r#type: field("type")?,
                url: field("url")?,
                version: field("version")?,
            };
            parsed.insert(name, spec);
        }

        Ok(Self {
            path: path.to_path_buf(),
            repositories: parsed,
        })
    }

    /// Names of the declared repositories, sorted.
    pub fn repository_names(&self) -> Vec<&str> {
        self.repositories.keys().map(String::as_str).collect()
    }
}

/// Render a YAML scalar as the string `vcs` would see.
///
/// `version: 2` is a number to YAML but a ref name to `vcs`.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
