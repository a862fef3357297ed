//! # Dependency Resolution
//!
//! Repositories may ship their own dependency manifests (by default a
//! `dependencies.repos` file at the top of the repository). Cloning such a
//! repository introduces new repositories to clone, which may in turn ship
//! manifests of their own. [`DependencyResolver`] follows these chains to a
//! fixpoint:
//!
//! 1. Fetch the root manifest (pass 1).
//! 2. Scan every top-level entry of `src/` for manifest files.
//! 3. Fetch every manifest not fetched before (one more pass).
//! 4. Rescan, and repeat until a scan finds nothing new.
//!
//! ## Working-set policy
//!
//! The set of discovered manifests is append-only. A manifest seen once is
//! never retracted, even if a later clone replaces the directory holding it,
//! and a manifest is fetched at most once per resolution. Each pass either
//! grows the set or ends the loop, so resolution terminates on any finite
//! tree.
//!
//! A failed fetch aborts resolution. Repositories cloned so far remain on
//! disk.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use walkdir::WalkDir;

use crate::defaults::default_manifest_patterns;
use crate::error::Result;
use crate::fetcher::RepositoryFetcher;
use crate::logger::Logger;
use crate::manifest::ManifestSet;
use crate::workspace::Workspace;

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Fetch passes performed; the root manifest is pass 1.
    pub passes: usize,
    /// Every nested manifest discovered under `src/`.
    pub manifests: ManifestSet,
    /// Manifests fetched, in fetch order (root first).
    pub fetched: Vec<PathBuf>,
}

/// Drives fetch/scan passes until no new manifest appears.
pub struct DependencyResolver {
    fetcher: Arc<dyn RepositoryFetcher>,
    logger: Arc<dyn Logger>,
    patterns: Vec<String>,
    recursive: bool,
}

impl DependencyResolver {
    pub fn new(fetcher: Arc<dyn RepositoryFetcher>, logger: Arc<dyn Logger>) -> Self {
        Self {
            fetcher,
            logger,
            patterns: default_manifest_patterns(),
            recursive: false,
        }
    }

    /// File-name glob patterns identifying manifests.
    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Search the whole tree of each repository, not just its top level.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Fetch `root_manifest` and every manifest reachable from it.
    pub fn resolve(&self, workspace: &Workspace, root_manifest: &Path) -> Result<Resolution> {
        let patterns = compile_patterns(&self.patterns)?;

        self.logger.info(&format!(
            "Resolving dependencies of {}",
            root_manifest.display()
        ));
        self.fetcher.fetch(workspace, root_manifest)?;
        let mut fetched = vec![root_manifest.to_path_buf()];
        let mut passes = 1;

        let mut known = ManifestSet::new();
        loop {
            let scanned = scan(&workspace.src_dir(), &patterns, self.recursive)?;
            let new: Vec<PathBuf> = scanned.difference(&known).cloned().collect();
            if new.is_empty() {
                self.logger.debug(&format!(
                    "Manifest set stable after {} pass(es): {} manifest(s)",
                    passes,
                    known.len()
                ));
                break;
            }

            passes += 1;
            self.logger.info(&format!(
                "Pass {}: found {} new manifest(s)",
                passes,
                new.len()
            ));
            for manifest in new {
                self.logger.info(&format!("Fetching {}", manifest.display()));
                self.fetcher.fetch(workspace, &manifest)?;
                known.insert(manifest.clone());
                fetched.push(manifest);
            }
        }

        Ok(Resolution {
            passes,
            manifests: known,
            fetched,
        })
    }
}

/// Find manifests under each top-level entry of `src`.
///
/// Without `recursive`, only files directly inside each entry are checked;
/// with it, each entry's whole tree is walked, skipping `.git`
/// directories. A missing `src` yields an empty set.
pub fn discover_manifests(src: &Path, patterns: &[String], recursive: bool) -> Result<ManifestSet> {
    scan(src, &compile_patterns(patterns)?, recursive)
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|pattern| Pattern::new(pattern).map_err(Into::into))
        .collect()
}

fn scan(src: &Path, patterns: &[Pattern], recursive: bool) -> Result<ManifestSet> {
    let mut found = ManifestSet::new();
    if !src.is_dir() {
        return Ok(found);
    }

    let mut entries: BTreeSet<PathBuf> = BTreeSet::new();
    for entry in fs::read_dir(src)? {
        let path = entry?.path();
        if path.is_dir() {
            entries.insert(path);
        }
    }

    for entry in entries {
        if recursive {
            let walker = WalkDir::new(&entry)
                .min_depth(1)
                .into_iter()
                .filter_entry(|e| e.file_name() != ".git");
            for file in walker {
                let file = file?;
                if file.file_type().is_file() && matches_any(file.path(), patterns) {
                    found.insert(file.into_path());
                }
            }
        } else {
            for file in fs::read_dir(&entry)? {
                let path = file?.path();
                if path.is_file() && matches_any(&path, patterns) {
                    found.insert(path);
                }
            }
        }
    }

    Ok(found)
}

fn matches_any(path: &Path, patterns: &[Pattern]) -> bool {
    path.file_name()
        .map(|name| {
            let name = name.to_string_lossy();
            patterns.iter().any(|pattern| pattern.matches(&name))
        })
        .unwrap_or(false)
}
