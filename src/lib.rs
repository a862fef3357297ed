//! # wsforge
//!
//! Workspace resolution and build orchestration for multi-repository ROS
//! workspaces. The library backs the `wsforge` command-line tool and can be
//! embedded by other tools that need to bootstrap or build workspaces.
//!
//! ## Quick Example
//!
//! ```
//! use std::path::Path;
//! use wsforge::manifest::DependencyManifest;
//! use wsforge::steps::{StepScript, TemplateContext};
//!
//! let manifest = DependencyManifest::parse(
//!     Path::new("cohort.repos"),
//!     r#"
//! repositories:
//!   core:
//!     type: git
//!     url: https://example.com/core.git
//!     version: main
//! "#,
//! )
//! .unwrap();
//! assert_eq!(manifest.repository_names(), vec!["core"]);
//!
//! let context = TemplateContext::standard(
//!     Path::new("/home/u/cohort_ws"),
//!     None,
//!     Path::new("/bin/bash"),
//!     Path::new("/home/u"),
//! );
//! let script = StepScript::default_build("colcon").render(&context).unwrap();
//! assert_eq!(
//!     script.steps[0].message.as_deref(),
//!     Some("Building workspace /home/u/cohort_ws with colcon")
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Command execution (`runner`)**: runs external programs with a working
//!   directory, environment overlay, timeout and retry budget, and sources
//!   activation files into the current process.
//! - **Underlays (`underlay`)**: discovers installed ROS distributions and
//!   prior workspaces, and infers the underlay a workspace was last built
//!   against from its generated setup script.
//! - **Fetching (`fetcher`)**: clones and pulls repositories listed in a
//!   dependency manifest through `vcs`.
//! - **Resolution (`resolver`)**: follows nested dependency manifests until
//!   no new one appears.
//! - **Orchestration (`orchestrator`, `steps`, `prompter`)**: selects the
//!   underlay, sources it and runs the build step script.
//!
//! Every external effect goes through a trait (`CommandRunner`,
//! `RepositoryFetcher`, `Prompter`, `Shell`, `Logger`) so that the engine can
//! be driven by fakes in tests.

pub mod config;
pub mod defaults;
pub mod error;
pub mod fetcher;
pub mod logger;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod prompter;
pub mod resolver;
pub mod runner;
pub mod shell;
pub mod steps;
pub mod suggestions;
pub mod underlay;
pub mod workspace;
