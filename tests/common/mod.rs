//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_workspace("demo_ws");
//!     fixture.command().arg("manifests").assert().success();
//! }
//! ```
//!
//! Every command built by a fixture runs with `HOME` and the config
//! directory pointing into the fixture, `/bin/sh` as the user shell and no
//! inherited `WSFORGE_*` overrides.

use assert_fs::prelude::*;
use std::env;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::manifests;
    #[allow(unused_imports)]
    pub use super::should_skip_network_tests;
    pub use super::TestFixture;
}

/// Dependency manifest snippets.
#[allow(dead_code)]
pub mod manifests {
    /// One repository.
    pub const SINGLE: &str = r#"
repositories:
  pkg1:
    type: git
    url: https://example.com/pkg1.git
    version: main
"#;

    /// A second-level manifest.
    pub const NESTED: &str = r#"
repositories:
  pkg2:
    type: git
    url: https://example.com/pkg2.git
    version: humble
"#;

    /// Entry without a url.
    pub const MISSING_URL: &str = r#"
repositories:
  pkg1:
    type: git
    version: main
"#;

    /// No `repositories` key at all.
    pub const NO_REPOSITORIES: &str = "packages: []\n";
}

/// Fake `vcs` used by E2E tests.
///
/// Every invocation is appended to `vcs.log` next to the script. `import
/// --input <manifest> <dir>` copies the contents of `<manifest>.tree/`, if
/// present, into `<dir>`.
#[allow(dead_code)]
pub const FAKE_VCS: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/vcs.log"
case "$1" in
  import)
    if [ -d "$3.tree" ]; then
      cp -R "$3.tree/." "$4/"
    fi
    ;;
  fail)
    exit 3
    ;;
esac
exit 0
"#;

/// Check if network tests should be skipped.
///
/// Returns `true` if the `SKIP_NETWORK_TESTS` environment variable is set.
#[allow(dead_code)]
pub fn should_skip_network_tests() -> bool {
    env::var("SKIP_NETWORK_TESTS").is_ok()
}

/// A temporary directory acting as the home directory of a test user.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add an empty workspace (`<name>/src`).
    pub fn with_workspace(self, name: &str) -> Self {
        self.temp_dir
            .child(name)
            .child("src")
            .create_dir_all()
            .expect("Failed to create workspace");
        self
    }

    /// Add an underlay whose `setup.sh` runs `body`.
    pub fn with_underlay(self, path: &str, body: &str) -> Self {
        self.with_file(&format!("{}/setup.sh", path), body)
    }

    /// Record that `workspace` was last built against `underlay`.
    pub fn with_last_build(self, workspace: &str, underlay: &Path) -> Self {
        let install = self.path().join(workspace).join("install");
        let content = format!(
            "COLCON_CURRENT_PREFIX=\"{}/install\"\nCOLCON_CURRENT_PREFIX=\"{}\"\n",
            underlay.display(),
            install.display()
        );
        self.with_file(&format!("{}/install/setup.bash", workspace), &content)
    }

    /// Install the fake `vcs` program at `bin/vcs`.
    #[cfg(unix)]
    pub fn with_fake_vcs(self) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let fixture = self.with_file("bin/vcs", FAKE_VCS);
        let path = fixture.vcs_path();
        let mut permissions = std::fs::metadata(&path)
            .expect("Failed to stat fake vcs")
            .permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).expect("Failed to chmod fake vcs");
        fixture
    }

    /// Write a settings file at `wsforge.yaml`.
    pub fn with_settings(self, content: &str) -> Self {
        self.with_file("wsforge.yaml", content)
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn settings_path(&self) -> PathBuf {
        self.path().join("wsforge.yaml")
    }

    pub fn vcs_path(&self) -> PathBuf {
        self.path().join("bin").join("vcs")
    }

    /// Lines the fake `vcs` logged so far.
    pub fn vcs_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("bin").join("vcs.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command isolated in this fixture.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("wsforge");
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join(".config"))
            .env("SHELL", "/bin/sh")
            .env("NO_COLOR", "1")
            .env_remove("WSFORGE_CONFIG")
            .env_remove("WSFORGE_RETRIES")
            .env_remove("WSFORGE_VCS")
            .env_remove("RUST_LOG");
        if self.vcs_path().is_file() {
            cmd.env("WSFORGE_VCS", self.vcs_path());
        }
        cmd
    }

    /// Create a command loading the fixture's settings file.
    pub fn command_with_settings(&self) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.arg("--config").arg(self.settings_path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_workspace() {
        let fixture = TestFixture::new().with_workspace("demo_ws");
        assert!(fixture.path().join("demo_ws/src").is_dir());
    }

    #[test]
    fn test_manifest_snippets_are_valid_yaml() {
        for manifest in [
            manifests::SINGLE,
            manifests::NESTED,
            manifests::MISSING_URL,
            manifests::NO_REPOSITORIES,
        ] {
            serde_yaml::from_str::<serde_yaml::Value>(manifest).expect("Manifest should be valid YAML");
        }
    }
}
