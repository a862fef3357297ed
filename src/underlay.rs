//! # Underlay Discovery and Inference
//!
//! An underlay is a previously built or installed set of packages a new
//! build stacks on: a system install such as `/opt/ros/humble`, or another
//! workspace's build output. It is recognized by its activation file
//! (`setup.bash`, `setup.zsh`, `setup.sh`), found either directly in the
//! directory or inside its `install/` (colcon) or `devel/` (catkin) tree.
//!
//! Two questions are answered here:
//!
//! 1. **Which underlays are available?** [`find_underlays`] looks one level
//!    deep under each search root.
//! 2. **Which underlay was this workspace last built against?**
//!    [`infer_default_underlay`] reads the `COLCON_CURRENT_PREFIX="..."`
//!    lines colcon writes into `install/setup.bash`. They form the prefix
//!    chain of the last build; the final entry is the workspace's own
//!    install prefix and the one before it is the underlay.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::shell::activation_file_name;
use crate::workspace::Workspace;

/// Variables a correctly sourced ROS 2 environment defines.
pub const ROS_ENVIRONMENT_VARIABLES: [&str; 5] = [
    "ROS_DISTRO",
    "ROS_VERSION",
    "AMENT_PREFIX_PATH",
    "CMAKE_PREFIX_PATH",
    "COLCON_PREFIX_PATH",
];

/// Build output directories that may hold an activation file.
const OUTPUT_DIRS: [&str; 2] = ["install", "devel"];

/// A prefix-chain line in a colcon activation script.
const PREFIX_PATTERN: &str = r#"^COLCON_CURRENT_PREFIX="(.+)"$"#;

/// A directory that can be sourced before a build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Underlay {
    /// Install or workspace root (never its `install/`/`devel/` child).
    pub root: PathBuf,
    /// Activation file matching the user's shell.
    pub activation_file: PathBuf,
}

/// Prefix paths recorded by the last build, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPrefixChain(pub Vec<String>);

impl BuildPrefixChain {
    /// Collect every `COLCON_CURRENT_PREFIX="<path>"` line of an activation
    /// script. Surrounding whitespace on a line is ignored.
    pub fn parse(script: &str) -> Result<Self> {
        let regex = Regex::new(PREFIX_PATTERN).map_err(Error::Regex)?;
        let prefixes = script
            .lines()
            .filter_map(|line| regex.captures(line.trim()))
            .map(|captures| captures[1].to_string())
            .collect();
        Ok(Self(prefixes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The underlay the chain was built against: the second-to-last prefix,
    /// with a trailing `/install` or `/devel` removed.
    pub fn underlay(&self) -> Option<PathBuf> {
        if self.0.len() < 2 {
            return None;
        }
        let prefix = &self.0[self.0.len() - 2];
        Some(strip_output_dir(prefix))
    }
}

/// Drop a trailing `/install` or `/devel` component.
fn strip_output_dir(prefix: &str) -> PathBuf {
    let path = Path::new(prefix);
    let is_output_dir = path
        .file_name()
        .map(|name| OUTPUT_DIRS.iter().any(|dir| name == *dir))
        .unwrap_or(false);
    match path.parent() {
        Some(parent) if is_output_dir && prefix.contains('/') => parent.to_path_buf(),
        _ => path.to_path_buf(),
    }
}

/// Locate the activation file of `dir` for `shell_name`.
///
/// Checked in order: `dir/<file>`, `dir/install/<file>`, `dir/devel/<file>`.
pub fn activation_file(dir: &Path, shell_name: &str) -> Option<PathBuf> {
    let file_name = activation_file_name(shell_name);
    std::iter::once(dir.to_path_buf())
        .chain(OUTPUT_DIRS.iter().map(|output| dir.join(output)))
        .map(|candidate| candidate.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// Scan the immediate subdirectories of each root for underlays.
///
/// Missing roots are skipped. Duplicates across roots are merged; the
/// result is sorted by path.
pub fn find_underlays(
    roots: &[PathBuf],
    shell_name: &str,
    logger: &dyn Logger,
) -> Result<Vec<Underlay>> {
    let mut found = BTreeSet::new();

    for root in roots {
        if !root.is_dir() {
            logger.debug(&format!(
                "Underlay search root does not exist: {}",
                root.display()
            ));
            continue;
        }
        logger.debug(&format!("Searching for underlays in {}", root.display()));

        for entry in fs::read_dir(root)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(activation_file) = activation_file(&path, shell_name) {
                logger.debug(&format!("Found underlay: {}", path.display()));
                found.insert(Underlay {
                    root: path,
                    activation_file,
                });
            }
        }
    }

    logger.debug(&format!("Total underlays found: {}", found.len()));
    Ok(found.into_iter().collect())
}

/// Infer the underlay `workspace` was last built against.
///
/// Returns `None` when the workspace has never been built or its prefix
/// chain has fewer than two entries. Only I/O errors on an existing
/// activation file are reported as errors.
pub fn infer_default_underlay(
    workspace: &Workspace,
    logger: &dyn Logger,
) -> Result<Option<PathBuf>> {
    let setup = workspace.activation_file();
    if !setup.is_file() {
        logger.debug(&format!(
            "No build metadata at {}; workspace has not been built yet",
            setup.display()
        ));
        return Ok(None);
    }

    let chain = BuildPrefixChain::parse(&fs::read_to_string(&setup)?)?;
    match chain.underlay() {
        Some(underlay) => {
            logger.debug(&format!(
                "Inferred default underlay {} from {} prefix(es)",
                underlay.display(),
                chain.len()
            ));
            Ok(Some(underlay))
        }
        None => {
            logger.debug(&format!(
                "Not enough COLCON_CURRENT_PREFIX entries in {} ({})",
                setup.display(),
                chain.len()
            ));
            Ok(None)
        }
    }
}

/// Check a user-supplied underlay path.
pub fn validate_custom_underlay(path: &Path, shell_name: &str) -> Result<Underlay> {
    if !path.is_dir() {
        return Err(Error::UnderlayNotFound {
            path: path.to_path_buf(),
        });
    }
    activation_file(path, shell_name)
        .map(|activation_file| Underlay {
            root: path.to_path_buf(),
            activation_file,
        })
        .ok_or_else(|| Error::UnderlayNotFound {
            path: path.to_path_buf(),
        })
}

/// ROS variables absent from the current process environment.
pub fn missing_ros_variables() -> Vec<&'static str> {
    ROS_ENVIRONMENT_VARIABLES
        .iter()
        .copied()
        .filter(|var| env::var_os(var).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLogger;
    use crate::workspace::CreateMode;
    use proptest::prelude::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "# activation\n").unwrap();
    }

    fn built_workspace(script: &str) -> (TempDir, Workspace) {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::open(temp.path(), CreateMode::Create).unwrap();
        fs::create_dir_all(workspace.install_dir()).unwrap();
        fs::write(workspace.activation_file(), script).unwrap();
        (temp, workspace)
    }

    #[test]
    fn test_chain_humble_then_workspace() {
        let script = r#"
# generated from colcon_core/shell/template/prefix_chain.bash.em
COLCON_CURRENT_PREFIX="/opt/ros/humble"
_colcon_prefix_chain_bash_source_script "$COLCON_CURRENT_PREFIX/local_setup.bash"
COLCON_CURRENT_PREFIX="/home/u/ws/install"
_colcon_prefix_chain_bash_source_script "$COLCON_CURRENT_PREFIX/local_setup.bash"
"#;
        let chain = BuildPrefixChain::parse(script).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.underlay(), Some(PathBuf::from("/opt/ros/humble")));
    }

    #[test]
    fn test_chain_strips_install_and_devel() {
        let chain = BuildPrefixChain(vec![
            "/opt/ros/humble".to_string(),
            "/home/u/base_ws/install".to_string(),
            "/home/u/app_ws/install".to_string(),
        ]);
        assert_eq!(chain.underlay(), Some(PathBuf::from("/home/u/base_ws")));

        let chain = BuildPrefixChain(vec![
            "/home/u/catkin_ws/devel".to_string(),
            "/home/u/app_ws/install".to_string(),
        ]);
        assert_eq!(chain.underlay(), Some(PathBuf::from("/home/u/catkin_ws")));
    }

    #[test]
    fn test_chain_keeps_similar_suffixes() {
        let chain = BuildPrefixChain(vec![
            "/opt/custom_install".to_string(),
            "/home/u/ws/install".to_string(),
        ]);
        assert_eq!(chain.underlay(), Some(PathBuf::from("/opt/custom_install")));
    }

    #[test]
    fn test_chain_ignores_non_matching_lines() {
        let chain = BuildPrefixChain::parse(
            "export COLCON_CURRENT_PREFIX=\"/x\"\nCOLCON_CURRENT_PREFIX=/unquoted\n  COLCON_CURRENT_PREFIX=\"/indented\"  \n",
        )
        .unwrap();
        assert_eq!(chain.0, vec!["/indented".to_string()]);
    }

    #[test]
    fn test_infer_default_underlay_from_workspace() {
        let (_temp, workspace) = built_workspace(
            "COLCON_CURRENT_PREFIX=\"/opt/ros/humble\"\nCOLCON_CURRENT_PREFIX=\"/home/u/ws/install\"\n",
        );
        let logger = MemoryLogger::new();
        assert_eq!(
            infer_default_underlay(&workspace, &logger).unwrap(),
            Some(PathBuf::from("/opt/ros/humble"))
        );
    }

    #[test]
    fn test_infer_default_underlay_single_prefix() {
        let (_temp, workspace) = built_workspace("COLCON_CURRENT_PREFIX=\"/home/u/ws/install\"\n");
        let logger = MemoryLogger::new();
        assert_eq!(infer_default_underlay(&workspace, &logger).unwrap(), None);
        assert!(logger.contains("Not enough COLCON_CURRENT_PREFIX"));
    }

    #[test]
    fn test_infer_default_underlay_never_built() {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::open(temp.path(), CreateMode::Create).unwrap();
        let logger = MemoryLogger::new();
        assert_eq!(infer_default_underlay(&workspace, &logger).unwrap(), None);
    }

    #[test]
    fn test_activation_file_lookup_order() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        touch(&dir.join("devel/setup.bash"));
        assert_eq!(
            activation_file(dir, "bash"),
            Some(dir.join("devel/setup.bash"))
        );

        touch(&dir.join("install/setup.bash"));
        assert_eq!(
            activation_file(dir, "bash"),
            Some(dir.join("install/setup.bash"))
        );

        touch(&dir.join("setup.bash"));
        assert_eq!(activation_file(dir, "bash"), Some(dir.join("setup.bash")));

        assert_eq!(activation_file(dir, "zsh"), None);
    }

    #[test]
    fn test_find_underlays_one_level_deep() {
        let temp = TempDir::new().unwrap();
        let opt = temp.path().join("opt_ros");
        let home = temp.path().join("home");
        touch(&opt.join("humble/setup.bash"));
        touch(&opt.join("jazzy/setup.zsh"));
        touch(&home.join("base_ws/install/setup.bash"));
        touch(&home.join("old_ws/devel/setup.bash"));
        touch(&home.join("deep/nested/ws/install/setup.bash"));
        fs::write(home.join("setup.bash"), "").unwrap();

        let logger = MemoryLogger::new();
        let roots = vec![
            opt.clone(),
            home.clone(),
            opt.clone(),
            temp.path().join("missing"),
        ];
        let underlays = find_underlays(&roots, "bash", &logger).unwrap();
        let found: Vec<PathBuf> = underlays.iter().map(|u| u.root.clone()).collect();

        assert_eq!(
            found,
            vec![
                home.join("base_ws"),
                home.join("old_ws"),
                opt.join("humble"),
            ]
        );
        assert_eq!(
            underlays[0].activation_file,
            home.join("base_ws/install/setup.bash")
        );
    }

    #[test]
    fn test_find_underlays_for_zsh() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("humble/setup.bash"));
        touch(&temp.path().join("jazzy/setup.zsh"));

        let logger = MemoryLogger::new();
        let underlays = find_underlays(&[temp.path().to_path_buf()], "zsh", &logger).unwrap();
        assert_eq!(underlays.len(), 1);
        assert_eq!(underlays[0].root, temp.path().join("jazzy"));
    }

    #[test]
    fn test_validate_custom_underlay() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good_ws");
        touch(&good.join("install/setup.bash"));
        let bad = temp.path().join("bad_ws");
        fs::create_dir_all(&bad).unwrap();

        assert_eq!(validate_custom_underlay(&good, "bash").unwrap().root, good);
        assert!(matches!(
            validate_custom_underlay(&bad, "bash"),
            Err(Error::UnderlayNotFound { .. })
        ));
        assert!(matches!(
            validate_custom_underlay(&temp.path().join("absent"), "bash"),
            Err(Error::UnderlayNotFound { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_missing_ros_variables() {
        let saved: Vec<_> = ROS_ENVIRONMENT_VARIABLES
            .iter()
            .map(|var| (*var, env::var_os(var)))
            .collect();
        for var in ROS_ENVIRONMENT_VARIABLES {
            env::remove_var(var);
        }
        env::set_var("ROS_DISTRO", "humble");

        let missing = missing_ros_variables();
        assert_eq!(missing.len(), 4);
        assert!(!missing.contains(&"ROS_DISTRO"));

        for (var, value) in saved {
            match value {
                Some(value) => env::set_var(var, value),
                None => env::remove_var(var),
            }
        }
    }

    proptest! {
        #[test]
        fn prop_short_chains_have_no_underlay(
            prefixes in prop::collection::vec("/[a-z]{1,8}(/[a-z]{1,8}){0,3}", 0..2)
        ) {
            let script: String = prefixes
                .iter()
                .map(|p| format!("COLCON_CURRENT_PREFIX=\"{}\"\n", p))
                .collect();
            prop_assert_eq!(BuildPrefixChain::parse(&script).unwrap().underlay(), None);
        }

        #[test]
        fn prop_second_to_last_prefix_is_underlay(
            prefixes in prop::collection::vec("/[a-z]{1,8}(/[a-z]{1,8}){0,3}", 2..6),
            suffix in prop::sample::select(vec!["", "/install", "/devel"]),
        ) {
            let mut prefixes = prefixes;
            let n = prefixes.len();
            let expected = prefixes[n - 2].clone();
            prefixes[n - 2] = format!("{}{}", expected, suffix);

            let script: String = prefixes
                .iter()
                .map(|p| format!("COLCON_CURRENT_PREFIX=\"{}\"\necho noise\n", p))
                .collect();
            let chain = BuildPrefixChain::parse(&script).unwrap();
            prop_assert_eq!(chain.len(), n);

            let underlay = chain.underlay().unwrap();
            if suffix.is_empty() && (expected.ends_with("/install") || expected.ends_with("/devel")) {
                prop_assert_eq!(underlay, Path::new(&expected).parent().unwrap().to_path_buf());
            } else {
                prop_assert_eq!(underlay, PathBuf::from(expected));
            }
        }
    }
}
