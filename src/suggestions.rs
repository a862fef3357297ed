//! # Error Suggestions
//!
//! Errors reported by the command line should say what went wrong and how
//! to fix it. The helpers here build `anyhow` errors with `hint:` lines for
//! the mistakes users make most often.

use std::path::{Path, PathBuf};

use crate::defaults::CONFIG_ENV_VAR;

/// The dependency manifest given to `setup` does not exist.
pub fn manifest_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Dependency manifest not found: {path}\n\n\
         hint: Pass the path of a .repos/.yaml file with a 'repositories:' mapping\n\
         hint: Relative paths are resolved from the current directory",
        path = path.display()
    )
}

/// `update`/`build` was pointed at a directory that is not a workspace.
pub fn workspace_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Workspace not found: {path}\n\n\
         hint: Run 'wsforge setup <manifest> --workspace {path}' to create it\n\
         hint: Run 'wsforge build' without --workspace to pick an existing one",
        path = path.display()
    )
}

/// No workspace was given and none could be found or prompted for.
pub fn no_workspace_selected(home: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "No workspace selected\n\n\
         hint: Pass --workspace <PATH>\n\
         hint: Workspaces are looked for as '*_ws' directories in {home}",
        home = home.display()
    )
}

/// An explicit underlay has no activation file. Suggests a discovered
/// underlay with a similar name when there is one.
pub fn underlay_not_found(path: &Path, discovered: &[PathBuf]) -> anyhow::Error {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let names: Vec<String> = discovered
        .iter()
        .filter_map(|d| d.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    let candidates: Vec<&str> = names.iter().map(String::as_str).collect();

    let did_you_mean = find_similar(&name, &candidates)
        .and_then(|similar| {
            discovered
                .iter()
                .find(|d| d.file_name().is_some_and(|n| n == similar))
        })
        .map(|d| format!("\nhint: Did you mean '{}'?", d.display()))
        .unwrap_or_default();

    anyhow::anyhow!(
        "No activation file found in underlay {path}{did_you_mean}\n\n\
         hint: An underlay contains setup.bash (or setup.zsh/setup.sh), directly or in install/ or devel/\n\
         hint: Run 'wsforge underlays' to list the underlays found on this machine",
        path = path.display()
    )
}

/// The settings file could not be loaded.
pub fn settings_invalid(error: &crate::error::Error) -> anyhow::Error {
    anyhow::anyhow!(
        "{error}\n\n\
         hint: Use --config to point at another settings file\n\
         hint: Unset {CONFIG_ENV_VAR} to fall back to the default location"
    )
}

/// Closest candidate within an edit distance of 2, if any.
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&candidate| (candidate, edit_distance(input, candidate)))
        .filter(|&(_, distance)| distance <= 2 && distance < input.len())
        .min_by_key(|&(_, distance)| distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance, computed one row at a time.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        previous = current;
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_not_found_includes_hints() {
        let message = manifest_not_found(Path::new("/tmp/deps.repos")).to_string();
        assert!(message.contains("Dependency manifest not found: /tmp/deps.repos"));
        assert!(message.contains("hint:"));
    }

    #[test]
    fn test_workspace_not_found_suggests_setup() {
        let message = workspace_not_found(Path::new("/home/u/demo_ws")).to_string();
        assert!(message.contains("wsforge setup"));
        assert!(message.contains("/home/u/demo_ws"));
    }

    #[test]
    fn test_underlay_not_found_suggests_similar() {
        let discovered = vec![
            PathBuf::from("/opt/ros/humble"),
            PathBuf::from("/opt/ros/jazzy"),
        ];
        let message = underlay_not_found(Path::new("/opt/ros/humbel"), &discovered).to_string();
        assert!(message.contains("Did you mean '/opt/ros/humble'?"));

        let message = underlay_not_found(Path::new("/srv/other"), &discovered).to_string();
        assert!(!message.contains("Did you mean"));
        assert!(message.contains("wsforge underlays"));
    }

    #[test]
    fn test_settings_invalid_mentions_env_var() {
        let error = crate::error::Error::ConfigParse {
            message: "bad".to_string(),
            hint: None,
        };
        let message = settings_invalid(&error).to_string();
        assert!(message.contains("Configuration parsing error: bad"));
        assert!(message.contains("WSFORGE_CONFIG"));
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("humble", "humble"), 0);
        assert_eq!(edit_distance("humbel", "humble"), 2);
        assert_eq!(edit_distance("jazy", "jazzy"), 1);
        assert_eq!(edit_distance("", "iron"), 4);
        assert_eq!(edit_distance("noetic", ""), 6);
    }

    #[test]
    fn test_find_similar() {
        let candidates = ["humble", "jazzy", "iron"];
        assert_eq!(find_similar("humbl", &candidates), Some("humble"));
        assert_eq!(find_similar("irn", &candidates), Some("iron"));
        assert_eq!(find_similar("noetic", &candidates), None);
    }
}
