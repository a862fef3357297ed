//! # Build Step Scripts
//!
//! A step script is a YAML file describing what a build runs:
//!
//! ```yaml
//! steps:
//!   - message: Building $workspace on top of $underlay
//!     command: colcon build --symlink-install
//!   - prompt: Run the test suite?
//!     commands:
//!       - colcon test
//!       - colcon test-result --verbose
//!   - script: |
//!       #!/usr/bin/env python3
//!       print("done")
//! ```
//!
//! Each step carries exactly one action (`command`, `commands` or `script`),
//! an optional `message` logged before it runs and an optional `prompt`
//! that must be confirmed for the step to run.
//!
//! ## Placeholders
//!
//! The file is parsed first; placeholders are substituted afterwards, inside
//! the string fields of the parsed steps. A substituted value therefore can
//! never change the structure of the script. Only keys registered in the
//! [`TemplateContext`] are replaced:
//!
//! - `$name` and `${name}` expand to the value of `name`;
//! - `$$` expands to a single `$`;
//! - any other `$...` (such as `$HOME` when `home` is not registered under
//!   that exact name) is left as written, for the shell to expand.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::defaults::DEFAULT_BUILD_TOOL;
use crate::error::{Error, Result};

/// Keys bound by [`TemplateContext::standard`]; user variables cannot replace them.
pub const STANDARD_KEYS: [&str; 4] = ["workspace", "underlay", "shell", "home"];

const PLACEHOLDER_PATTERN: &str = r"\$(?:(\$)|([A-Za-z_][A-Za-z0-9_]*)|\{([A-Za-z_][A-Za-z0-9_]*)\})";

/// What a step runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// A single shell command.
    RunCommand(String),
    /// Shell commands run one after another; the first failure stops the
    /// step.
    RunCommands(Vec<String>),
    /// An inline script. With a shebang the named interpreter runs the
    /// remaining lines, otherwise the user's shell does.
    RunScript {
        body: String,
        shebang: Option<String>,
    },
}

impl StepAction {
    /// Build a script action, splitting off a leading `#!` line.
    pub fn script(text: &str) -> Self {
        match text.strip_prefix("#!") {
            Some(rest) => {
                let (line, body) = rest.split_once('\n').unwrap_or((rest, ""));
                let interpreter = line.trim();
                StepAction::RunScript {
                    body: body.to_string(),
                    shebang: (!interpreter.is_empty()).then(|| interpreter.to_string()),
                }
            }
            None => StepAction::RunScript {
                body: text.to_string(),
                shebang: None,
            },
        }
    }

    fn map_strings<F>(&self, f: &mut F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        match self {
            StepAction::RunCommand(command) => StepAction::RunCommand(f(command)),
            StepAction::RunCommands(commands) => {
                StepAction::RunCommands(commands.iter().map(|c| f(c)).collect())
            }
            StepAction::RunScript { body, shebang } => StepAction::RunScript {
                body: f(body),
                shebang: shebang.as_deref().map(|s| f(s)),
            },
        }
    }
}

/// One entry of a step script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub message: Option<String>,
    pub prompt: Option<String>,
    /// `None` for a step that only logs its message.
    pub action: Option<StepAction>,
}

/// An ordered list of build steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepScript {
    /// File the script was loaded from; `None` for the built-in script.
    pub path: Option<PathBuf>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScript {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    message: Option<String>,
    prompt: Option<String>,
    command: Option<String>,
    commands: Option<Vec<String>>,
    script: Option<String>,
}

impl StepScript {
    /// Load and parse the step script at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::StepScript {
            path: path.to_path_buf(),
            message: format!("cannot read file: {}", e),
        })?;
        Self::parse(path, &content)
    }

    /// Parse step script `content`; `path` is used for error messages.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let error = |message: String| Error::StepScript {
            path: path.to_path_buf(),
            message,
        };

        let raw: RawScript =
            serde_yaml::from_str(content).map_err(|e| error(format!("malformed YAML: {}", e)))?;

        let steps = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                let mut actions = Vec::new();
                if let Some(command) = step.command {
                    actions.push(StepAction::RunCommand(command));
                }
                if let Some(commands) = step.commands {
                    actions.push(StepAction::RunCommands(commands));
                }
                if let Some(script) = step.script {
                    actions.push(StepAction::script(&script));
                }
                if actions.len() > 1 {
                    return Err(error(format!(
                        "step {} has more than one of 'command', 'commands' and 'script'",
                        index + 1
                    )));
                }
                Ok(Step {
                    message: step.message,
                    prompt: step.prompt,
                    action: actions.pop(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: Some(path.to_path_buf()),
            steps,
        })
    }

    /// The script used when none is given: a single `<build_tool> build`.
    pub fn default_build(build_tool: &str) -> Self {
        let tool = if build_tool.is_empty() {
            DEFAULT_BUILD_TOOL
        } else {
            build_tool
        };
        Self {
            path: None,
            steps: vec![Step {
                message: Some(format!("Building workspace $workspace with {}", tool)),
                prompt: None,
                action: Some(StepAction::RunCommand(format!("{} build", tool))),
            }],
        }
    }

    /// A copy of the script with every placeholder substituted.
    pub fn render(&self, context: &TemplateContext) -> Result<Self> {
        let regex = Regex::new(PLACEHOLDER_PATTERN)?;
        let mut substitute = |text: &str| context.substitute_with(&regex, text);

        let steps = self
            .steps
            .iter()
            .map(|step| Step {
                message: step.message.as_deref().map(&mut substitute),
                prompt: step.prompt.as_deref().map(&mut substitute),
                action: step.action.as_ref().map(|a| a.map_strings(&mut substitute)),
            })
            .collect();

        Ok(Self {
            path: self.path.clone(),
            steps,
        })
    }
}

/// Values available to step-script placeholders.
///
/// Only keys inserted here are ever substituted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with the standard keys: `workspace`, `underlay` (empty when
    /// building without one), `shell` and `home`.
    pub fn standard(workspace: &Path, underlay: Option<&Path>, shell: &Path, home: &Path) -> Self {
        let mut context = Self::new();
        let path = |p: &Path| p.to_string_lossy().to_string();
        context
            .values
            .insert("workspace".to_string(), path(workspace));
        context.values.insert(
            "underlay".to_string(),
            underlay.map(path).unwrap_or_default(),
        );
        context.values.insert("shell".to_string(), path(shell));
        context.values.insert("home".to_string(), path(home));
        context
    }

    /// Register an additional key.
    ///
    /// Keys must be valid identifiers (`[A-Za-z_][A-Za-z0-9_]*`) other than
    /// the [`STANDARD_KEYS`].
    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let valid = key
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::StepScript {
                path: PathBuf::new(),
                message: format!("invalid template variable name '{}'", key),
            });
        }
        if STANDARD_KEYS.contains(&key) {
            return Err(Error::StepScript {
                path: PathBuf::new(),
                message: format!("'{}' is a built-in variable and cannot be overridden", key),
            });
        }
        self.values.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Add every key of `other`, replacing existing values.
    pub fn extend(&mut self, other: TemplateContext) {
        self.values.extend(other.values);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Substitute the placeholders of `text`.
    pub fn substitute(&self, text: &str) -> Result<String> {
        let regex = Regex::new(PLACEHOLDER_PATTERN)?;
        Ok(self.substitute_with(&regex, text))
    }

    fn substitute_with(&self, regex: &Regex, text: &str) -> String {
        regex
            .replace_all(text, |caps: &Captures| {
                if caps.get(1).is_some() {
                    return "$".to_string();
                }
                let name = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
                match name.and_then(|name| self.values.get(name)) {
                    Some(value) => value.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}
