//! # Build Orchestration
//!
//! [`BuildOrchestrator`] turns a validated workspace into a build:
//!
//! 1. Load the step script (or use the built-in `colcon build` script).
//! 2. Choose the underlay: an explicit path is validated; otherwise the
//!    underlay the workspace was last built against is inferred and offered
//!    alongside every discovered underlay.
//! 3. Source the underlay's activation file into the current process and
//!    warn about ROS variables it failed to define.
//! 4. Bind `workspace`, `underlay`, `shell`, `home` and caller variables
//!    into a [`TemplateContext`] and render the script.
//! 5. Run each step in order with the workspace as working directory. A
//!    step with a `prompt` runs only once confirmed.
//!
//! The first failing step ends the build with its error. Output of earlier
//! steps stays in place.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::defaults::{default_underlay_search_roots, DEFAULT_BUILD_TOOL, DEFAULT_STEP_TIMEOUT_SECS};
use crate::error::Result;
use crate::logger::Logger;
use crate::prompter::Prompter;
use crate::runner::{source_activation_file, CommandRunner, CommandSpec};
use crate::shell::Shell;
use crate::steps::{Step, StepAction, StepScript, TemplateContext};
use crate::underlay::{
    activation_file, find_underlays, infer_default_underlay, missing_ros_variables,
    validate_custom_underlay,
};
use crate::workspace::Workspace;

/// Label appended to the underlay the workspace was last built against.
const LAST_USED_LABEL: &str = "(last used underlay)";
/// Final entry of the underlay menu.
const CUSTOM_UNDERLAY_OPTION: &str = "Enter a custom underlay path";

/// How the build underlay is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnderlayChoice {
    /// Use this path; it must contain an activation file.
    Explicit(PathBuf),
    /// Offer the last-used and discovered underlays through the prompter.
    Select,
    /// Build without sourcing an underlay.
    None,
}

/// Parameters of one build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub workspace: Workspace,
    pub underlay: UnderlayChoice,
    /// Step script to run; `None` runs the default build.
    pub script: Option<PathBuf>,
    /// Extra placeholders available to the step script.
    pub variables: Vec<(String, String)>,
}

impl BuildRequest {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            underlay: UnderlayChoice::Select,
            script: None,
            variables: Vec::new(),
        }
    }
}

/// What a finished build did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub underlay: Option<PathBuf>,
    pub steps_run: usize,
    /// Steps whose prompt was declined.
    pub steps_skipped: usize,
}

pub struct BuildOrchestrator {
    runner: Arc<dyn CommandRunner>,
    logger: Arc<dyn Logger>,
    prompter: Arc<dyn Prompter>,
    shell: Arc<dyn Shell>,
    search_roots: Vec<PathBuf>,
    build_tool: String,
    step_timeout: Duration,
    home: PathBuf,
}

impl BuildOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        logger: Arc<dyn Logger>,
        prompter: Arc<dyn Prompter>,
        shell: Arc<dyn Shell>,
    ) -> Self {
        Self {
            runner,
            logger,
            prompter,
            shell,
            search_roots: default_underlay_search_roots(),
            build_tool: DEFAULT_BUILD_TOOL.to_string(),
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
        }
    }

    /// Directories whose subdirectories are searched for underlays.
    pub fn with_search_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.search_roots = roots;
        self
    }

    pub fn with_build_tool(mut self, build_tool: impl Into<String>) -> Self {
        self.build_tool = build_tool.into();
        self
    }

    /// Time budget of each command a step runs.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Run the build described by `request`.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        let workspace = &request.workspace;
        let script = match &request.script {
            Some(path) => StepScript::load(path)?,
            None => StepScript::default_build(&self.build_tool),
        };

        let mut variables = TemplateContext::new();
        for (key, value) in &request.variables {
            variables.insert(key, value.as_str())?;
        }

        let underlay = self.select_underlay(workspace, &request.underlay)?;
        match &underlay {
            Some(root) => {
                self.logger.info(&format!("Using underlay: {}", root.display()));
                self.activate(root);
            }
            None => self.logger.info("Building without an underlay"),
        }

        let mut context = TemplateContext::standard(
            workspace.root(),
            underlay.as_deref(),
            &self.shell.user_shell(),
            &self.home,
        );
        context.extend(variables);
        let script = script.render(&context)?;

        let mut report = BuildReport {
            underlay,
            ..BuildReport::default()
        };
        for (index, step) in script.steps.iter().enumerate() {
            if self.run_step(workspace, index + 1, step)? {
                report.steps_run += 1;
            } else {
                report.steps_skipped += 1;
            }
        }

        self.logger.info(&format!(
            "Build of {} finished: {} step(s) run, {} skipped",
            workspace.root().display(),
            report.steps_run,
            report.steps_skipped
        ));
        Ok(report)
    }

    /// Resolve `choice` to an underlay root.
    pub fn select_underlay(
        &self,
        workspace: &Workspace,
        choice: &UnderlayChoice,
    ) -> Result<Option<PathBuf>> {
        let shell_name = self.shell.name();
        match choice {
            UnderlayChoice::None => Ok(None),
            UnderlayChoice::Explicit(path) => {
                let path = self.expand_home(path);
                Ok(Some(validate_custom_underlay(&path, &shell_name)?.root))
            }
            UnderlayChoice::Select => {
                let last_used = infer_default_underlay(workspace, self.logger.as_ref())?;
                let discovered: Vec<PathBuf> =
                    find_underlays(&self.search_roots, &shell_name, self.logger.as_ref())?
                        .into_iter()
                        .map(|underlay| underlay.root)
                        .collect();
                self.prompt_for_underlay(discovered, last_used, &shell_name)
            }
        }
    }

    fn prompt_for_underlay(
        &self,
        mut candidates: Vec<PathBuf>,
        last_used: Option<PathBuf>,
        shell_name: &str,
    ) -> Result<Option<PathBuf>> {
        if self.prompter.assume_defaults() {
            let selected = last_used.or_else(|| candidates.first().cloned());
            match &selected {
                Some(underlay) => self
                    .logger
                    .debug(&format!("Assuming default underlay: {}", underlay.display())),
                None => self
                    .logger
                    .warn("No underlays available to select by default."),
            }
            return Ok(selected);
        }

        if candidates.is_empty() && last_used.is_none() {
            self.logger
                .warn("No underlays found. Proceeding without underlays.");
            return Ok(None);
        }

        let mut default = 0;
        if let Some(last) = &last_used {
            match candidates.iter().position(|c| c == last) {
                Some(position) => default = position,
                None => {
                    candidates.push(last.clone());
                    default = candidates.len() - 1;
                }
            }
        }

        let mut options: Vec<String> = candidates
            .iter()
            .map(|candidate| {
                if Some(candidate) == last_used.as_ref() {
                    format!("{} {}", candidate.display(), LAST_USED_LABEL)
                } else {
                    candidate.display().to_string()
                }
            })
            .collect();
        options.push(CUSTOM_UNDERLAY_OPTION.to_string());

        let selection = self
            .prompter
            .select("Select an underlay", &options, Some(default))?;
        if let Some(selected) = candidates.get(selection) {
            self.logger
                .debug(&format!("User selected underlay: {}", selected.display()));
            return Ok(Some(selected.clone()));
        }

        loop {
            let answer = self
                .prompter
                .input("Enter the path to the custom underlay", None, &[])?;
            let answer = answer.trim();
            if answer.is_empty() {
                self.logger.warn("Please enter a valid existing path.");
                continue;
            }
            match validate_custom_underlay(&self.expand_home(Path::new(answer)), shell_name) {
                Ok(underlay) => {
                    self.logger.debug(&format!(
                        "User entered custom underlay: {}",
                        underlay.root.display()
                    ));
                    return Ok(Some(underlay.root));
                }
                Err(e) => self.logger.error(&e.to_string()),
            }
        }
    }

    /// Source the activation file of `root` into this process.
    ///
    /// A missing activation file or a failure to source it is reported but
    /// does not stop the build.
    fn activate(&self, root: &Path) {
        let Some(file) = activation_file(root, &self.shell.name()) else {
            self.logger.warn(&format!(
                "Setup file not found for underlay {}; building without sourcing it.",
                root.display()
            ));
            return;
        };
        match source_activation_file(
            self.runner.as_ref(),
            self.shell.as_ref(),
            &file,
            self.logger.as_ref(),
        ) {
            Ok(_) => {
                self.logger.info("Successfully sourced setup file.");
                let missing = missing_ros_variables();
                if !missing.is_empty() {
                    self.logger.warn(&format!(
                        "ROS environment may not be fully configured; missing: {}",
                        missing.join(", ")
                    ));
                }
            }
            Err(e) => self.logger.warn(&format!("Failed to source {}: {}", file.display(), e)),
        }
    }

    /// Run one step; returns false when its prompt was declined.
    fn run_step(&self, workspace: &Workspace, number: usize, step: &Step) -> Result<bool> {
        if let Some(message) = &step.message {
            self.logger.info(message);
        }
        if let Some(prompt) = &step.prompt {
            if !self.prompter.confirm(prompt, true)? {
                self.logger.info(&format!("Skipping step {}", number));
                return Ok(false);
            }
        }

        match &step.action {
            None => self
                .logger
                .debug(&format!("Step {} has nothing to run", number)),
            Some(StepAction::RunCommand(command)) => self.run_shell(workspace, command)?,
            Some(StepAction::RunCommands(commands)) => {
                for command in commands {
                    self.run_shell(workspace, command)?;
                }
            }
            Some(StepAction::RunScript {
                body,
                shebang: None,
            }) => self.run_shell(workspace, body)?,
            Some(StepAction::RunScript {
                body,
                shebang: Some(interpreter),
            }) => self.run_interpreted(workspace, interpreter, body)?,
        }
        Ok(true)
    }

    fn run_shell(&self, workspace: &Workspace, script: &str) -> Result<()> {
        self.logger.debug(&format!("Running command: {}", script));
        let spec = CommandSpec::shell(&self.shell.user_shell(), script)
            .cwd(workspace.root())
            .timeout(self.step_timeout);
        self.runner.run(&spec)?;
        Ok(())
    }

    /// Write `body` to a temporary file and run it with `interpreter`.
    fn run_interpreted(&self, workspace: &Workspace, interpreter: &str, body: &str) -> Result<()> {
        let mut file = tempfile::Builder::new()
            .prefix("wsforge-step-")
            .tempfile()?;
        writeln!(file, "#!{}", interpreter)?;
        file.write_all(body.as_bytes())?;
        file.flush()?;

        let mut words = interpreter.split_whitespace();
        let program = words.next().unwrap_or(interpreter);
        let spec = CommandSpec::new(program)
            .args(words)
            .arg(file.path().to_string_lossy())
            .cwd(workspace.root())
            .timeout(self.step_timeout);

        self.logger
            .debug(&format!("Running script with {}", interpreter));
        self.runner.run(&spec)?;
        Ok(())
    }

    fn expand_home(&self, path: &Path) -> PathBuf {
        match path.strip_prefix("~") {
            Ok(rest) => self.home.join(rest),
            Err(_) => path.to_path_buf(),
        }
    }
}
