//! Library-level integration tests: resolve a workspace through the `vcs`
//! fetcher, then build it with real processes.
//!
//! Cloning is simulated by a command runner that understands
//! `vcs import --input <manifest> <dir>` and copies `<manifest>.tree/` into
//! the workspace. Build steps run through `/bin/sh`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serial_test::serial;
use tempfile::TempDir;
use walkdir::WalkDir;

use wsforge::error::{Error, Result};
use wsforge::fetcher::VcsFetcher;
use wsforge::logger::{Level, MemoryLogger};
use wsforge::orchestrator::{BuildOrchestrator, BuildRequest, UnderlayChoice};
use wsforge::prompter::ScriptedPrompter;
use wsforge::resolver::DependencyResolver;
use wsforge::runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
use wsforge::shell::FixedShell;
use wsforge::workspace::{CreateMode, Workspace};

const PKG1: &str = r#"
repositories:
  pkg1:
    type: git
    url: https://example.com/pkg1.git
    version: main
"#;

const PKG2: &str = r#"
repositories:
  pkg2:
    type: git
    url: https://example.com/pkg2.git
    version: main
"#;

/// Interprets `vcs import` by copying the tree prepared next to the
/// manifest; `vcs pull` is recorded only.
#[derive(Default)]
struct TreeRunner {
    calls: Mutex<Vec<Vec<String>>>,
}

impl TreeRunner {
    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for TreeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.args.clone());
        if spec.args.first().map(String::as_str) == Some("import") {
            let manifest = PathBuf::from(&spec.args[2]);
            let cwd = spec.cwd.clone().expect("vcs runs in the workspace root");
            let tree = PathBuf::from(format!("{}.tree", manifest.display()));
            if tree.is_dir() {
                copy_tree(&tree, &cwd.join(&spec.args[3]))?;
            }
        }
        Ok(CommandOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            attempts: 1,
        })
    }
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let target = to.join(entry.path().strip_prefix(from).unwrap());
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_resolve_through_vcs_fetcher() {
    let temp = TempDir::new().unwrap();
    let root_manifest = temp.path().join("cohort.repos");
    write(&root_manifest, PKG1);
    write(
        &temp.path().join("cohort.repos.tree/pkg1/dependencies.repos"),
        PKG2,
    );
    write(
        &temp
            .path()
            .join("cohort.repos.tree/pkg1/dependencies.repos.tree/pkg2/package.xml"),
        "<package/>",
    );

    let runner = Arc::new(TreeRunner::default());
    let logger = Arc::new(MemoryLogger::new());
    let fetcher = VcsFetcher::new(runner.clone(), logger.clone()).with_retries(0);
    let resolver = DependencyResolver::new(Arc::new(fetcher), logger.clone());

    let workspace = Workspace::open(temp.path().join("cohort_ws"), CreateMode::Create).unwrap();
    let resolution = resolver.resolve(&workspace, &root_manifest).unwrap();

    assert_eq!(resolution.passes, 2);
    assert_eq!(resolution.fetched.len(), 2);
    assert!(workspace.src_dir().join("pkg2/package.xml").is_file());

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0][0], "import");
    assert_eq!(calls[0][1], "--input");
    assert_eq!(calls[1][2], workspace.src_dir().join("pkg1/dependencies.repos").to_string_lossy());
    assert!(logger.contains("Pass 2: found 1 new manifest(s)"));
}

#[test]
fn test_invalid_nested_manifest_stops_resolution() {
    let temp = TempDir::new().unwrap();
    let root_manifest = temp.path().join("cohort.repos");
    write(&root_manifest, PKG1);
    write(
        &temp.path().join("cohort.repos.tree/pkg1/dependencies.repos"),
        "repositories:\n  broken:\n    type: git\n",
    );

    let runner = Arc::new(TreeRunner::default());
    let logger = Arc::new(MemoryLogger::new());
    let resolver = DependencyResolver::new(
        Arc::new(VcsFetcher::new(runner.clone(), logger.clone())),
        logger,
    );
    let workspace = Workspace::open(temp.path().join("cohort_ws"), CreateMode::Create).unwrap();

    let err = resolver.resolve(&workspace, &root_manifest).unwrap_err();
    assert!(matches!(err, Error::InvalidManifest { .. }));
    // The first clone stays in place.
    assert!(workspace.src_dir().join("pkg1").is_dir());
    assert_eq!(runner.calls().len(), 1);
}

#[test]
#[serial]
fn test_build_with_custom_underlay_from_menu() {
    let temp = TempDir::new().unwrap();
    write(&temp.path().join("ros/humble/setup.sh"), "export ROS_DISTRO=humble\n");
    let custom = temp.path().join("elsewhere/overlay_ws");
    write(
        &custom.join("install/setup.sh"),
        "export ROS_DISTRO=iron\nexport WSFORGE_IT_OVERLAY=1\n",
    );
    let script = temp.path().join("steps.yaml");
    write(
        &script,
        "steps:\n  - command: echo \"$ROS_DISTRO:$underlay\" > out.txt\n",
    );
    let workspace = Workspace::open(temp.path().join("demo_ws"), CreateMode::Create).unwrap();

    let logger = Arc::new(MemoryLogger::new());
    let prompter = Arc::new(ScriptedPrompter::new([
        "1".to_string(),
        "/definitely/not/here".to_string(),
        custom.display().to_string(),
    ]));
    let orchestrator = BuildOrchestrator::new(
        Arc::new(ProcessRunner::new(logger.clone())),
        logger.clone(),
        prompter.clone(),
        Arc::new(FixedShell::new("/bin/sh")),
    )
    .with_search_roots(vec![temp.path().join("ros")])
    .with_home(temp.path());

    let request = BuildRequest {
        script: Some(script),
        ..BuildRequest::new(workspace.clone())
    };
    let report = orchestrator.build(&request).unwrap();

    assert_eq!(report.underlay.as_deref(), Some(custom.as_path()));
    assert_eq!(report.steps_run, 1);
    assert_eq!(
        fs::read_to_string(workspace.root().join("out.txt")).unwrap(),
        format!("iron:{}\n", custom.display())
    );
    assert_eq!(std::env::var("WSFORGE_IT_OVERLAY").as_deref(), Ok("1"));

    let menu = &prompter.asked()[0];
    assert!(menu.contains("ros/humble"));
    assert!(menu.ends_with("Enter a custom underlay path"));
    assert!(logger
        .messages_at(Level::Error)
        .iter()
        .any(|m| m.contains("/definitely/not/here")));

    std::env::remove_var("WSFORGE_IT_OVERLAY");
}

#[test]
#[serial]
fn test_build_without_underlay_binds_empty_placeholder() {
    let temp = TempDir::new().unwrap();
    let workspace = Workspace::open(temp.path().join("demo_ws"), CreateMode::Create).unwrap();
    let script = temp.path().join("steps.yaml");
    write(
        &script,
        "steps:\n  - commands:\n      - echo \"[$underlay]\" > out.txt\n      - echo \"$$HOME\" >> out.txt\n",
    );

    let logger = Arc::new(MemoryLogger::new());
    let orchestrator = BuildOrchestrator::new(
        Arc::new(ProcessRunner::new(logger.clone())),
        logger,
        Arc::new(ScriptedPrompter::assuming_defaults()),
        Arc::new(FixedShell::new("/bin/sh")),
    )
    .with_home(temp.path());

    let request = BuildRequest {
        underlay: UnderlayChoice::None,
        script: Some(script),
        ..BuildRequest::new(workspace.clone())
    };
    orchestrator.build(&request).unwrap();

    let out = fs::read_to_string(workspace.root().join("out.txt")).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "[]");
    assert_eq!(lines[1], std::env::var("HOME").unwrap_or_default());
}
