//! # Command Execution
//!
//! Every external process `wsforge` starts (`vcs`, `colcon`, step scripts,
//! activation-file sourcing) goes through a [`CommandRunner`]. The
//! process-backed implementation, [`ProcessRunner`], provides:
//!
//! - **Streaming**: stdout and stderr are drained by two reader threads into
//!   a channel; the calling thread forwards each line to the logger as it
//!   arrives (stdout at `Info`, stderr at `Warn`) and keeps a copy.
//! - **Timeouts**: the child is polled with `try_wait`; once the attempt's
//!   deadline passes it is killed together with its process group (on Unix a
//!   timed command is spawned as a group leader). Draining after a kill is bounded by a
//!   short grace period, so a grandchild that inherited the pipes cannot
//!   keep the call alive.
//! - **Retries**: a non-zero exit or a timeout consumes one attempt; the
//!   command is re-run immediately until `retries + 1` attempts have been
//!   made. The last failure is reported as `CommandFailed` or
//!   `CommandTimedOut` with the attempt count.
//!
//! The trait exists so higher layers can be exercised with scripted runners
//! in tests, the same way repository access is mocked.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::shell::{self, Shell};

/// Time budget for sourcing an activation file.
const SOURCE_TIMEOUT: Duration = Duration::from_secs(60);

/// A single external-process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Budget of each attempt; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Additional attempts after the first failure.
    pub retries: u32,
    pub env: Vec<(String, String)>,
    /// Capture output without streaming it to the logger.
    pub quiet: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
            retries: 0,
            env: Vec::new(),
            quiet: false,
        }
    }

    /// Run `script` with `shell -c`.
    pub fn shell(shell: &Path, script: impl Into<String>) -> Self {
        Self::new(shell.to_string_lossy()).arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Total number of attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", shell::quote(arg))?;
        }
        Ok(())
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// Executes external commands.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

enum Attempt {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

/// Runs commands as child processes of the current process.
pub struct ProcessRunner {
    logger: Arc<dyn Logger>,
    poll_interval: Duration,
    drain_grace: Duration,
}

impl ProcessRunner {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            logger,
            poll_interval: Duration::from_millis(20),
            drain_grace: Duration::from_millis(500),
        }
    }

    /// How long to keep reading output once the child is gone and the pipes
    /// have gone quiet.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    fn run_once(&self, spec: &CommandSpec) -> Result<Attempt> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }
        // A timed command leads its own process group so the whole tree can
        // be signalled at the deadline.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if spec.timeout.is_some() {
                command.process_group(0);
            }
        }

        let mut child = command.spawn().map_err(|e| Error::CommandSpawn {
            command: spec.to_string(),
            message: e.to_string(),
        })?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, Stream::Stderr, tx);
        }

        let deadline = spec.timeout.map(|timeout| Instant::now() + timeout);
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut readers_done = false;

        let status = loop {
            if readers_done {
                thread::sleep(self.poll_interval);
            } else {
                match rx.recv_timeout(self.poll_interval) {
                    Ok((stream, line)) => self.emit(spec, stream, line, &mut stdout, &mut stderr),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => readers_done = true,
                }
            }

            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                kill(&mut child);
                break None;
            }
        };

        self.drain(spec, &rx, &mut stdout, &mut stderr);

        Ok(match status {
            Some(status) => Attempt::Exited {
                status,
                stdout,
                stderr,
            },
            None => Attempt::TimedOut,
        })
    }

    fn drain(
        &self,
        spec: &CommandSpec,
        rx: &Receiver<(Stream, String)>,
        stdout: &mut String,
        stderr: &mut String,
    ) {
        while let Ok((stream, line)) = rx.recv_timeout(self.drain_grace) {
            self.emit(spec, stream, line, stdout, stderr);
        }
    }

    fn emit(
        &self,
        spec: &CommandSpec,
        stream: Stream,
        line: String,
        stdout: &mut String,
        stderr: &mut String,
    ) {
        if !spec.quiet {
            match stream {
                Stream::Stdout => self.logger.info(&line),
                Stream::Stderr => self.logger.warn(&line),
            }
        }
        let buffer = match stream {
            Stream::Stdout => stdout,
            Stream::Stderr => stderr,
        };
        buffer.push_str(&line);
        buffer.push('\n');
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let command = spec.to_string();
        let max_attempts = spec.max_attempts();
        let mut last_failure = None;

        for attempt in 1..=max_attempts {
            self.logger.debug(&format!(
                "Executing `{}` in {} (attempt {}/{})",
                command,
                spec.cwd
                    .as_deref()
                    .map(|cwd| cwd.display().to_string())
                    .unwrap_or_else(|| ".".to_string()),
                attempt,
                max_attempts
            ));

            match self.run_once(spec)? {
                Attempt::Exited {
                    status,
                    stdout,
                    stderr,
                } if status.success() => {
                    return Ok(CommandOutput {
                        exit_code: 0,
                        stdout,
                        stderr,
                        attempts: attempt,
                    });
                }
                Attempt::Exited { status, stderr, .. } => {
                    let exit_code = status.code().unwrap_or(-1);
                    self.logger.error(&format!(
                        "`{}` exited with code {} (attempt {}/{})",
                        command, exit_code, attempt, max_attempts
                    ));
                    last_failure = Some(Error::CommandFailed {
                        command: command.clone(),
                        exit_code,
                        stderr,
                        attempts: attempt,
                    });
                }
                Attempt::TimedOut => {
                    let timeout = spec.timeout.unwrap_or_default();
                    self.logger.error(&format!(
                        "`{}` timed out after {:?} and was killed (attempt {}/{})",
                        command, timeout, attempt, max_attempts
                    ));
                    last_failure = Some(Error::CommandTimedOut {
                        command: command.clone(),
                        timeout,
                        attempts: attempt,
                    });
                }
            }
        }

        Err(last_failure.unwrap_or_else(|| Error::CommandFailed {
            command,
            exit_code: -1,
            stderr: String::new(),
            attempts: 0,
        }))
    }
}

fn spawn_reader<R>(source: R, stream: Stream, tx: Sender<(Stream, String)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: plain syscall. The child has not been reaped yet, so its
            // id still names the group it leads.
            #[allow(unsafe_code)]
            let _ = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        }
    }
    // Fails only when the child already exited.
    let _ = child.kill();
    let _ = child.wait();
}

/// Parse the output of `env` into key/value pairs.
///
/// Lines that are not `NAME=value` with a valid variable name are skipped;
/// this drops the continuation lines of multi-line values and exported
/// shell functions.
pub fn parse_env_output(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .filter(|(key, value)| is_env_name(key) && !value.contains('\0'))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn is_env_name(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Source `file` in the user's shell and apply the resulting environment to
/// the current process.
///
/// Only variables whose value differs from the current environment are
/// written. Returns the number of variables changed.
pub fn source_activation_file(
    runner: &dyn CommandRunner,
    shell: &dyn Shell,
    file: &Path,
    logger: &dyn Logger,
) -> Result<usize> {
    let spec = CommandSpec::shell(
        &shell.user_shell(),
        shell::source_command(&shell.name(), file),
    )
    .timeout(SOURCE_TIMEOUT)
    .quiet(true);

    logger.debug(&format!("Sourcing {}", file.display()));
    let output = runner.run(&spec)?;

    let current: HashMap<String, String> = env::vars().collect();
    let mut changed = 0;
    for (key, value) in parse_env_output(&output.stdout) {
        if current.get(&key) != Some(&value) {
            env::set_var(&key, &value);
            changed += 1;
        }
    }

    logger.debug(&format!(
        "Sourced {}: {} variable(s) updated",
        file.display(),
        changed
    ));
    Ok(changed)
}
