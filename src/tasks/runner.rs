//! Shelling out.
//!
//! Everything the harness executes (remote ssh commands, remote builds, the
//! chart renderer) goes through a `CommandRunner`, so the orchestration can
//! be driven by a runner that only records what it was asked to do.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::{
    collections::BTreeMap,
    io::{ErrorKind, Write},
    process::{Child, Command, Stdio},
};

/// Handle to a command submitted to a runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunHandle(usize);

/// Exit status of a finished command. `code` is `None` when the process was
/// terminated by a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunStatus {
    code: Option<i32>,
}

impl RunStatus {
    pub fn from_code(code: Option<i32>) -> Self {
        RunStatus { code }
    }

    pub fn success() -> Self {
        RunStatus { code: Some(0) }
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait CommandRunner {
    /// Start `cmd` in the background.
    fn submit(&mut self, cmd: &str) -> Result<RunHandle>;

    /// Block until the command behind `handle` exits.
    fn wait(&mut self, handle: RunHandle) -> Result<RunStatus>;

    /// Run `cmd` in the foreground feeding `input` through its stdin.
    fn pipe(&mut self, cmd: &str, input: &str) -> Result<RunStatus>;

    /// Run `cmd` in the foreground.
    fn run(&mut self, cmd: &str) -> Result<RunStatus> {
        let handle = self.submit(cmd)?;
        self.wait(handle)
    }
}

/// Wait for every handle in order. Failed commands are reported but are not
/// turned into errors.
pub fn wait_all(
    runner: &mut dyn CommandRunner,
    handles: Vec<RunHandle>,
) -> Result<Vec<RunStatus>> {
    let mut statuses = Vec::with_capacity(handles.len());
    for handle in handles {
        let status = runner.wait(handle)?;
        if !status.is_success() {
            warn!(
                "wait_all(): command exited with non-zero status (code={:?})",
                status.code()
            );
        }
        statuses.push(status);
    }

    Ok(statuses)
}

/// Runs commands through `sh -c`.
#[derive(Debug, Default)]
pub struct ShellRunner {
    next_handle: usize,
    children: BTreeMap<RunHandle, (String, Child)>,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn shell(cmd: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd);
        command
    }
}

impl CommandRunner for ShellRunner {
    fn submit(&mut self, cmd: &str) -> Result<RunHandle> {
        debug!("submit(): spawning command: {cmd}");
        let child = Self::shell(cmd).spawn().map_err(|e| {
            let reason = format!("error spawning command (cmd={cmd}, error={e:?})");
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;

        let handle = RunHandle(self.next_handle);
        self.next_handle += 1;
        self.children.insert(handle, (cmd.to_string(), child));

        Ok(handle)
    }

    fn wait(&mut self, handle: RunHandle) -> Result<RunStatus> {
        let (cmd, mut child) = match self.children.remove(&handle) {
            Some(entry) => entry,
            None => {
                error!("wait(): unknown command handle (handle={handle:?})");
                anyhow::bail!("unknown command handle (handle={handle:?})");
            }
        };

        let status = child.wait().map_err(|e| {
            let reason = format!("error waiting for command (cmd={cmd}, error={e:?})");
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;
        debug!("wait(): command finished (cmd={cmd}, status={status})");

        Ok(RunStatus::from_code(status.code()))
    }

    fn pipe(&mut self, cmd: &str, input: &str) -> Result<RunStatus> {
        debug!("pipe(): running command: {cmd}");
        let mut child = Self::shell(cmd).stdin(Stdio::piped()).spawn()?;

        // Stdin is closed at the end of the match so the command sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(input.as_bytes()),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                error!("pipe(): failed to open stdin (cmd={cmd})");
                anyhow::bail!("failed to open stdin (cmd={cmd})");
            }
        };

        // Always reap the child, even if feeding it failed
        let status = child.wait().map_err(|e| {
            let reason = format!("error waiting for command (cmd={cmd}, error={e:?})");
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;

        match written {
            Ok(()) => {}
            // The command exited without reading all of its input
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("pipe(): command closed its stdin early (cmd={cmd})");
            }
            Err(e) => {
                let reason = format!("error writing to command (cmd={cmd}, error={e:?})");
                error!("{reason}");
                anyhow::bail!(reason);
            }
        }

        Ok(RunStatus::from_code(status.code()))
    }
}

/// Logs commands instead of running them, and remembers them in order.
/// Commands succeed unless they contain one of the `fail_matching` patterns.
#[derive(Debug, Default)]
pub struct DryRunner {
    commands: Vec<String>,
    inputs: Vec<String>,
    waited: Vec<RunHandle>,
    failing: Vec<String>,
}

impl DryRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report exit code 1 for every command containing `pattern`.
    pub fn fail_matching(mut self, pattern: &str) -> Self {
        self.failing.push(pattern.to_string());
        self
    }

    fn status_of(&self, cmd: &str) -> RunStatus {
        if self.failing.iter().any(|p| cmd.contains(p.as_str())) {
            RunStatus::from_code(Some(1))
        } else {
            RunStatus::success()
        }
    }

    /// Every command seen so far, background and foreground alike.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Stdin payloads passed to `pipe`, in order.
    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn waited(&self) -> &[RunHandle] {
        &self.waited
    }
}

impl CommandRunner for DryRunner {
    fn submit(&mut self, cmd: &str) -> Result<RunHandle> {
        info!("dry-run: {cmd}");
        self.commands.push(cmd.to_string());
        Ok(RunHandle(self.commands.len() - 1))
    }

    fn wait(&mut self, handle: RunHandle) -> Result<RunStatus> {
        let status = match self.commands.get(handle.0) {
            Some(cmd) => self.status_of(cmd),
            None => {
                error!("wait(): unknown command handle (handle={handle:?})");
                anyhow::bail!("unknown command handle (handle={handle:?})");
            }
        };
        self.waited.push(handle);
        Ok(status)
    }

    fn pipe(&mut self, cmd: &str, input: &str) -> Result<RunStatus> {
        info!("dry-run: {cmd} (with {} bytes on stdin)", input.len());
        self.commands.push(cmd.to_string());
        self.inputs.push(input.to_string());
        Ok(self.status_of(cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_runner_records_in_order() {
        let mut runner = DryRunner::new();
        let first = runner.submit("echo one").unwrap();
        let second = runner.submit("echo two").unwrap();

        let statuses = wait_all(&mut runner, vec![first, second]).unwrap();

        assert_eq!(runner.commands(), &["echo one", "echo two"]);
        assert_eq!(runner.waited(), &[first, second]);
        assert!(statuses.iter().all(RunStatus::is_success));
    }

    #[test]
    fn test_dry_runner_pipe() {
        let mut runner = DryRunner::new();
        runner.pipe("gnuplot > out.pdf", "plot x").unwrap();

        assert_eq!(runner.commands(), &["gnuplot > out.pdf"]);
        assert_eq!(runner.inputs(), &["plot x"]);
    }

    #[test]
    fn test_dry_runner_fail_matching() {
        let mut runner = DryRunner::new().fail_matching("-w 2");
        let handles = vec![
            runner.submit("arrange -w 1").unwrap(),
            runner.submit("arrange -w 2").unwrap(),
        ];

        let statuses = wait_all(&mut runner, handles).unwrap();
        assert!(statuses[0].is_success());
        assert_eq!(statuses[1].code(), Some(1));
        assert!(!runner.pipe("gnuplot -w 2", "plot x").unwrap().is_success());
        assert!(runner.wait(RunHandle(42)).is_err());
    }

    #[test]
    fn test_shell_runner_exit_codes() {
        if cfg!(not(unix)) {
            return;
        }

        let mut runner = ShellRunner::new();
        assert!(runner.run("true").unwrap().is_success());
        assert_eq!(runner.run("exit 3").unwrap().code(), Some(3));
    }

    #[test]
    fn test_shell_runner_background_and_pipe() {
        if cfg!(not(unix)) {
            return;
        }

        let temp_dir = tempfile::tempdir().unwrap();
        let out = temp_dir.path().join("out.txt");

        let mut runner = ShellRunner::new();
        let handles = vec![
            runner.submit("true").unwrap(),
            runner.submit("false").unwrap(),
        ];
        let statuses = wait_all(&mut runner, handles).unwrap();
        assert!(statuses[0].is_success());
        assert!(!statuses[1].is_success());

        let status = runner
            .pipe(&format!("cat > {}", out.display()), "hello\n")
            .unwrap();
        assert!(status.is_success());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello\n");
    }

    #[test]
    fn test_shell_runner_pipe_into_early_exit() {
        if cfg!(not(unix)) {
            return;
        }

        // More input than a pipe buffers, to a command that never reads it
        let input = "x".repeat(1 << 20);
        let mut runner = ShellRunner::new();
        let status = runner.pipe("exit 3", &input).unwrap();

        assert_eq!(status.code(), Some(3));
        assert!(runner.run("true").unwrap().is_success());
    }

    #[test]
    fn test_shell_runner_unknown_handle() {
        let mut runner = ShellRunner::new();
        assert!(runner.wait(RunHandle(42)).is_err());
    }
}
