// src/nix/runner.rs

//! Process execution for external tools
//!
//! `CommandRunner` is the seam between the executor and the operating
//! system. `SystemRunner` spawns real processes with a hard time limit;
//! tests substitute a scripted runner.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given stderr
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs an external program to completion
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, killing it if it outlives `timeout`.
    ///
    /// A nonzero exit is reported through `CommandOutput::success`, not as
    /// an error; errors are reserved for spawn failures and timeouts.
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput>;
}

impl CommandRunner for Box<dyn CommandRunner> {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        (**self).run(program, args, timeout)
    }
}

/// Runner backed by `std::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let command_line = display_command(program, args);
        debug!("Running {}", command_line);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    Error::ExternalTool {
                        command: command_line.clone(),
                        stderr: format!("{} not found in PATH", program),
                    }
                } else {
                    Error::Io(e)
                }
            })?;

        // Drain both pipes concurrently so a chatty child cannot block on a full pipe
        let stdout_reader = child.stdout.take().map(|pipe| thread::spawn(move || drain(pipe)));
        let stderr_reader = child.stderr.take().map(|pipe| thread::spawn(move || drain(pipe)));

        let status = match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                warn!("{} exceeded {}s, killing it", command_line, timeout.as_secs());
                let _ = child.kill();
                let _ = child.wait();
                // Readers are detached, not joined: a grandchild may still hold
                // the pipes open, and they exit once it does.
                drop(stdout_reader);
                drop(stderr_reader);
                return Err(Error::Timeout {
                    command: command_line,
                    seconds: timeout.as_secs(),
                });
            }
        };

        let stdout = stdout_reader
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();
        let stderr = stderr_reader
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default();

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn drain(mut pipe: impl Read) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    buf
}

/// Render a command line for logs and error messages
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let args = vec!["profile".to_string(), "list".to_string()];
        assert_eq!(display_command("nix", &args), "nix profile list");
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_captures_output() {
        let args = vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()];
        let output = SystemRunner.run("sh", &args, Duration::from_secs(10)).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_times_out() {
        let args = vec!["5".to_string()];
        let result = SystemRunner.run("sleep", &args, Duration::from_millis(100));
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[test]
    #[cfg(unix)]
    fn test_timeout_returns_while_grandchild_holds_pipes() {
        let args = vec!["-c".to_string(), "sleep 5 & sleep 5".to_string()];
        let started = std::time::Instant::now();
        let result = SystemRunner.run("sh", &args, Duration::from_millis(200));
        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_missing_program_is_external_tool_error() {
        let result = SystemRunner.run("beacon-no-such-binary", &[], Duration::from_secs(1));
        assert!(matches!(result, Err(Error::ExternalTool { .. })));
    }
}
