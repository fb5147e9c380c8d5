//! Child-process execution behind an injectable [`Executor`].
use std::io::Write as _;
use std::process::{Command, Output, Stdio};

use crate::resources::error::ResourceError;

/// Captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    /// Decoded stdout; invalid UTF-8 is replaced.
    pub stdout: String,
    /// Decoded stderr.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Abstraction over process execution so adapters can be tested without
/// touching the host.
pub trait Executor: std::fmt::Debug {
    /// Run a command and fail if it exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Spawn`] if the program cannot be started and
    /// [`ResourceError::ExecutionFailed`] on a non-zero exit.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult, ResourceError>;

    /// Run a command, returning its result even when it exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Spawn`] if the program cannot be started.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult, ResourceError>;

    /// Run a command with `input` written to its stdin, failing on non-zero exit.
    ///
    /// The input never appears in error messages; it is used for passwords.
    ///
    /// # Errors
    ///
    /// Same as [`Executor::run`].
    fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<ExecResult, ResourceError>;

    /// Whether `program` is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// [`Executor`] that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

/// `program` and `args` joined for logs and error messages.
pub(crate) fn command_line(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

fn check(result: ExecResult, program: &str, args: &[&str]) -> Result<ExecResult, ResourceError> {
    if result.success {
        return Ok(result);
    }
    Err(ResourceError::ExecutionFailed {
        command: command_line(program, args),
        exit_code: result.code.unwrap_or(-1),
        stderr: result.stderr.trim().to_string(),
    })
}

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult, ResourceError> {
        let result = self.run_unchecked(program, args)?;
        check(result, program, args)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult, ResourceError> {
        tracing::debug!("exec: {}", command_line(program, args));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ResourceError::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(ExecResult::from(output))
    }

    fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &str,
    ) -> Result<ExecResult, ResourceError> {
        tracing::debug!("exec (stdin): {}", command_line(program, args));
        let spawn_err = |source| ResourceError::Spawn {
            program: program.to_string(),
            source,
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;
        check(ExecResult::from(output), program, args)
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let result = SystemExecutor.run("echo", &["tank/homes"]).unwrap();
        assert!(result.success);
        assert_eq!(result.code, Some(0));
        assert_eq!(result.stdout, "tank/homes\n");
    }

    #[test]
    fn run_failure_reports_command_line() {
        let err = SystemExecutor.run("false", &["--flag"]).unwrap_err();
        assert!(
            matches!(err, ResourceError::ExecutionFailed { ref command, .. } if command == "false --flag"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn unchecked_run_returns_the_failure() {
        let result = SystemExecutor.run_unchecked("false", &[]).unwrap();
        assert!(!result.success);
        assert_eq!(result.code, Some(1));
    }

    #[test]
    fn run_missing_program_is_spawn_error() {
        let err = SystemExecutor
            .run("this-program-does-not-exist-12345", &[])
            .unwrap_err();
        assert!(matches!(err, ResourceError::Spawn { .. }));
    }

    #[test]
    fn run_with_input_feeds_stdin() {
        let result = SystemExecutor.run_with_input("cat", &[], "piped\n").unwrap();
        assert_eq!(result.stdout, "piped\n");
    }

    #[test]
    fn which_looks_on_path() {
        assert!(SystemExecutor.which("sh"));
        assert!(!SystemExecutor.which("this-program-does-not-exist-12345"));
    }

    #[test]
    fn command_line_joins_arguments() {
        assert_eq!(command_line("zfs", &["list", "-H"]), "zfs list -H");
        assert_eq!(command_line("zpool", &[]), "zpool");
    }
}
