//! Subprocess execution for host collaborators
//!
//! Collaborators never spawn processes directly; they go through a
//! [`CommandRunner`] so tests can script the host's answers.

use anyhow::{Context, Result, bail};
use std::fmt;
use std::process::Command;

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

pub trait CommandRunner: Send + Sync + fmt::Debug {
    /// Run a command and capture its output; a non-zero exit is not an error
    fn output(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Run a command that must succeed
    fn run(&self, cmd: &str, args: &[&str]) -> Result<()> {
        let output = self.output(cmd, args)?;
        if !output.success {
            bail!("{} {} failed: {}", cmd, args.join(" "), output.stderr);
        }
        Ok(())
    }
}

/// Runs commands on the live host
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn output(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        log::trace!("exec: {} {}", cmd, args.join(" "));
        let output = Command::new(cmd)
            .args(args)
            .output()
            .with_context(|| format!("Failed to execute: {} {}", cmd, args.join(" ")))?;
        Ok(output.into())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::ScriptedRunner;
    use super::*;

    #[test]
    fn test_run_fails_on_nonzero_exit() {
        let runner = ScriptedRunner::new().respond("systemctl start burp", false, "");
        let err = runner.run("systemctl", &["start", "burp"]).unwrap_err();
        assert!(err.to_string().contains("systemctl start burp failed"));
        assert!(runner.run("systemctl", &["stop", "burp"]).is_ok());
        assert_eq!(runner.calls().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_output() {
        let output = SystemRunner.output("sh", &["-c", "echo hello; exit 3"]).unwrap();
        assert!(!output.success);
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn test_missing_command_is_an_error() {
        assert!(
            SystemRunner
                .output("converge-no-such-command", &[])
                .is_err()
        );
    }
}
