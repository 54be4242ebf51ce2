//! Process execution abstraction.
//!
//! The AWS CLI client runs every API call as a child process. Going through
//! [`CommandExecutor`] lets tests script the CLI's stdout/stderr/exit status
//! without AWS credentials or network access.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::process::{Command, Stdio};

#[cfg(test)]
use mockall::automock;

/// Captured result of one process run
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status was 0
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Deserialize stdout as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.stdout).with_context(|| {
            format!(
                "unexpected JSON output: {}",
                first_line(&self.stdout).unwrap_or("<empty>")
            )
        })
    }

    /// Most useful single line of a failed run, for error messages
    pub fn failure_message(&self) -> String {
        let line = self
            .stderr
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .or_else(|| first_line(&self.stdout));
        match (line, self.code) {
            (Some(line), _) => line.to_string(),
            (None, Some(code)) => format!("exited with status {}", code),
            (None, None) => "terminated by signal".to_string(),
        }
    }
}

fn first_line(s: &str) -> Option<&str> {
    s.lines().map(str::trim).find(|l| !l.is_empty())
}

/// Runs external programs
#[cfg_attr(test, automock)]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args` and capture its output.
    ///
    /// Returns `Err` only when the process could not be started; a non-zero
    /// exit is reported through [`CommandOutput::success`].
    fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Spawns real processes with `std::process::Command`
#[derive(Debug, Clone, Default)]
pub struct RealCommandExecutor;

impl RealCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for RealCommandExecutor {
    fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to execute {}", program))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Token {
        #[serde(rename = "ChangeToken")]
        change_token: String,
    }

    #[test]
    fn test_json_parsing() {
        let output = CommandOutput {
            stdout: r#"{"ChangeToken": "abc-123"}"#.to_string(),
            success: true,
            code: Some(0),
            ..Default::default()
        };
        let token: Token = output.json().unwrap();
        assert_eq!(token.change_token, "abc-123");
    }

    #[test]
    fn test_json_parsing_error_mentions_output() {
        let output = CommandOutput {
            stdout: "not json\nmore".to_string(),
            success: true,
            ..Default::default()
        };
        let err = output.json::<Token>().unwrap_err();
        assert!(format!("{:#}", err).contains("not json"));
    }

    #[test]
    fn test_failure_message_prefers_last_stderr_line() {
        let output = CommandOutput {
            stderr: "\nAn error occurred (WAFStaleDataException)\n  stale token  \n\n".to_string(),
            code: Some(254),
            ..Default::default()
        };
        assert_eq!(output.failure_message(), "stale token");
    }

    #[test]
    fn test_failure_message_falls_back_to_code() {
        let output = CommandOutput {
            code: Some(2),
            ..Default::default()
        };
        assert_eq!(output.failure_message(), "exited with status 2");
        assert_eq!(CommandOutput::default().failure_message(), "terminated by signal");
    }

    #[test]
    fn test_real_command_executor_echo() {
        let executor = RealCommandExecutor::new();
        let output = executor
            .execute("echo", &["-n".to_string(), "hello".to_string()])
            .unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn test_real_command_executor_missing_program() {
        let executor = RealCommandExecutor::new();
        let result = executor.execute("/nonexistent/aws-cli-binary", &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mock_command_executor() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|program, args| program == "aws" && args.first().map(String::as_str) == Some("waf"))
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    stdout: "{}".to_string(),
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });

        let output = mock.execute("aws", &["waf".to_string()]).unwrap();
        assert!(output.success);
    }
}
