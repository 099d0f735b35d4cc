//! External tool execution.
//!
//! Tools are spawned directly with an argument vector, never through
//! `/bin/sh -c`, so probe values containing quote or shell metacharacters
//! reach the tool byte for byte. [`shellquote`] is only used to render a
//! copy-pasteable command line for logs and error messages.
//!
//! # Example
//!
//! ```ignore
//! use rowprobe_common::shell;
//!
//! let args = vec!["-On".to_string(), "IF-MIB::ifAlias".to_string()];
//! let result = shell::exec("snmptranslate", &args).await?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{RowProbeError, RowProbeResult};

/// net-snmp GET tool.
pub const SNMPGET_CMD: &str = "snmpget";

/// net-snmp GET-NEXT tool.
pub const SNMPGETNEXT_CMD: &str = "snmpgetnext";

/// net-snmp SET tool.
pub const SNMPSET_CMD: &str = "snmpset";

/// net-snmp MIB translation tool.
pub const SNMPTRANSLATE_CMD: &str = "snmptranslate";

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Characters that can appear unquoted in a rendered command line.
static SHELL_SAFE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:/=+,@%-]+$").expect("Invalid regex pattern"));

/// Quotes a string for display in a shell command line.
///
/// Wraps the string in double quotes and escapes `$`, `` ` ``, `"`, `\`
/// and newline.
///
/// # Example
///
/// ```
/// use rowprobe_common::shell::shellquote;
///
/// assert_eq!(shellquote("simple"), "\"simple\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// assert_eq!(shellquote("with\"quote"), "\"with\\\"quote\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Renders a program and its arguments as a single command line, quoting
/// only the arguments that need it.
pub fn render_command<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    let mut line = program.to_string();
    for arg in args {
        let arg = arg.as_ref();
        line.push(' ');
        if SHELL_SAFE_RE.is_match(arg) {
            line.push_str(arg);
        } else {
            line.push_str(&shellquote(arg));
        }
    }
    line
}

/// Result of an external tool execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// The stdout output, trimmed.
    pub stdout: String,
    /// The stderr output, trimmed.
    pub stderr: String,
}

impl ExecResult {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns the combined output (stdout + stderr) for error messages.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs `program` with `args` and waits for it to exit.
///
/// # Returns
///
/// * `Ok(ExecResult)` - The command ran; check [`ExecResult::success`]
/// * `Err(RowProbeError::Spawn)` - The program could not be started
pub async fn exec<P, S>(program: P, args: &[S]) -> RowProbeResult<ExecResult>
where
    P: AsRef<OsStr>,
    S: AsRef<str>,
{
    let program = program.as_ref();
    let rendered = render_command(&program.to_string_lossy(), args);
    tracing::debug!(command = %rendered, "Executing command");

    let output = Command::new(program)
        .args(args.iter().map(|a| a.as_ref()))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| RowProbeError::Spawn {
            command: rendered.clone(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %rendered, exit_code = exit_code, "Command succeeded");
    } else {
        tracing::debug!(
            command = %rendered,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

/// Runs a command and turns a non-zero exit into an error.
///
/// # Returns
///
/// * `Ok(String)` - The stdout output on success
/// * `Err(RowProbeError)` - If the command fails or returns non-zero
pub async fn exec_or_throw<P, S>(program: P, args: &[S]) -> RowProbeResult<String>
where
    P: AsRef<OsStr>,
    S: AsRef<str>,
{
    let program = program.as_ref();
    let result = exec(program, args).await?;
    if result.success() {
        Ok(result.stdout)
    } else {
        Err(RowProbeError::CommandFailed {
            command: render_command(&program.to_string_lossy(), args),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shellquote_simple() {
        assert_eq!(shellquote("simple"), "\"simple\"");
        assert_eq!(shellquote("IF-MIB::ifAlias.1"), "\"IF-MIB::ifAlias.1\"");
    }

    #[test]
    fn test_shellquote_special_chars() {
        assert_eq!(shellquote("$HOME"), "\"\\$HOME\"");
        assert_eq!(shellquote("`whoami`"), "\"\\`whoami\\`\"");
        assert_eq!(shellquote("say \"hello\""), "\"say \\\"hello\\\"\"");
        assert_eq!(shellquote("path\\to"), "\"path\\\\to\"");
        assert_eq!(shellquote("'"), "\"'\"");
    }

    #[test]
    fn test_shellquote_empty() {
        assert_eq!(shellquote(""), "\"\"");
    }

    #[test]
    fn test_render_command() {
        let line = render_command(
            "snmpset",
            &["-v", "2c", "--", "10.0.0.1", "IF-MIB::ifAlias.1", "s", "a'b"],
        );
        assert_eq!(
            line,
            "snmpset -v 2c -- 10.0.0.1 IF-MIB::ifAlias.1 s \"a'b\""
        );
        assert_eq!(render_command::<&str>("snmpget", &[]), "snmpget");
    }

    #[test]
    fn test_exec_result_combined() {
        let result = ExecResult {
            exit_code: 0,
            stdout: "stdout".to_string(),
            stderr: "stderr".to_string(),
        };
        assert!(result.success());
        assert_eq!(result.combined_output(), "stdout\nstderr");

        let failed = ExecResult {
            exit_code: 1,
            stdout: String::new(),
            stderr: "Timeout: No Response from 10.0.0.1".to_string(),
        };
        assert!(!failed.success());
        assert_eq!(failed.combined_output(), "Timeout: No Response from 10.0.0.1");
    }

    #[tokio::test]
    async fn test_exec_passes_arguments_verbatim() {
        let result = exec("echo", &["a'b", "$HOME", "\"q\""]).await.unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, "a'b $HOME \"q\"");
    }

    #[tokio::test]
    async fn test_exec_or_throw_failure() {
        let result = exec_or_throw("false", &[] as &[&str]).await;
        match result {
            Err(RowProbeError::CommandFailed { exit_code, .. }) => assert_eq!(exit_code, 1),
            other => panic!("Expected CommandFailed error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exec_missing_program() {
        let result = exec("/nonexistent/snmpset", &["-v"]).await;
        assert!(matches!(result, Err(RowProbeError::Spawn { .. })));
    }
}
