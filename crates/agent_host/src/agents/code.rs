//! Python snippet agent.
//!
//! Scripts are screened against a substring deny-list and then run as
//! `<interpreter> -c <script>` with a hard wall-clock limit. This is
//! best-effort isolation, not a sandbox.

use async_trait::async_trait;
use shared::settings::CodeSettings;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use super::{Agent, AgentFailure, AgentOutput, FAILURE_MARK};

pub struct CodeAgent {
    interpreter: String,
    timeout: Duration,
    denied_tokens: Vec<String>,
}

impl CodeAgent {
    pub fn new(settings: &CodeSettings) -> Self {
        Self {
            interpreter: settings.interpreter.clone(),
            timeout: Duration::from_millis(settings.timeout_ms),
            denied_tokens: settings.denied_tokens.clone(),
        }
    }

    /// First deny-listed token contained in `script` (case-sensitive)
    pub fn forbidden_token(&self, script: &str) -> Option<&str> {
        self.denied_tokens
            .iter()
            .find(|token| !token.is_empty() && script.contains(token.as_str()))
            .map(|token| token.as_str())
    }
}

fn format_output(stdout: &str, stderr: &str) -> String {
    let mut combined = stdout.to_string();
    if !stderr.is_empty() {
        combined.push_str(&format!("{} Error: {}", FAILURE_MARK, stderr));
    }
    format!("```python\n{}\n```", combined.trim())
}

#[async_trait]
impl Agent for CodeAgent {
    fn id(&self) -> &str {
        "code"
    }

    async fn run(&self, script: &str) -> Result<AgentOutput, AgentFailure> {
        if let Some(token) = self.forbidden_token(script) {
            tracing::warn!("Rejected script using `{}`", token);
            return Err(AgentFailure::ForbiddenToken(token.to_string()));
        }

        let child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentFailure::Spawn(format!("{}: {}", self.interpreter, e)))?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AgentFailure::Timeout(self.timeout))?
            .map_err(|e| AgentFailure::Spawn(format!("{}: {}", self.interpreter, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::debug!(
            "Script exited with {:?} ({} bytes out, {} bytes err)",
            output.status.code(),
            stdout.len(),
            stderr.len()
        );
        Ok(AgentOutput::text(format_output(&stdout, &stderr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_with(interpreter: &str, timeout_ms: u64) -> CodeAgent {
        CodeAgent::new(&CodeSettings {
            interpreter: interpreter.into(),
            timeout_ms,
            ..CodeSettings::default()
        })
    }

    #[tokio::test]
    async fn test_socket_rejected_before_spawn() {
        // An interpreter that cannot exist proves nothing was spawned
        let agent = agent_with("/nonexistent/interpreter", 3000);
        let err = agent
            .run("print('hi'); import socket as s")
            .await
            .unwrap_err();
        assert_eq!(err, AgentFailure::ForbiddenToken("socket".into()));
        assert_eq!(
            agent.execute("x = 'websocket'").await,
            "❌ Forbidden code: use of `socket`"
        );
    }

    #[test]
    fn test_deny_list_is_case_sensitive_substring() {
        let agent = agent_with("python3", 3000);
        assert_eq!(agent.forbidden_token("import os"), Some("os"));
        assert_eq!(agent.forbidden_token("print(cost)"), Some("os"));
        assert_eq!(agent.forbidden_token("eval('1')"), Some("eval"));
        assert_eq!(agent.forbidden_token("print(SYS)"), None);
        assert_eq!(agent.forbidden_token("print(sum(range(10)))"), None);
    }

    #[test]
    fn test_format_output() {
        assert_eq!(format_output("45\n", ""), "```python\n45\n```");
        assert_eq!(
            format_output("", "NameError: x\n"),
            "```python\n❌ Error: NameError: x\n```"
        );
        assert_eq!(
            format_output("1\n", "warn\n"),
            "```python\n1\n❌ Error: warn\n```"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_interpreter() {
        let agent = agent_with("sh", 3000);
        let out = agent.run("echo hello").await.unwrap();
        assert_eq!(out.text, "```python\nhello\n```");

        let out = agent.run("echo oops 1>&2").await.unwrap();
        assert_eq!(out.text, "```python\n❌ Error: oops\n```");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_long_script_times_out() {
        let agent = agent_with("sh", 200);
        let started = std::time::Instant::now();
        let err = agent.run("sleep 10").await.unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(agent.execute("sleep 10").await.starts_with("⏱️"));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let agent = agent_with("/nonexistent/interpreter", 3000);
        let err = agent.run("print(1)").await.unwrap_err();
        assert!(matches!(err, AgentFailure::Spawn(_)));
    }
}
