//! Model-runner subprocess provider (`ollama run <model>` and friends).
//!
//! One child process per query: the query is written to stdin, stdin is
//! closed, and stdout is collected until the child exits.  The whole
//! round-trip is bounded by `timeout`; on expiry the child is killed
//! (`kill_on_drop`) and [`ProviderError::Timeout`] is returned.
//!
//! A child that exits non-zero or writes to stderr is not an error here:
//! the condition is logged and whatever stdout was produced is returned.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::llm::ProviderError;

/// Env var the model runner reads for its server address.
const HOST_ENV: &str = "OLLAMA_HOST";

#[derive(Debug, Clone)]
pub struct SubprocessProvider {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    host: Option<String>,
    path_dirs: Vec<PathBuf>,
}

impl SubprocessProvider {
    pub fn new(command: String, args: Vec<String>, timeout: Duration) -> Self {
        Self { command, args, timeout, host: None, path_dirs: Vec::new() }
    }

    /// Export `host` to the child as `OLLAMA_HOST`.
    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    /// Prepend `dirs` to the child's `PATH`.
    pub fn with_path_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.path_dirs = dirs;
        self
    }

    pub async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(host) = &self.host {
            cmd.env(HOST_ENV, host);
        }
        if let Some(path) = self.child_path()? {
            cmd.env("PATH", path);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProviderError::Spawn(format!("{}: {e}", self.command)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::Request("child stdin not captured".into()))?;

        // Feed stdin from its own task so a chatty child cannot deadlock
        // against a full stdout pipe.  Dropping `stdin` closes the pipe.
        let input = content.to_owned();
        let writer = tokio::spawn(async move {
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                debug!(error = %e, "model runner closed stdin early");
            }
        });

        debug!(command = %self.command, content_len = content.len(), "model runner started");

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                writer.abort();
                warn!(
                    command = %self.command,
                    timeout_secs = self.timeout.as_secs(),
                    "model runner timed out, killed"
                );
                return Err(ProviderError::Timeout(self.timeout.as_secs()));
            }
            Ok(Err(e)) => return Err(ProviderError::Request(format!("wait failed: {e}"))),
            Ok(Ok(output)) => output,
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(stderr = %stderr.trim(), "model runner error output");
        }
        if !output.status.success() {
            warn!(status = %output.status, "model runner exited unsuccessfully");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn child_path(&self) -> Result<Option<OsString>, ProviderError> {
        if self.path_dirs.is_empty() {
            return Ok(None);
        }
        let inherited = env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .path_dirs
            .iter()
            .cloned()
            .chain(env::split_paths(&inherited));
        env::join_paths(dirs)
            .map(Some)
            .map_err(|e| ProviderError::Spawn(format!("invalid path_dirs: {e}")))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> SubprocessProvider {
        SubprocessProvider::new("sh".into(), vec!["-c".into(), script.into()], timeout)
    }

    #[tokio::test]
    async fn pipes_query_through_stdin() {
        let p = SubprocessProvider::new("cat".into(), Vec::new(), Duration::from_secs(5));
        assert_eq!(p.complete("why is the sky blue?").await.unwrap(), "why is the sky blue?");
    }

    #[tokio::test]
    async fn slow_runner_times_out() {
        let p = sh("sleep 5", Duration::from_millis(200));
        let err = p.complete("hi").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn stderr_and_failure_still_return_stdout() {
        let p = sh("echo partial; echo boom >&2; exit 3", Duration::from_secs(5));
        assert_eq!(p.complete("").await.unwrap(), "partial\n");
    }

    #[tokio::test]
    async fn empty_output_is_ok() {
        let p = sh("cat >/dev/null", Duration::from_secs(5));
        assert_eq!(p.complete("ignored").await.unwrap(), "");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let p = sh("printf 'a\\377b'", Duration::from_secs(5));
        assert_eq!(p.complete("").await.unwrap(), "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn host_is_exported() {
        let p = sh("printf %s \"$OLLAMA_HOST\"", Duration::from_secs(5))
            .with_host(Some("10.0.0.208:11434".into()));
        assert_eq!(p.complete("").await.unwrap(), "10.0.0.208:11434");
    }

    #[tokio::test]
    async fn path_dirs_are_prepended() {
        let p = sh("printf %s \"$PATH\"", Duration::from_secs(5))
            .with_path_dirs(vec![PathBuf::from("/opt/runner/bin")]);
        assert!(p.complete("").await.unwrap().starts_with("/opt/runner/bin"));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let p = SubprocessProvider::new(
            "definitely-not-a-model-runner".into(),
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(p.complete("x").await, Err(ProviderError::Spawn(_))));
    }
}
