//! Local/dev/test [`Sandbox`] default: runs payload bytes as a script
//! through a configured interpreter subprocess.
//!
//! This is **not** a security boundary. Network/filesystem/syscall
//! isolation is the responsibility of whatever real sandbox (a VM, a
//! gVisor/firecracker runner, a hosted service like E2B) a production
//! deployment plugs in behind the same [`Sandbox`] trait.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use super::{Sandbox, SandboxOutput};
use crate::error::{ClearinghouseError, VerificationErrorKind};

/// Runs payload bytes through `interpreter <script-path>` in a child
/// process, capturing stdout/stderr line-by-line and enforcing a
/// wall-clock timeout.
pub struct ProcessSandbox {
    interpreter: String,
}

impl ProcessSandbox {
    /// Build a sandbox that shells out to `interpreter` (e.g. `"python3"`).
    #[must_use]
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    async fn run_once(&self, code: &[u8]) -> Result<SandboxOutput, ClearinghouseError> {
        let script_path = std::env::temp_dir().join(format!("clearinghouse-{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&script_path, code).await.map_err(|e| {
            ClearinghouseError::Verification(VerificationErrorKind::SandboxError(e.to_string()))
        })?;

        let spawn_result = Command::new(&self.interpreter)
            .arg(&script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let result = match spawn_result {
            Ok(mut child) => {
                let stdout = child.stdout.take().expect("piped stdout");
                let stderr = child.stderr.take().expect("piped stderr");
                let (stdout, stderr) = tokio::join!(
                    collect_lines(stdout),
                    collect_lines(stderr),
                );
                let status = child.wait().await.map_err(|e| {
                    ClearinghouseError::Verification(VerificationErrorKind::SandboxError(
                        e.to_string(),
                    ))
                });
                status.map(|status| SandboxOutput {
                    stdout,
                    stderr,
                    exit_code: status.code().unwrap_or(-1),
                })
            }
            Err(e) => Err(ClearinghouseError::Verification(
                VerificationErrorKind::SandboxError(e.to_string()),
            )),
        };

        let _ = tokio::fs::remove_file(&script_path).await;
        result
    }
}

async fn collect_lines(io: impl tokio::io::AsyncRead + Unpin) -> String {
    let mut lines = BufReader::new(io).lines();
    let mut collected = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        collected.push(line);
    }
    collected.join("\n")
}

#[async_trait::async_trait]
impl Sandbox for ProcessSandbox {
    async fn run(&self, code: &[u8], timeout_secs: u64) -> Result<SandboxOutput, ClearinghouseError> {
        match timeout(Duration::from_secs(timeout_secs), self.run_once(code)).await {
            Ok(result) => result,
            Err(_) => Err(ClearinghouseError::Verification(
                VerificationErrorKind::ExecutionTimeout,
            )),
        }
    }
}
