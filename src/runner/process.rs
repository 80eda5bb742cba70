use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::{Invocation, RunOutput, Runner};
use crate::error::{DetectionError, Result};

/// Runs detection programs as real OS processes.
///
/// Arguments go straight to the program as a vector; no shell is involved.
/// Children are killed when the run future is dropped, so a timeout or
/// cancellation upstream never leaves a detector behind.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<RunOutput> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = command
            .output()
            .await
            .map_err(|e| DetectionError::Execution {
                program: invocation.display_name(),
                detail: format!("spawn failed: {e}"),
            })?;

        Ok(RunOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Lossy UTF-8 view of `output`, cut at `max_bytes` on a char boundary.
pub fn truncate_output(output: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(output);
    if text.len() <= max_bytes {
        return text.into_owned();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}\n[truncated: showing {}/{} bytes]",
        &text[..end],
        end,
        text.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_output_unchanged() {
        assert_eq!(truncate_output(b"boom", 10), "boom");
    }

    #[test]
    fn truncate_long_output() {
        let out = truncate_output(b"abcdefghij", 4);
        assert!(out.starts_with("abcd\n"));
        assert!(out.contains("[truncated: showing 4/10 bytes]"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        // "é" is two bytes; cutting at 1 must back off to 0
        let out = truncate_output("é".as_bytes(), 1);
        assert!(out.starts_with('\n'));
    }
}
