use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::Error;
use crate::schema::{ParamKind, ToolSchema};
use crate::tool::{Tool, ToolContext, ToolOutput, ToolSpec};

use super::floor_char_boundary;

const DEFAULT_TIMEOUT_MS: u64 = 120_000;
const MAX_TIMEOUT_MS: u64 = 600_000;
const MAX_OUTPUT_BYTES: usize = 30_000;
const HEAD_TAIL_SIZE: usize = 14_000;

/// Cap command output at head + tail so one chatty command cannot flood the
/// conversation.
fn cap_output(text: String) -> String {
    if text.len() <= MAX_OUTPUT_BYTES {
        return text;
    }
    let head_end = floor_char_boundary(&text, HEAD_TAIL_SIZE);
    let mut tail_start = text.len() - HEAD_TAIL_SIZE;
    while !text.is_char_boundary(tail_start) {
        tail_start += 1;
    }
    let omitted = tail_start - head_end;
    format!(
        "{}\n[... {omitted} bytes omitted ...]\n{}",
        &text[..head_end],
        &text[tail_start..]
    )
}

pub struct ShellTool;

impl Tool for ShellTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "shell",
            "Execute a bash command in the working directory. Captures stdout \
             and stderr. Default timeout 120s, max 600s.",
            ToolSchema::object()
                .required("command", ParamKind::String, "The bash command to execute")
                .optional(
                    "timeout",
                    ParamKind::Number,
                    "Timeout in milliseconds (default 120000, max 600000)",
                ),
        )
    }

    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>> {
        Box::pin(async move {
            let command = input["command"].as_str().unwrap_or_default().to_string();
            let timeout_ms = input["timeout"]
                .as_u64()
                .unwrap_or(DEFAULT_TIMEOUT_MS)
                .min(MAX_TIMEOUT_MS);

            let child = tokio::process::Command::new("bash")
                .arg("-c")
                .arg(&command)
                .current_dir(&ctx.cwd)
                .stdout(std::process::Stdio::piped())
                .stderr(std::process::Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| Error::Agent(format!("Failed to spawn bash: {e}")))?;

            let output = match tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                child.wait_with_output(),
            )
            .await
            {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => return Ok(ToolOutput::error(format!("Command failed: {e}"))),
                // kill_on_drop cleans the child up when it is dropped here.
                Err(_) => {
                    return Ok(ToolOutput::error(format!(
                        "Command timed out after {timeout_ms}ms"
                    )));
                }
            };

            let exit_code = output.status.code().unwrap_or(-1);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);

            let mut combined = String::new();
            if !stdout.is_empty() {
                combined.push_str(stdout.trim_end());
            }
            if !stderr.is_empty() {
                if !combined.is_empty() {
                    combined.push('\n');
                }
                combined.push_str("stderr: ");
                combined.push_str(stderr.trim_end());
            }
            if combined.is_empty() {
                combined.push_str("(no output)");
            }
            let combined = cap_output(combined);

            if exit_code == 0 {
                Ok(ToolOutput::success(combined))
            } else {
                Ok(ToolOutput::error(format!(
                    "{combined}\nexit code: {exit_code}"
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(dir: &std::path::Path) -> ToolContext {
        ToolContext::new(dir, dir.join("tasks"))
    }

    #[tokio::test]
    async fn captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = ShellTool
            .execute(json!({"command": "echo hello"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(!out.is_error);
        assert_eq!(out.content, "hello");
    }

    #[tokio::test]
    async fn runs_in_context_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

        let out = ShellTool
            .execute(json!({"command": "ls"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(out.content.contains("marker.txt"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_error_with_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = ShellTool
            .execute(json!({"command": "exit 3"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("exit code: 3"));
    }

    #[tokio::test]
    async fn stderr_is_labeled() {
        let dir = tempfile::tempdir().unwrap();
        let out = ShellTool
            .execute(json!({"command": "echo oops >&2"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(out.content.contains("stderr: oops"));
    }

    #[test]
    fn cap_output_keeps_head_and_tail() {
        let long = format!("{}{}", "h".repeat(20_000), "t".repeat(20_000));
        let capped = cap_output(long);
        assert!(capped.len() < 30_000);
        assert!(capped.starts_with(&"h".repeat(14_000)));
        assert!(capped.ends_with(&"t".repeat(14_000)));
        assert!(capped.contains("bytes omitted"));

        let short = "fine".to_string();
        assert_eq!(cap_output(short), "fine");
    }

    #[tokio::test]
    async fn timeout_kills_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = ShellTool
            .execute(
                json!({"command": "sleep 5", "timeout": 50}),
                &ctx(dir.path()),
            )
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("timed out"));
    }
}
