use std::future::Future;
use std::pin::Pin;

use crate::error::Error;
use crate::schema::{ParamKind, ToolSchema};
use crate::tool::{Tool, ToolContext, ToolOutput, ToolSpec};

use super::resolve_path;

const MAX_FILE_SIZE: u64 = 256 * 1024;
const DEFAULT_LIMIT: usize = 2000;

pub struct ReadFileTool;

impl Tool for ReadFileTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "read_file",
            "Read a text file. Relative paths resolve against the working \
             directory. Rejects binary files; max file size 256 KB.",
            ToolSchema::object()
                .required("path", ParamKind::String, "Path to the file to read")
                .optional("offset", ParamKind::Integer, "1-based line to start from")
                .optional("limit", ParamKind::Integer, "Number of lines to read"),
        )
    }

    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>> {
        Box::pin(async move {
            let path_arg = input["path"].as_str().unwrap_or_default();
            let offset = input["offset"].as_u64().unwrap_or(1).max(1) as usize;
            let limit = input["limit"].as_u64().unwrap_or(DEFAULT_LIMIT as u64) as usize;

            let path = resolve_path(path_arg, ctx);
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    return Ok(ToolOutput::error(format!("Cannot read {path_arg}: {e}")));
                }
            };
            if metadata.is_dir() {
                return Ok(ToolOutput::error(format!(
                    "{path_arg} is a directory; use list_dir instead"
                )));
            }
            if metadata.len() > MAX_FILE_SIZE {
                return Ok(ToolOutput::error(format!(
                    "{path_arg} is too large ({} bytes, max {MAX_FILE_SIZE})",
                    metadata.len()
                )));
            }

            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| Error::Agent(format!("Cannot read file: {e}")))?;
            if bytes.contains(&0) {
                return Ok(ToolOutput::error(format!("{path_arg} is a binary file")));
            }
            let content = String::from_utf8_lossy(&bytes);

            let selected: Vec<&str> = content
                .lines()
                .skip(offset - 1)
                .take(limit)
                .collect();
            Ok(ToolOutput::success(selected.join("\n")))
        })
    }
}
