use std::future::Future;
use std::pin::Pin;

use crate::error::Error;
use crate::schema::{ParamKind, ToolSchema};
use crate::tool::{Tool, ToolContext, ToolOutput, ToolSpec};

use super::resolve_path;

pub struct ListDirTool;

impl Tool for ListDirTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "list_dir",
            "List the entries of a directory (non-recursive). Directories are \
             suffixed with '/'. Defaults to the working directory.",
            ToolSchema::object().optional("path", ParamKind::String, "Directory to list"),
        )
    }

    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>> {
        Box::pin(async move {
            let path = match input["path"].as_str() {
                Some(p) => resolve_path(p, ctx),
                None => ctx.cwd.clone(),
            };

            let mut read_dir = match tokio::fs::read_dir(&path).await {
                Ok(rd) => rd,
                Err(e) => {
                    return Ok(ToolOutput::error(format!(
                        "Cannot list {}: {e}",
                        path.display()
                    )));
                }
            };

            let mut entries = Vec::new();
            while let Some(entry) = read_dir
                .next_entry()
                .await
                .map_err(|e| Error::Agent(format!("Cannot read directory entry: {e}")))?
            {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    name.push('/');
                }
                entries.push(name);
            }
            entries.sort();

            if entries.is_empty() {
                return Ok(ToolOutput::success("(empty directory)"));
            }
            Ok(ToolOutput::success(entries.join("\n")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn lists_sorted_entries_with_dir_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("a_dir")).unwrap();

        let ctx = ToolContext::new(dir.path(), dir.path().join("tasks"));
        let out = ListDirTool.execute(json!({}), &ctx).await.unwrap();
        assert!(!out.is_error);
        assert_eq!(out.content, "a_dir/\nb.txt");
    }

    #[tokio::test]
    async fn missing_directory_is_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path(), dir.path().join("tasks"));
        let out = ListDirTool
            .execute(json!({"path": "missing"}), &ctx)
            .await
            .unwrap();
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn empty_directory_reports_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path(), dir.path().join("tasks"));
        let out = ListDirTool.execute(json!({}), &ctx).await.unwrap();
        assert_eq!(out.content, "(empty directory)");
    }
}
