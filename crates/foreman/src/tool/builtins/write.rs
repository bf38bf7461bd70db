use std::future::Future;
use std::pin::Pin;

use crate::error::Error;
use crate::schema::{ParamKind, ToolSchema};
use crate::tool::{Tool, ToolContext, ToolOutput, ToolSpec};

use super::{resolve_path, write_root_violation};

pub struct WriteFileTool;

impl Tool for WriteFileTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "write_file",
            "Write content to a file, creating parent directories as needed. \
             Refuses paths outside the write root when one is set.",
            ToolSchema::object()
                .required("path", ParamKind::String, "Path to the file to write")
                .required("content", ParamKind::String, "Content to write"),
        )
    }

    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>> {
        Box::pin(async move {
            let path_arg = input["path"].as_str().unwrap_or_default();
            let content = input["content"].as_str().unwrap_or_default();

            let path = resolve_path(path_arg, ctx);
            if let Some(denial) = write_root_violation(&path, ctx) {
                return Ok(ToolOutput::error(denial));
            }

            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::Agent(format!("Cannot create directories: {e}")))?;
            }

            let bytes = content.len();
            tokio::fs::write(&path, content)
                .await
                .map_err(|e| Error::Agent(format!("Cannot write file: {e}")))?;

            Ok(ToolOutput::success(format!(
                "File written: {path_arg} ({bytes} bytes)"
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writes_new_file_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path(), dir.path().join("tasks"));

        let out = WriteFileTool
            .execute(
                json!({"path": "sub/deep/file.txt", "content": "nested"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(!out.is_error);
        assert!(out.content.contains("6 bytes"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sub/deep/file.txt")).unwrap(),
            "nested"
        );
    }

    #[tokio::test]
    async fn refuses_paths_outside_write_root() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join("t_001");
        std::fs::create_dir_all(&task_dir).unwrap();

        let mut ctx = ToolContext::new(&task_dir, dir.path());
        ctx.write_root = Some(task_dir.clone());

        let outside = dir.path().join("escape.txt");
        let out = WriteFileTool
            .execute(
                json!({"path": outside.to_str().unwrap(), "content": "nope"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.content.contains("Refusing to write outside"));
        assert!(!outside.exists());
    }

    #[tokio::test]
    async fn refuses_traversal_out_of_write_root() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join("t_001");
        std::fs::create_dir_all(&task_dir).unwrap();

        let mut ctx = ToolContext::new(&task_dir, dir.path());
        ctx.write_root = Some(task_dir.clone());

        let out = WriteFileTool
            .execute(json!({"path": "../escape.txt", "content": "nope"}), &ctx)
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn allows_writes_inside_write_root() {
        let dir = tempfile::tempdir().unwrap();
        let task_dir = dir.path().join("t_001");
        std::fs::create_dir_all(&task_dir).unwrap();

        let mut ctx = ToolContext::new(&task_dir, dir.path());
        ctx.write_root = Some(task_dir.clone());

        let out = WriteFileTool
            .execute(json!({"path": "notes.md", "content": "fine"}), &ctx)
            .await
            .unwrap();
        assert!(!out.is_error);
        assert_eq!(
            std::fs::read_to_string(task_dir.join("notes.md")).unwrap(),
            "fine"
        );
    }

    #[test]
    fn spec_declares_required_fields() {
        let wire = WriteFileTool.spec().to_wire();
        assert_eq!(wire.input_schema["required"], json!(["path", "content"]));
    }
}
