//! Task-lifecycle tools: create, steer, abort, list.
//!
//! These are the main agent's levers over background workers. They hand
//! lifecycle events to the runtime through the context callbacks; the tools
//! themselves never hold a reference to the runtime.

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::error::Error;
use crate::schema::{ParamKind, ToolSchema};
use crate::task::{self, TaskStatus};
use crate::tool::{Tool, ToolContext, ToolOutput, ToolSpec};

pub struct CreateTaskTool;

impl Tool for CreateTaskTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "create_task",
            "Create a background task and start a worker on it. The worker \
             runs in its own directory and reports back when it finishes.",
            ToolSchema::object()
                .required("name", ParamKind::String, "Short task name")
                .required(
                    "description",
                    ParamKind::String,
                    "One-line description of the task",
                )
                .required(
                    "instructions",
                    ParamKind::String,
                    "Full instructions for the worker",
                )
                .optional("model", ParamKind::String, "Model override for the worker")
                .optional("tags", ParamKind::Array, "Tags for the task"),
        )
    }

    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>> {
        Box::pin(async move {
            let name = input["name"].as_str().unwrap_or_default();
            let description = input["description"].as_str().unwrap_or_default();
            let instructions = input["instructions"].as_str().unwrap_or_default();
            let model = input["model"].as_str();
            let tags: Vec<String> = input["tags"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();

            let dir = match task::create_task(
                &ctx.tasks_root,
                name,
                description,
                instructions,
                model,
                &tags,
            ) {
                Ok(dir) => dir,
                Err(e) => return Ok(ToolOutput::error(format!("Cannot create task: {e}"))),
            };
            let id = task::task_id_from_dir(&dir);
            info!(task = %id, name = %name, "task created");

            if let Some(on_task_created) = &ctx.on_task_created {
                on_task_created(&dir);
            }

            Ok(ToolOutput::success(format!(
                "Created task {id} ({name}). A worker has been started; you \
                 will be notified when it finishes."
            )))
        })
    }
}

pub struct SteerTaskTool;

impl Tool for SteerTaskTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "steer_task",
            "Send a steering message to a running worker. Delivered at the \
             worker's next turn boundary; best-effort if it already finished.",
            ToolSchema::object()
                .required("task_id", ParamKind::String, "Task id, e.g. t_001")
                .required("message", ParamKind::String, "Instruction for the worker"),
        )
    }

    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>> {
        Box::pin(async move {
            let task_id = input["task_id"].as_str().unwrap_or_default();
            let message = input["message"].as_str().unwrap_or_default();

            let Some(on_steer) = &ctx.on_steer else {
                return Ok(ToolOutput::error("Steering is not available here"));
            };
            on_steer(task_id, message);
            Ok(ToolOutput::success(format!(
                "Steer queued for {task_id}: {message}"
            )))
        })
    }
}

pub struct AbortTaskTool;

impl Tool for AbortTaskTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "abort_task",
            "Abort a running worker. The abort takes effect after the \
             worker's current tool call finishes.",
            ToolSchema::object().required("task_id", ParamKind::String, "Task id, e.g. t_001"),
        )
    }

    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>> {
        Box::pin(async move {
            let task_id = input["task_id"].as_str().unwrap_or_default();

            // Record the operator's intent on disk first, then flip the
            // in-memory flag. The worker driver keeps this status when it
            // observes the abort.
            let dir = ctx.tasks_root.join(task_id);
            if let Err(e) = task::set_status(&dir, TaskStatus::Aborted) {
                return Ok(ToolOutput::error(format!(
                    "Cannot abort {task_id}: {e}"
                )));
            }

            if let Some(on_abort) = &ctx.on_abort {
                on_abort(task_id);
            }
            info!(task = %task_id, "abort requested");
            Ok(ToolOutput::success(format!("Abort requested for {task_id}")))
        })
    }
}

pub struct ListTasksTool;

impl Tool for ListTasksTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "list_tasks",
            "List all tasks and their status.",
            ToolSchema::object(),
        )
    }

    fn execute<'a>(
        &'a self,
        _input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>> {
        Box::pin(async move {
            let records = match task::list_tasks(&ctx.tasks_root) {
                Ok(records) => records,
                Err(e) => return Ok(ToolOutput::error(format!("Cannot list tasks: {e}"))),
            };
            if records.is_empty() {
                return Ok(ToolOutput::success("No tasks."));
            }

            let mut output = String::new();
            for record in &records {
                output.push_str(&format!(
                    "{} [{}] {}: {}\n",
                    record.id,
                    record.status.as_str(),
                    record.name,
                    record.description
                ));
            }
            Ok(ToolOutput::success(output))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{create_task, load_task};
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    fn ctx(root: &Path) -> ToolContext {
        ToolContext::new(root, root.join("tasks"))
    }

    #[tokio::test]
    async fn create_task_writes_record_and_fires_callback() {
        let dir = tempfile::tempdir().unwrap();
        let created: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = created.clone();

        let mut ctx = ctx(dir.path());
        ctx.on_task_created = Some(Arc::new(move |task_dir: &Path| {
            sink.lock().unwrap().push(task_dir.to_path_buf());
        }));

        let out = CreateTaskTool
            .execute(
                json!({
                    "name": "index",
                    "description": "Index the docs",
                    "instructions": "Index everything.",
                    "tags": ["docs"]
                }),
                &ctx,
            )
            .await
            .unwrap();

        assert!(!out.is_error);
        assert!(out.content.contains("Created task t_001"));

        let dirs = created.lock().unwrap().clone();
        assert_eq!(dirs.len(), 1);
        let record = load_task(&dirs[0]).unwrap();
        assert_eq!(record.name, "index");
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.tags, vec!["docs"]);
    }

    #[tokio::test]
    async fn steer_task_forwards_to_callback() {
        let dir = tempfile::tempdir().unwrap();
        let steers: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = steers.clone();

        let mut ctx = ctx(dir.path());
        ctx.on_steer = Some(Arc::new(move |id: &str, msg: &str| {
            sink.lock().unwrap().push((id.to_string(), msg.to_string()));
        }));

        let out = SteerTaskTool
            .execute(json!({"task_id": "t_001", "message": "go left"}), &ctx)
            .await
            .unwrap();

        assert!(!out.is_error);
        assert_eq!(
            steers.lock().unwrap().clone(),
            vec![("t_001".to_string(), "go left".to_string())]
        );
    }

    #[tokio::test]
    async fn abort_task_sets_disk_status_and_fires_callback() {
        let dir = tempfile::tempdir().unwrap();
        let tasks_root = dir.path().join("tasks");
        let task_dir = create_task(&tasks_root, "job", "d", "i", None, &[]).unwrap();

        let aborts: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = aborts.clone();

        let mut ctx = ctx(dir.path());
        ctx.on_abort = Some(Arc::new(move |id: &str| {
            sink.lock().unwrap().push(id.to_string());
        }));

        let out = AbortTaskTool
            .execute(json!({"task_id": "t_001"}), &ctx)
            .await
            .unwrap();

        assert!(!out.is_error);
        assert_eq!(load_task(&task_dir).unwrap().status, TaskStatus::Aborted);
        assert_eq!(aborts.lock().unwrap().clone(), vec!["t_001"]);
    }

    #[tokio::test]
    async fn abort_unknown_task_is_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let out = AbortTaskTool
            .execute(json!({"task_id": "t_404"}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn list_tasks_formats_status_lines() {
        let dir = tempfile::tempdir().unwrap();
        let tasks_root = dir.path().join("tasks");
        create_task(&tasks_root, "one", "first job", "i", None, &[]).unwrap();
        create_task(&tasks_root, "two", "second job", "i", None, &[]).unwrap();

        let out = ListTasksTool
            .execute(json!({}), &ctx(dir.path()))
            .await
            .unwrap();
        assert!(out.content.contains("t_001 [pending] one: first job"));
        assert!(out.content.contains("t_002 [pending] two: second job"));
    }

    #[tokio::test]
    async fn list_tasks_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let out = ListTasksTool
            .execute(json!({}), &ctx(dir.path()))
            .await
            .unwrap();
        assert_eq!(out.content, "No tasks.");
    }
}
