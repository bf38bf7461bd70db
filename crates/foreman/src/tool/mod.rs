pub mod builtins;

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::llm::types::ToolDefinition;
use crate::schema::ToolSchema;

/// Output of a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Rich description of a tool: name, description, and validating schema.
///
/// The agent loop converts this to the wire [`ToolDefinition`] once per run.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ToolSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    pub fn to_wire(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.to_wire(),
        }
    }
}

/// Callback fired when a tool creates a new task directory.
pub type OnTaskCreated = dyn Fn(&Path) + Send + Sync;
/// Callback fired when a tool steers a running worker: (task id, message).
pub type OnSteer = dyn Fn(&str, &str) + Send + Sync;
/// Callback fired when a tool aborts a running worker.
pub type OnAbort = dyn Fn(&str) + Send + Sync;

/// Execution context handed to every tool invocation.
///
/// The three callbacks are late-bound: the runtime constructs the base
/// context first and installs them when it wires a concrete invocation,
/// which keeps tools from holding a direct reference back to the runtime.
#[derive(Clone)]
pub struct ToolContext {
    /// Where non-restricted tools operate and relative paths resolve.
    pub cwd: PathBuf,
    /// Root directory under which task directories live.
    pub tasks_root: PathBuf,
    /// When set, file-writing tools must refuse paths outside this root.
    pub write_root: Option<PathBuf>,
    pub on_task_created: Option<Arc<OnTaskCreated>>,
    pub on_steer: Option<Arc<OnSteer>>,
    pub on_abort: Option<Arc<OnAbort>>,
}

impl ToolContext {
    pub fn new(cwd: impl Into<PathBuf>, tasks_root: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            tasks_root: tasks_root.into(),
            write_root: None,
            on_task_created: None,
            on_steer: None,
            on_abort: None,
        }
    }

    /// Derive the worker-scoped context for a task directory: the worker
    /// operates inside its own directory and may not write outside it.
    pub fn for_worker(&self, task_dir: &Path) -> Self {
        let mut ctx = self.clone();
        ctx.cwd = task_dir.to_path_buf();
        ctx.write_root = Some(task_dir.to_path_buf());
        ctx
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("cwd", &self.cwd)
            .field("tasks_root", &self.tasks_root)
            .field("write_root", &self.write_root)
            .field("on_task_created", &self.on_task_created.is_some())
            .field("on_steer", &self.on_steer.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .finish()
    }
}

/// Trait for tools the agent can invoke.
///
/// Uses `Pin<Box<dyn Future>>` return type for dyn-compatibility,
/// allowing tools to be stored as `Arc<dyn Tool>`.
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Execute with schema-validated arguments. The loop validates `input`
    /// against `spec().schema` before calling this.
    fn execute<'a>(
        &'a self,
        input: serde_json::Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, Error>> + Send + 'a>>;
}
